use serde::{Deserialize, Serialize};

pub type AdId = u64;
pub type CampaignId = u64;

pub const DEFAULT_PRICE: f64 = 100.0;
pub const DEFAULT_BID_PRICE: f64 = 100.0;

/// A searchable ad record. `key_words` is derived from `title` by the tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub ad_id: AdId,
    pub campaign_id: CampaignId,
    pub title: String,
    pub key_words: Vec<String>,
    pub price: f64,
    pub bid_price: f64,
    pub brand: String,
    pub thumbnail: String,
    pub detail_url: String,
    pub category: String,
    // Reserved scoring fields, carried but never computed.
    pub relevance_score: f64,
    pub p_click: f64,
    pub rank_score: f64,
    pub quality_score: f64,
    pub cost_per_click: f64,
    /// 1: top, 2: bottom
    pub position: u32,
}

impl Ad {
    /// An ad with every optional attribute at its default.
    pub fn new(ad_id: AdId, campaign_id: CampaignId, title: impl Into<String>) -> Self {
        let title = title.into();
        let key_words = crate::tokenizer::tokenize(&title);
        Self {
            ad_id,
            campaign_id,
            title,
            key_words,
            price: DEFAULT_PRICE,
            bid_price: DEFAULT_BID_PRICE,
            brand: String::new(),
            thumbnail: String::new(),
            detail_url: String::new(),
            category: String::new(),
            relevance_score: 0.0,
            p_click: 0.0,
            rank_score: 0.0,
            quality_score: 0.0,
            cost_per_click: 0.0,
            position: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub budget: f64,
}

/// Directional mapping: `word` should also match each entry of `synonyms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synonym {
    pub word: String,
    pub synonyms: Vec<String>,
}
