#![allow(dead_code)]

use std::sync::Arc;

use ads_core::store::{MemoryMultiMap, MemoryStore};
use ads_core::Stores;

pub struct Fixture {
    pub records: Arc<MemoryStore>,
    pub index: Arc<MemoryMultiMap>,
    pub synonyms: Arc<MemoryMultiMap>,
    pub stores: Stores,
}

pub fn fixture() -> Fixture {
    let records = Arc::new(MemoryStore::new());
    let index = Arc::new(MemoryMultiMap::new("inverted_index"));
    let synonyms = Arc::new(MemoryMultiMap::new("synonyms"));
    let stores = Stores {
        records: records.clone(),
        inverted_index: index.clone(),
        synonyms: synonyms.clone(),
    };
    Fixture { records, index, synonyms, stores }
}

impl Fixture {
    pub fn open_sessions(&self) -> usize {
        self.records.open_sessions() + self.index.open_sessions() + self.synonyms.open_sessions()
    }
}

pub const SYNONYMS: &str = r#"{"word": "sneaker", "synonyms": ["shoe", "trainer"]}
{"word": "boot", "synonyms": ["shoe"]}
"#;

pub const CAMPAIGNS: &str = r#"{"campaign_id": 1, "budget": 1500.0}
{"campaign_id": 2, "budget": 800}
"#;

pub const ADS: &str = r#"[
{"ad_id": [10], "campaign_id": [1], "title": ["Red Shoes For Running"], "price": [49.5], "brand": ["Acme"], "detail_url": ["https://example.com/10"]},
{"ad_id": [11], "campaign_id": [1], "title": ["Leather Dress Shoe"], "bid_price": [2.5]},
{"ad_id": [12], "campaign_id": [2], "title": ["Waterproof Hiking Boot"]},
{"ad_id": [13], "campaign_id": [2], "title": ["Trainer socks, 6 pack"]}
]
"#;
