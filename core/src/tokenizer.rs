use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a", "an", "and", "are", "as", "at",
            "be", "but", "by",
            "for",
            "if", "in", "into", "is", "it",
            "no", "not",
            "of", "on", "or",
            "such",
            "that", "the", "their", "then", "there", "these", "they", "this", "to",
            "was", "will", "with",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Normalize text into keywords: NFKC, lowercase, word split, stopword removal, stemming.
///
/// Token order is preserved and repeated stems are kept. Ad titles at ingestion time and
/// query strings at search time both go through this function, so the index and the
/// lookups always agree on the keyword form.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut keywords = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        keywords.push(STEMMER.stem(token).into_owned());
    }
    keywords
}

/// Same as [`tokenize`], with an absent value treated as empty text.
pub fn tokenize_opt(text: Option<&str>) -> Vec<String> {
    text.map(tokenize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn keeps_duplicate_stems_in_order() {
        assert_eq!(tokenize("shoe shoes Shoe"), vec!["shoe", "shoe", "shoe"]);
    }

    #[test]
    fn numbers_survive() {
        let t = tokenize("32GB usb 3.0 drive");
        assert_eq!(t[0], "32gb");
        assert!(t.contains(&"usb".to_string()));
        assert!(t.contains(&"3".to_string()));
    }
}
