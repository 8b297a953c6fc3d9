use ads_core::tokenizer::{tokenize, tokenize_opt};

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization keeps the accented form intact
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn ad_title_keywords() {
    let words = tokenize("Red Shoes For Running");
    assert_eq!(words, vec!["red".to_string(), "shoe".to_string(), "run".to_string()]);
    assert!(!words.contains(&"for".to_string()));
}

#[test]
fn empty_and_absent_input() {
    assert!(tokenize("").is_empty());
    assert!(tokenize_opt(None).is_empty());
    assert!(tokenize("  ,,  ").is_empty());
}

#[test]
fn deterministic() {
    let title = "Men's Waterproof Hiking Boots, Size 10";
    assert_eq!(tokenize(title), tokenize(title));
    assert_eq!(tokenize_opt(Some(title)), tokenize(title));
}
