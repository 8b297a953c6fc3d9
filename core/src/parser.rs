//! Line-level record parsing for the ads, campaigns and synonyms corpora.
//!
//! Every field may be a bare scalar or a single-element array wrapping one; only the
//! first element of an array counts. Required fields that are missing or null make the
//! line a skip, reported through `tracing` with the line number and the field name.

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{Ad, Campaign, Synonym, DEFAULT_BID_PRICE, DEFAULT_PRICE};

type Object = Map<String, Value>;

pub fn parse_ad(line: &str, line_no: usize) -> Result<Ad, ParseError> {
    report("ad", ad_from_line(line, line_no))
}

pub fn parse_campaign(line: &str, line_no: usize) -> Result<Campaign, ParseError> {
    report("campaign", campaign_from_line(line, line_no))
}

pub fn parse_synonym(line: &str, line_no: usize) -> Result<Synonym, ParseError> {
    report("synonym", synonym_from_line(line, line_no))
}

fn ad_from_line(line: &str, line_no: usize) -> Result<Ad, ParseError> {
    let obj = parse_object(line, line_no)?;
    let ad_id = required_id(&obj, "ad_id", line_no)?;
    let campaign_id = required_id(&obj, "campaign_id", line_no)?;
    let title = optional_text(&obj, "title")
        .filter(|t| !t.trim().is_empty())
        .ok_or(ParseError::MissingField { line: line_no, field: "title" })?;

    let mut ad = Ad::new(ad_id, campaign_id, title);
    ad.price = optional_number(&obj, "price").unwrap_or(DEFAULT_PRICE);
    ad.bid_price = optional_number(&obj, "bid_price").unwrap_or(DEFAULT_BID_PRICE);
    ad.brand = optional_text(&obj, "brand").unwrap_or_default();
    ad.thumbnail = optional_text(&obj, "thumbnail").unwrap_or_default();
    ad.detail_url = optional_text(&obj, "detail_url").unwrap_or_default();
    ad.category = optional_text(&obj, "category").unwrap_or_default();
    Ok(ad)
}

fn campaign_from_line(line: &str, line_no: usize) -> Result<Campaign, ParseError> {
    let obj = parse_object(line, line_no)?;
    let campaign_id = required_id(&obj, "campaign_id", line_no)?;
    let value = scalar(&obj, "budget").ok_or(ParseError::MissingField { line: line_no, field: "budget" })?;
    let budget = as_number(value).ok_or_else(|| ParseError::InvalidField {
        line: line_no,
        field: "budget",
        value: value.to_string(),
    })?;
    Ok(Campaign { campaign_id, budget })
}

fn synonym_from_line(line: &str, line_no: usize) -> Result<Synonym, ParseError> {
    let obj = parse_object(line, line_no)?;
    let word = optional_text(&obj, "word").ok_or(ParseError::MissingField { line: line_no, field: "word" })?;
    let synonyms: Vec<String> = match obj.get("synonyms") {
        Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
        Some(other) => as_text(other).into_iter().collect(),
        None => Vec::new(),
    };
    if synonyms.is_empty() {
        return Err(ParseError::MissingField { line: line_no, field: "synonyms" });
    }
    Ok(Synonym { word, synonyms })
}

fn report<T>(kind: &'static str, result: Result<T, ParseError>) -> Result<T, ParseError> {
    if let Err(err) = &result {
        match err {
            ParseError::MissingField { line, field } | ParseError::InvalidField { line, field, .. } => {
                tracing::warn!(line, field, kind, "skipping record: {err}");
            }
            _ => tracing::warn!(line = err.line(), kind, "skipping record: {err}"),
        }
    }
    result
}

fn parse_object(line: &str, line_no: usize) -> Result<Object, ParseError> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err(ParseError::NotAnObject { line: line_no }),
        Err(source) => Err(ParseError::Malformed { line: line_no, source }),
    }
}

/// The field's scalar value: arrays contribute their first element, null counts as absent.
fn scalar<'a>(obj: &'a Object, field: &str) -> Option<&'a Value> {
    let value = match obj.get(field)? {
        Value::Array(items) => items.first()?,
        v => v,
    };
    if value.is_null() { None } else { Some(value) }
}

fn required_id(obj: &Object, field: &'static str, line_no: usize) -> Result<u64, ParseError> {
    let value = scalar(obj, field).ok_or(ParseError::MissingField { line: line_no, field })?;
    as_id(value).ok_or_else(|| ParseError::InvalidField { line: line_no, field, value: value.to_string() })
}

fn optional_text(obj: &Object, field: &str) -> Option<String> {
    scalar(obj, field).and_then(as_text)
}

fn optional_number(obj: &Object, field: &str) -> Option<f64> {
    let value = scalar(obj, field)?;
    let parsed = as_number(value);
    if parsed.is_none() {
        tracing::debug!(field, value = %value, "unparseable number, using default");
    }
    parsed
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    #[test]
    fn array_wrapped_fields_use_first_element() {
        let ad = parse_ad(
            r#"{"ad_id": [7], "campaign_id": ["3"], "title": ["Trail Running Shoes"], "brand": ["Acme"], "price": ["$59.99"]}"#,
            1,
        )
        .unwrap();
        assert_eq!(ad.ad_id, 7);
        assert_eq!(ad.campaign_id, 3);
        assert_eq!(ad.brand, "Acme");
        assert_eq!(ad.price, 59.99);
        assert_eq!(ad.key_words, tokenize("Trail Running Shoes"));
    }

    #[test]
    fn null_first_element_is_missing() {
        let err = parse_ad(r#"{"ad_id": [null], "campaign_id": 1, "title": "x"}"#, 4).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { line: 4, field: "ad_id" }));
    }

    #[test]
    fn empty_title_is_missing() {
        let err = parse_ad(r#"{"ad_id": 1, "campaign_id": 1, "title": "  "}"#, 2).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "title", .. }));
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let err = parse_campaign(r#"{"campaign_id": "abc", "budget": 10}"#, 9).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { line: 9, field: "campaign_id", .. }));
    }

    #[test]
    fn trailing_comma_is_tolerated() {
        let c = parse_campaign(r#"{"campaign_id": 5, "budget": 1500.5},"#, 1).unwrap();
        assert_eq!(c, Campaign { campaign_id: 5, budget: 1500.5 });
    }

    #[test]
    fn scalar_synonym_list_is_accepted() {
        let s = parse_synonym(r#"{"word": "sneaker", "synonyms": "shoe"}"#, 1).unwrap();
        assert_eq!(s.synonyms, vec!["shoe"]);
    }

    #[test]
    fn campaign_without_budget_is_skipped() {
        let err = parse_campaign(r#"{"campaign_id": 1}"#, 3).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { line: 3, field: "budget" }));
    }

    #[test]
    fn ad_without_campaign_is_skipped() {
        let err = parse_ad(r#"{"ad_id": 1, "title": "Trail shoes"}"#, 6).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { line: 6, field: "campaign_id" }));
    }

    #[test]
    fn synonym_without_word_is_skipped() {
        let err = parse_synonym(r#"{"synonyms": ["shoe"]}"#, 2).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { line: 2, field: "word" }));
    }

    #[test]
    fn empty_synonym_list_is_skipped() {
        for (line_no, line) in [
            r#"{"word": "sneaker", "synonyms": []}"#,
            r#"{"word": "sneaker", "synonyms": [null, null]}"#,
            r#"{"word": "sneaker"}"#,
        ]
        .into_iter()
        .enumerate()
        {
            let err = parse_synonym(line, line_no + 1).unwrap_err();
            assert!(
                matches!(err, ParseError::MissingField { field: "synonyms", line } if line == line_no + 1),
                "{line}: {err}"
            );
        }
    }
}
