//! Record decoding: one raw transport line in, one validated record out

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive sentiment bounds a record must fall inside to be accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentRange {
    pub min: f64,
    pub max: f64,
}

impl SentimentRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for SentimentRange {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
        }
    }
}

/// Wire encoding of a single message line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Jsonl,
    Csv,
}

/// A single categorized sentiment observation, immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub category: String,
    pub sentiment: f64,
    /// Unix timestamp (seconds) at which the sentiment was observed
    pub observed_at: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("sentiment {value} outside configured range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("record has empty category")]
    EmptyCategory,
}

/// Raw JSON shape before validation. Timestamps arrive as epoch seconds
/// or an ISO-8601 string, so the field stays untyped until `parse_timestamp`.
#[derive(Deserialize)]
struct RawRecord {
    category: Option<String>,
    sentiment: Option<f64>,
    #[serde(alias = "timestamp")]
    observed_at: Option<serde_json::Value>,
}

/// Decode one message line into a validated [`SentimentRecord`].
///
/// JSON lines are one object per message; CSV rows are fixed-order
/// `category,sentiment,timestamp`. All failures are returned, never panicked.
pub fn decode(
    line: &str,
    format: RecordFormat,
    range: SentimentRange,
) -> Result<SentimentRecord, DecodeError> {
    match format {
        RecordFormat::Jsonl => decode_json(line, range),
        RecordFormat::Csv => decode_csv(line, range),
    }
}

fn decode_json(line: &str, range: SentimentRange) -> Result<SentimentRecord, DecodeError> {
    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let category = raw.category.unwrap_or_default();
    let sentiment = raw
        .sentiment
        .ok_or_else(|| DecodeError::Malformed("missing field `sentiment`".to_string()))?;
    let observed_at = match raw.observed_at {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| DecodeError::Malformed("timestamp not representable".to_string()))?,
        Some(serde_json::Value::String(s)) => parse_timestamp(&s)?,
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "timestamp has unexpected type: {}",
                other
            )))
        }
        None => {
            return Err(DecodeError::Malformed(
                "missing field `observed_at`".to_string(),
            ))
        }
    };

    validate(category, sentiment, observed_at, range)
}

fn decode_csv(line: &str, range: SentimentRange) -> Result<SentimentRecord, DecodeError> {
    // Fixed column order: category,sentiment,timestamp
    let mut parts = line.splitn(3, ',');
    let category = parts
        .next()
        .ok_or_else(|| DecodeError::Malformed("empty row".to_string()))?
        .trim()
        .to_string();
    let sentiment_str = parts
        .next()
        .ok_or_else(|| DecodeError::Malformed("missing sentiment column".to_string()))?
        .trim();
    let timestamp_str = parts
        .next()
        .ok_or_else(|| DecodeError::Malformed("missing timestamp column".to_string()))?
        .trim();

    let sentiment: f64 = sentiment_str
        .parse()
        .map_err(|_| DecodeError::Malformed(format!("invalid sentiment: {}", sentiment_str)))?;
    let observed_at = parse_timestamp(timestamp_str)?;

    validate(category, sentiment, observed_at, range)
}

/// Accepts epoch seconds or ISO-8601 (e.g. `2026-08-30T12:00:00Z`).
fn parse_timestamp(s: &str) -> Result<i64, DecodeError> {
    if let Ok(epoch) = s.parse::<i64>() {
        return Ok(epoch);
    }
    if let Ok(epoch) = s.parse::<f64>() {
        return Ok(epoch as i64);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .map_err(|_| DecodeError::Malformed(format!("invalid timestamp: {}", s)))
}

fn validate(
    category: String,
    sentiment: f64,
    observed_at: i64,
    range: SentimentRange,
) -> Result<SentimentRecord, DecodeError> {
    if category.trim().is_empty() {
        return Err(DecodeError::EmptyCategory);
    }
    if !sentiment.is_finite() {
        return Err(DecodeError::Malformed(
            "sentiment is not a finite number".to_string(),
        ));
    }
    // Rejected, not clamped
    if !range.contains(sentiment) {
        return Err(DecodeError::OutOfRange {
            value: sentiment,
            min: range.min,
            max: range.max,
        });
    }

    Ok(SentimentRecord {
        category,
        sentiment,
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> SentimentRange {
        SentimentRange::default()
    }

    #[test]
    fn test_decode_json_record() {
        let line = r#"{"category": "tech", "sentiment": 0.8, "observed_at": 1700000000}"#;
        let record = decode(line, RecordFormat::Jsonl, range()).unwrap();
        assert_eq!(record.category, "tech");
        assert_eq!(record.sentiment, 0.8);
        assert_eq!(record.observed_at, 1700000000);
    }

    #[test]
    fn test_decode_json_timestamp_alias() {
        // Producers using `timestamp` instead of `observed_at` are accepted
        let line = r#"{"category": "sports", "sentiment": -0.2, "timestamp": 1700000005}"#;
        let record = decode(line, RecordFormat::Jsonl, range()).unwrap();
        assert_eq!(record.observed_at, 1700000005);
    }

    #[test]
    fn test_decode_json_iso8601_timestamp() {
        let line = r#"{"category": "news", "sentiment": 0.1, "observed_at": "2023-11-14T22:13:20Z"}"#;
        let record = decode(line, RecordFormat::Jsonl, range()).unwrap();
        assert_eq!(record.observed_at, 1700000000);
    }

    #[test]
    fn test_decode_csv_record() {
        let record = decode("tech,0.5,1700000000", RecordFormat::Csv, range()).unwrap();
        assert_eq!(record.category, "tech");
        assert_eq!(record.sentiment, 0.5);
        assert_eq!(record.observed_at, 1700000000);
    }

    #[test]
    fn test_missing_category_is_empty_category() {
        let line = r#"{"sentiment": 0.5, "observed_at": 1700000000}"#;
        assert_eq!(
            decode(line, RecordFormat::Jsonl, range()),
            Err(DecodeError::EmptyCategory)
        );
    }

    #[test]
    fn test_blank_category_rejected() {
        assert_eq!(
            decode("   ,0.5,1700000000", RecordFormat::Csv, range()),
            Err(DecodeError::EmptyCategory)
        );
    }

    #[test]
    fn test_out_of_range_rejected_not_clamped() {
        let line = r#"{"category": "tech", "sentiment": 2.5, "observed_at": 1700000000}"#;
        match decode(line, RecordFormat::Jsonl, range()) {
            Err(DecodeError::OutOfRange { value, min, max }) => {
                assert_eq!(value, 2.5);
                assert_eq!(min, -1.0);
                assert_eq!(max, 1.0);
            }
            other => panic!("expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_boundary_values_accepted() {
        let record = decode("tech,1.0,1700000000", RecordFormat::Csv, range()).unwrap();
        assert_eq!(record.sentiment, 1.0);
        let record = decode("tech,-1.0,1700000000", RecordFormat::Csv, range()).unwrap();
        assert_eq!(record.sentiment, -1.0);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            decode("not json at all", RecordFormat::Jsonl, range()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_mistyped_sentiment_rejected() {
        let line = r#"{"category": "tech", "sentiment": "very positive", "observed_at": 1700000000}"#;
        assert!(matches!(
            decode(line, RecordFormat::Jsonl, range()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_csv_missing_columns_rejected() {
        assert!(matches!(
            decode("tech,0.5", RecordFormat::Csv, range()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_custom_range() {
        let wide = SentimentRange::new(0.0, 5.0);
        assert!(decode("tech,4.5,1700000000", RecordFormat::Csv, wide).is_ok());
        assert!(matches!(
            decode("tech,-0.5,1700000000", RecordFormat::Csv, wide),
            Err(DecodeError::OutOfRange { .. })
        ));
    }
}
