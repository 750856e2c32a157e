//! crates/trip_mate_core/src/analysis.rs
//!
//! Decoding of the vision model's reply into a trusted `AnalysisResult`.
//!
//! The reply is untrusted text: it may be wrapped in markdown fences or prose,
//! and its enum fields may hold values outside the closed sets.

use crate::domain::{AnalysisResult, Category, ItemType};
use crate::ports::{AiGateway, PortError, PortResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(rename = "type", default)]
    item_type: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// Removes markdown code fences and any prose around the JSON object.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

/// Coerces the model's amount into a non-negative number.
fn coerce_amount(value: Option<&Value>) -> f64 {
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    };
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

/// Parses and validates a raw classifier reply.
///
/// Malformed JSON is a `ClassificationFailed` error. Out-of-range enum values
/// fall back to `other` / `memory`, and non-expense amounts are forced to 0.
pub fn decode_analysis(raw: &str) -> PortResult<AnalysisResult> {
    let json = extract_json_object(raw).ok_or_else(|| {
        PortError::ClassificationFailed("model reply contained no JSON object".to_string())
    })?;
    let parsed: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| PortError::ClassificationFailed(format!("unparseable model reply: {}", e)))?;

    let item_type = parsed
        .item_type
        .as_deref()
        .map(ItemType::from_str_lossy)
        .unwrap_or(ItemType::Memory);
    let category = parsed
        .category
        .as_deref()
        .map(Category::from_str_lossy)
        .unwrap_or(Category::Other);
    let amount = match item_type {
        ItemType::Expense => coerce_amount(parsed.amount.as_ref()),
        ItemType::Memory => 0.0,
    };
    let name = parsed
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| match item_type {
            ItemType::Expense => "Expense".to_string(),
            ItemType::Memory => "Moment".to_string(),
        });

    Ok(AnalysisResult {
        item_type,
        category,
        name,
        amount,
        description: parsed.description.unwrap_or_default().trim().to_string(),
    })
}

/// Classifies one image through the gateway and decodes the reply.
pub async fn analyze_image(
    gateway: &dyn AiGateway,
    base64_data: &str,
    mime_type: &str,
) -> PortResult<AnalysisResult> {
    let raw = gateway.analyze_image_raw(base64_data, mime_type).await?;
    debug!(reply_len = raw.len(), "received classifier reply");
    decode_analysis(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"type\":\"expense\",\"category\":\"food\",\"name\":\"Pho 24\",\"amount\":85000,\"description\":\"\"}\n```";
        let result = decode_analysis(raw).unwrap();
        assert_eq!(result.item_type, ItemType::Expense);
        assert_eq!(result.category, Category::Food);
        assert_eq!(result.name, "Pho 24");
        assert_eq!(result.amount, 85000.0);
    }

    #[test]
    fn tolerates_prose_around_the_object() {
        let raw = "Sure! Here you go: {\"type\":\"memory\",\"category\":\"scenery\",\"name\":\"Ha Long\",\"amount\":0,\"description\":\"Bay views\"} Enjoy.";
        let result = decode_analysis(raw).unwrap();
        assert_eq!(result.category, Category::Scenery);
        assert_eq!(result.description, "Bay views");
    }

    #[test]
    fn unknown_enums_fall_back() {
        let raw = r#"{"type":"receipt","category":"nightlife","name":"Bar","amount":50}"#;
        let result = decode_analysis(raw).unwrap();
        assert_eq!(result.item_type, ItemType::Memory);
        assert_eq!(result.category, Category::Other);
        assert_eq!(result.amount, 0.0);
    }

    #[test]
    fn memory_amounts_are_zeroed() {
        let raw = r#"{"type":"memory","category":"food","name":"Banh mi","amount":30000}"#;
        assert_eq!(decode_analysis(raw).unwrap().amount, 0.0);
    }

    #[test]
    fn string_amounts_are_coerced() {
        let raw = r#"{"type":"expense","category":"stay","name":"Hotel","amount":"1,200,000 VND"}"#;
        assert_eq!(decode_analysis(raw).unwrap().amount, 1_200_000.0);
    }

    #[test]
    fn malformed_reply_is_a_classification_failure() {
        assert!(matches!(
            decode_analysis("I cannot read this image."),
            Err(PortError::ClassificationFailed(_))
        ));
        assert!(matches!(
            decode_analysis("```json\n{\"type\": \"expense\",\n```"),
            Err(PortError::ClassificationFailed(_))
        ));
    }
}
