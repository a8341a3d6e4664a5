//! Payload Normalizer: turns an arbitrary-shaped webhook body into a
//! canonical [`TransactionRecord`].
//!
//! Validation reports every missing required field at once rather than
//! stopping at the first one. Amounts are normalized to major currency units:
//! strings are parsed as decimals, numbers are treated as minor units and
//! divided by 100 regardless of currency.

use crate::errors::ValidationError;
use crate::models::TransactionRecord;
use crate::webhook_models::PayloadShape;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

const REQUIRED_DATA_FIELDS: [&str; 4] = ["id", "amount", "currency", "status"];

/// Parses raw body bytes as JSON and normalizes them.
pub fn normalize_bytes(body: &[u8]) -> Result<TransactionRecord, ValidationError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    normalize(&payload)
}

/// Extracts a [`TransactionRecord`] from either payload shape.
pub fn normalize(payload: &Value) -> Result<TransactionRecord, ValidationError> {
    let root = payload.as_object().ok_or(ValidationError::InvalidPayload)?;

    let mut missing = Vec::new();

    let id = text_field(root, "id");
    if id.is_none() {
        missing.push("id".to_string());
    }
    let event_type = text_field(root, "event").or_else(|| text_field(root, "type"));
    if event_type.is_none() {
        missing.push("event".to_string());
    }

    let data = match root.get("data") {
        None | Some(Value::Null) => {
            missing.push("data".to_string());
            None
        }
        Some(Value::Object(data)) => Some(data),
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "data".to_string(),
                reason: "expected an object".to_string(),
            })
        }
    };

    if let Some(data) = data {
        for field in REQUIRED_DATA_FIELDS {
            if is_missing(data.get(field)) {
                missing.push(format!("data.{}", field));
            }
        }
        if created_at_value(data).is_none() {
            missing.push("data.createdAt".to_string());
        }
    }

    let (Some(data), true) = (data, missing.is_empty()) else {
        return Err(ValidationError::MissingFields(missing));
    };

    let data_value = root.get("data").cloned().unwrap_or(Value::Null);
    let shape = PayloadShape::detect(&data_value)?;
    let (counterparty_role, counterparty_id) = shape.counterparty();

    let record = TransactionRecord {
        id: scalar_text(data.get("id")),
        event_type: event_type.unwrap_or_default(),
        amount: parse_amount(data.get("amount"))?,
        currency: scalar_text(data.get("currency")),
        status: scalar_text(data.get("status")),
        created_at: parse_created_at(created_at_value(data))?,
        reference: text_field(data, "reference"),
        counterparty_role,
        counterparty_id,
        raw_party_snapshot: data
            .get(counterparty_role.as_str())
            .filter(|v| !v.is_null())
            .cloned(),
        payment_scheme: text_field(data, "paymentScheme"),
        parties: shape.parties(),
    };

    tracing::debug!(
        transaction_id = %record.id,
        shape = shape.name(),
        counterparty_role = %record.counterparty_role,
        counterparty_id = ?record.counterparty_id,
        "Payload normalized"
    );

    Ok(record)
}

/// Converts a JSON amount to major currency units.
pub fn parse_amount(value: Option<&Value>) -> Result<BigDecimal, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField {
        field: "amount".to_string(),
        reason,
    };

    match value {
        Some(Value::String(text)) => BigDecimal::from_str(text.trim())
            .map_err(|e| invalid(format!("'{}' is not a decimal: {}", text, e))),
        Some(Value::Number(number)) => BigDecimal::from_str(&number.to_string())
            .map(|minor| minor / BigDecimal::from(100))
            .map_err(|e| invalid(e.to_string())),
        Some(other) => Err(invalid(format!("unsupported amount value {}", other))),
        None => Err(invalid("missing".to_string())),
    }
}

/// Parses a creation timestamp given as epoch milliseconds or a date string.
pub fn parse_created_at(value: Option<&Value>) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField {
        field: "createdAt".to_string(),
        reason,
    };

    match value {
        Some(Value::Number(number)) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))
                .ok_or_else(|| invalid(format!("{} is not a valid epoch", number)))?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| invalid(format!("{} is out of range", millis)))
        }
        Some(Value::String(text)) => parse_timestamp(text).map_err(invalid),
        _ => Err(invalid("missing".to_string())),
    }
}

/// Parse timestamp string to DateTime<Utc>
fn parse_timestamp(timestamp_str: &str) -> Result<DateTime<Utc>, String> {
    // Try ISO 8601 / RFC3339 format first (standard)
    chrono::DateTime::parse_from_rfc3339(timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::DateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f %z")
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|_| {
            // Naive datetime, assume UTC
            chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .map_err(|e| {
            format!(
                "Invalid timestamp format '{}': {}. Expected ISO 8601 (RFC3339)",
                timestamp_str, e
            )
        })
}

fn created_at_value(data: &Map<String, Value>) -> Option<&Value> {
    ["createdAt", "created_at"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find(|v| !is_missing(Some(v)))
}

/// Absent, `null` and blank strings count as missing. Numeric zero does not.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    let value = object.get(key);
    if is_missing(value) {
        return None;
    }
    Some(scalar_text(value))
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_amount_is_minor_units() {
        let amount = parse_amount(Some(&json!(15050))).unwrap();
        assert_eq!(amount, BigDecimal::from_str("150.50").unwrap());
    }

    #[test]
    fn test_string_amount_is_major_units() {
        let amount = parse_amount(Some(&json!("150.00"))).unwrap();
        assert_eq!(amount, BigDecimal::from_str("150").unwrap());
    }

    #[test]
    fn test_negative_and_zero_amounts_accepted() {
        assert_eq!(
            parse_amount(Some(&json!(-250))).unwrap(),
            BigDecimal::from_str("-2.5").unwrap()
        );
        assert_eq!(
            parse_amount(Some(&json!(0))).unwrap(),
            BigDecimal::from(0)
        );
        assert_eq!(
            parse_amount(Some(&json!("-0.01"))).unwrap(),
            BigDecimal::from_str("-0.01").unwrap()
        );
    }

    #[test]
    fn test_invalid_amount_string() {
        let err = parse_amount(Some(&json!("abc"))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_created_at_epoch_millis_and_strings() {
        let from_millis = parse_created_at(Some(&json!(1_700_000_000_000_i64))).unwrap();
        assert_eq!(from_millis.timestamp(), 1_700_000_000);

        let from_rfc = parse_created_at(Some(&json!("2024-02-14T12:00:00Z"))).unwrap();
        assert_eq!(from_rfc.to_rfc3339(), "2024-02-14T12:00:00+00:00");

        let from_naive = parse_created_at(Some(&json!("2024-02-14 12:00:00"))).unwrap();
        assert_eq!(from_naive, from_rfc);

        assert!(parse_created_at(Some(&json!("yesterday"))).is_err());
    }

    #[test]
    fn test_zero_amount_is_not_missing() {
        let payload = json!({
            "id": "evt_1",
            "event": "PAYMENT.CREATED",
            "data": {
                "id": "pmt_1",
                "amount": 0,
                "currency": "EUR",
                "status": "COMPLETED",
                "createdAt": 1_700_000_000_000_i64
            }
        });
        let record = normalize(&payload).unwrap();
        assert_eq!(record.amount, BigDecimal::from(0));
    }

    #[test]
    fn test_every_missing_field_is_reported() {
        let err = normalize(&json!({"data": {"amount": 1}})).unwrap_err();
        assert_eq!(
            err.missing_fields(),
            ["id", "event", "data.id", "data.currency", "data.status", "data.createdAt"]
        );

        let err = normalize(&json!({"type": "PAYMENT.CREATED"})).unwrap_err();
        assert_eq!(err.missing_fields(), ["id", "data"]);
    }

    #[test]
    fn test_non_object_body_rejected() {
        assert_eq!(
            normalize(&json!([1, 2, 3])).unwrap_err(),
            ValidationError::InvalidPayload
        );
        assert!(matches!(
            normalize_bytes(b"{not json").unwrap_err(),
            ValidationError::MalformedJson(_)
        ));
    }
}
