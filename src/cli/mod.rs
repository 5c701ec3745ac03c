pub mod import;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::error::CatalogError;
use crate::query::Criteria;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `key=value` pairs as given on the command line.
pub fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

pub fn criteria(filters: Vec<(String, String)>) -> Criteria {
    filters.into_iter().collect()
}

/// Command-line JSON payload; only objects are accepted.
pub fn parse_payload(raw: &str) -> Result<Value, CatalogError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CatalogError::InvalidArgument(format!("payload is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(CatalogError::InvalidArgument(
            "payload must be a JSON object".into(),
        ));
    }
    Ok(value)
}
