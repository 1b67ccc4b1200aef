use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::IapError;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Converts a decimal price string (for example, '4.99') to micro-units,
/// without going through floating point. Returns `None` for malformed input
/// or more than six fractional digits.
pub(crate) fn parse_price_micros(price: &str) -> Option<i64> {
    let price = price.trim();
    let (negative, digits) = match price.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, price),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 6
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<6}").parse().ok()?
    };
    let micros = whole.checked_mul(MICROS_PER_UNIT)?.checked_add(fraction)?;
    Some(if negative { -micros } else { micros })
}

/// Reads and parses a JSON file. A missing file yields `None`.
pub(crate) async fn read_json_file<T: DeserializeOwned>(
    path: &Path,
    on_error: impl Fn(&str, String) -> IapError,
) -> Result<Option<T>, IapError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(on_error("failed to read file", format!("{:?}", e))),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| on_error("failed to parse file", format!("{:?}", e)))
}

/// Writes a value as pretty JSON, replacing the file atomically.
pub(crate) async fn write_json_file<T: Serialize>(
    path: &Path,
    value: &T,
    on_error: impl Fn(&str, String) -> IapError,
) -> Result<(), IapError> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| on_error("failed to serialize value", format!("{:?}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| on_error("failed to create parent directory", format!("{:?}", e)))?;
    }
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, contents)
        .await
        .map_err(|e| on_error("failed to write file", format!("{:?}", e)))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| on_error("failed to replace file", format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_micros() {
        assert_eq!(parse_price_micros("0.99"), Some(990_000));
        assert_eq!(parse_price_micros("4.99"), Some(4_990_000));
        assert_eq!(parse_price_micros("10"), Some(10_000_000));
        assert_eq!(parse_price_micros("1.5"), Some(1_500_000));
        assert_eq!(parse_price_micros(".25"), Some(250_000));
        assert_eq!(parse_price_micros("1.000001"), Some(1_000_001));
    }

    #[test]
    fn test_parse_price_micros_rejects_malformed_input() {
        assert_eq!(parse_price_micros(""), None);
        assert_eq!(parse_price_micros("."), None);
        assert_eq!(parse_price_micros("1,99"), None);
        assert_eq!(parse_price_micros("1.0000001"), None);
        assert_eq!(parse_price_micros("abc"), None);
    }
}
