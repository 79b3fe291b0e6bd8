use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

pub struct Utils {

}

impl Utils {
    /// Accepts identifiers the backend sends either as strings or as numbers.
    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number, found {}",
                other
            ))),
        }
    }

    /// Amounts arrive as numbers, numeric strings, or null. Null and blank
    /// strings become `None`.
    pub fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Decimal::from_str(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map(Some)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "expected an amount, found {}",
                other
            ))),
        }
    }

    /// Shorten long hashes and addresses for table output: `0x1234…abcd`.
    pub fn abbreviate(s: &str, keep: usize) -> String {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() <= keep * 2 + 1 {
            return s.to_owned();
        }
        let head: String = chars[..keep].iter().collect();
        let tail: String = chars[chars.len() - keep..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "Utils::string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "Utils::opt_decimal")]
        amount: Option<Decimal>,
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_string_or_number() {
        let p: Probe = serde_json::from_str(r#"{"id":42}"#).unwrap();
        assert_eq!(p.id, "42");
        let p: Probe = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(p.id, "abc");
        assert!(serde_json::from_str::<Probe>(r#"{"id":true}"#).is_err());
    }

    #[test]
    fn test_opt_decimal_forms() {
        let p: Probe = serde_json::from_str(r#"{"id":1,"amount":"12.50"}"#).unwrap();
        assert_eq!(p.amount, Some(dec("12.50")));
        let p: Probe = serde_json::from_str(r#"{"id":1,"amount":0.25}"#).unwrap();
        assert_eq!(p.amount, Some(dec("0.25")));
        let p: Probe = serde_json::from_str(r#"{"id":1,"amount":null}"#).unwrap();
        assert_eq!(p.amount, None);
        let p: Probe = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert_eq!(p.amount, None);
        assert!(serde_json::from_str::<Probe>(r#"{"id":1,"amount":"lots"}"#).is_err());
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(Utils::abbreviate("0x1234567890abcdef", 4), "0x12…cdef");
        assert_eq!(Utils::abbreviate("short", 4), "short");
    }
}
