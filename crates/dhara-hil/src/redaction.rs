//! Masking of secret-looking argument values before they leave the process.
//!
//! Two rules apply, both only to string values:
//!
//! 1. The field name is one of a fixed set of secret-indicating names,
//!    compared case-insensitively.
//! 2. The value is longer than 12 characters and contains a contiguous ASCII
//!    alphanumeric run of at least 12 characters.
//!
//! Everything else, including every non-string value, is copied unchanged.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Replacement for masked values.
pub const MASK: &str = "***REDACTED***";

const SECRET_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "token",
    "password",
    "authorization",
    "cookie",
];

const MIN_MASKED_LEN: usize = 12;

static OPAQUE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]{12,}").expect("invalid regex"));

/// Why a field was masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionReason {
    /// The field name is a known secret name.
    SecretKey,
    /// The value looks like an opaque token.
    HighEntropy,
}

/// A single masked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedField {
    /// Field name.
    pub key: String,
    /// Rule that triggered.
    pub reason: RedactionReason,
}

/// Which fields were masked and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionReport {
    /// Masked fields in input order.
    pub fields: Vec<RedactedField>,
}

impl RedactionReport {
    /// Whether nothing was masked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The reason `key` was masked, if it was.
    #[must_use]
    pub fn reason_for(&self, key: &str) -> Option<RedactionReason> {
        self.fields.iter().find(|f| f.key == key).map(|f| f.reason)
    }
}

fn is_secret_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SECRET_KEYS.contains(&lowered.as_str())
}

fn looks_opaque(value: &str) -> bool {
    value.chars().count() > MIN_MASKED_LEN && OPAQUE_RUN.is_match(value)
}

/// Return a masked copy of `args` together with a report of what was masked.
#[must_use]
pub fn redact(args: &Map<String, Value>) -> (Map<String, Value>, RedactionReport) {
    let mut report = RedactionReport::default();
    let redacted = args
        .iter()
        .map(|(key, value)| {
            let reason = match value {
                Value::String(_) if is_secret_key(key) => Some(RedactionReason::SecretKey),
                Value::String(s) if looks_opaque(s) => Some(RedactionReason::HighEntropy),
                _ => None,
            };
            match reason {
                Some(reason) => {
                    report.fields.push(RedactedField {
                        key: key.clone(),
                        reason,
                    });
                    (key.clone(), Value::String(MASK.to_owned()))
                },
                None => (key.clone(), value.clone()),
            }
        })
        .collect();
    (redacted, report)
}

/// Convenience wrapper returning only the masked copy.
#[must_use]
pub fn redacted(args: &Map<String, Value>) -> Map<String, Value> {
    redact(args).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn secret_keys_are_masked_case_insensitively() {
        let args = map(json!({
            "API_KEY": "abc",
            "Password": "hunter2",
            "cookie": "session=1",
            "to": "bob@example.com",
        }));
        let (out, report) = redact(&args);

        assert_eq!(out["API_KEY"], MASK);
        assert_eq!(out["Password"], MASK);
        assert_eq!(out["cookie"], MASK);
        assert_eq!(out["to"], "bob@example.com");
        assert_eq!(report.reason_for("API_KEY"), Some(RedactionReason::SecretKey));
        assert_eq!(report.fields.len(), 3);
    }

    #[test]
    fn long_alphanumeric_runs_are_masked() {
        let args = map(json!({
            "note": "use sk4f9a8b7c6d5e4f3 for auth",
            "short": "abcdefghijkl",
            "spaced": "hello there general kenobi",
        }));
        let (out, report) = redact(&args);

        assert_eq!(out["note"], MASK);
        assert_eq!(report.reason_for("note"), Some(RedactionReason::HighEntropy));
        // exactly 12 characters is not longer than the threshold
        assert_eq!(out["short"], "abcdefghijkl");
        assert_eq!(out["spaced"], "hello there general kenobi");
    }

    #[test]
    fn non_string_values_pass_through() {
        let args = map(json!({
            "token": 123_456_789_012_345_u64,
            "nested": {"password": "x"},
            "flags": [true, false],
        }));
        let (out, report) = redact(&args);

        assert_eq!(out, args);
        assert!(report.is_empty());
    }

    #[test]
    fn input_is_not_modified() {
        let args = map(json!({"token": "abc"}));
        let _ = redact(&args);
        assert_eq!(args["token"], "abc");
    }

    #[test]
    fn report_serializes_reason_names() {
        let args = map(json!({"token": "abc"}));
        let (_, report) = redact(&args);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            json!({"fields": [{"key": "token", "reason": "secret_key"}]})
        );
    }
}
