//! Deep redaction of tool output.
//!
//! Structural and deterministic: entries are dropped by key, never
//! rewritten. Values are not inspected — semantic leakage in values is out
//! of scope for this filter and callers must not weaken that assumption by
//! re-inserting dropped keys.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Keys dropped on case-insensitive exact match.
const DENY_KEYS: [&str; 11] = [
    "internal",
    "debug",
    "secrets",
    "tokens",
    "token",
    "key",
    "api_key",
    "secret",
    "db_id",
    "user_id",
    "service_config",
];

const DENY_PATTERN: &str =
    r"(?i)(token|secret|api[_-]?key|private[_-]?key|password|cookie|authorization)";

fn deny_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DENY_PATTERN).expect("deny pattern compiles"))
}

fn key_is_denied(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    DENY_KEYS.contains(&lowered.as_str()) || deny_regex().is_match(key)
}

/// Recursively remove credential- and internals-bearing entries.
///
/// Objects lose denied keys; arrays and nested objects are traversed;
/// primitives pass unchanged.
pub fn redact_deep(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                if key_is_denied(k) {
                    continue;
                }
                out.insert(k.clone(), redact_deep(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_deep).collect()),
        primitive => primitive.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_denied_keys_at_every_depth() {
        let input = json!({
            "public": "ok",
            "token": "abc",
            "nested": { "api_key": "x", "value": 1 },
            "list": [ { "secret": "s", "keep": true } ],
        });
        let out = redact_deep(&input);
        assert_eq!(
            out,
            json!({
                "public": "ok",
                "nested": { "value": 1 },
                "list": [ { "keep": true } ],
            })
        );
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let out = redact_deep(&json!({ "DB_ID": 7, "Internal": {}, "fine": 1 }));
        assert_eq!(out, json!({ "fine": 1 }));
    }

    #[test]
    fn regex_catches_compound_credential_keys() {
        let out = redact_deep(&json!({
            "session_token": "x",
            "apiKey": "x",
            "api-key": "x",
            "private_key": "x",
            "set_cookie": "x",
            "authorization_header": "x",
            "password_hash": "x",
            "keyboard": "stays? no",
        }));
        // "keyboard" does not match the deny regex and is not an exact key.
        assert_eq!(out, json!({ "keyboard": "stays? no" }));
    }

    #[test]
    fn primitives_and_clean_subtrees_pass_unchanged() {
        let input = json!({ "a": [1, 2, {"b": "c"}], "n": null, "f": 1.5 });
        assert_eq!(redact_deep(&input), input);
        assert_eq!(redact_deep(&json!(42)), json!(42));
        assert_eq!(redact_deep(&json!("s")), json!("s"));
    }
}
