use serde_json::Value;

pub const REDACTED: &str = "REDACTED";
pub const TRUNCATED_MARKER: &str = "...truncated";

/// Keys whose values never reach logs or audit records.
pub const SENSITIVE_KEYS: [&str; 5] = [
    "password",
    "pwd",
    "credentials",
    "gcpCredential",
    "awsCredential",
];

pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&key)
}

/// Re-serializes a JSON body with sensitive values replaced, emitting at most
/// `max_properties` object properties. Non-JSON input is returned unchanged.
pub fn redact_json(body: &str, max_properties: usize) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    let mut writer = RedactingWriter {
        out: String::with_capacity(body.len()),
        properties: 0,
        max_properties,
        truncated: false,
    };
    writer.write(&value);
    writer.out
}

struct RedactingWriter {
    out: String,
    properties: usize,
    max_properties: usize,
    truncated: bool,
}

impl RedactingWriter {
    fn write(&mut self, value: &Value) {
        if self.truncated {
            return;
        }
        match value {
            Value::Object(map) => {
                self.out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if self.max_properties > 0 && self.properties >= self.max_properties {
                        self.out.push_str(TRUNCATED_MARKER);
                        self.truncated = true;
                        return;
                    }
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.properties += 1;
                    self.out.push_str(&Value::String(key.clone()).to_string());
                    self.out.push(':');
                    if is_sensitive_key(key) {
                        self.out.push('"');
                        self.out.push_str(REDACTED);
                        self.out.push('"');
                    } else {
                        self.write(item);
                        if self.truncated {
                            return;
                        }
                    }
                }
                self.out.push('}');
            }
            Value::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write(item);
                    if self.truncated {
                        return;
                    }
                }
                self.out.push(']');
            }
            scalar => self.out.push_str(&scalar.to_string()),
        }
    }
}

/// Shortens `s` to at most `max` bytes as `[<original length>]<prefix>...`,
/// cutting on a character boundary.
pub fn truncate_string(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let head = format!("[{}]", s.len());
    let room = max.saturating_sub(head.len() + 3);
    let mut end = room.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}...", head, &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_values_are_redacted_at_any_depth() {
        let out = redact_json(
            r#"{"name":"edge","password":"p","nested":{"awsCredential":{"key":"k"}},"list":[{"pwd":"x"}]}"#,
            50,
        );
        assert!(!out.contains("\"p\""));
        assert!(!out.contains("\"k\""));
        assert!(out.contains(r#""password":"REDACTED""#));
        assert!(out.contains(r#""awsCredential":"REDACTED""#));
        assert!(out.contains(r#""pwd":"REDACTED""#));
        assert!(out.contains(r#""name":"edge""#));
    }

    #[test]
    fn key_match_is_exact() {
        let out = redact_json(r#"{"passwordHint":"h"}"#, 50);
        assert_eq!(out, r#"{"passwordHint":"h"}"#);
    }

    #[test]
    fn output_stops_after_property_limit() {
        let out = redact_json(r#"{"a":1,"b":2,"c":3}"#, 2);
        assert_eq!(out, r#"{"a":1,"b":2...truncated"#);
    }

    #[test]
    fn non_json_body_is_kept() {
        assert_eq!(redact_json("plain text", 50), "plain text");
    }

    #[test]
    fn truncation_keeps_length_and_char_boundaries() {
        assert_eq!(truncate_string("short", 1024), "short");

        let long = "x".repeat(2000);
        let out = truncate_string(&long, 1024);
        assert!(out.starts_with("[2000]xxx"));
        assert!(out.ends_with("..."));
        assert_eq!(out.len(), 1024);

        let wide = "é".repeat(20);
        let out = truncate_string(&wide, 16);
        assert!(out.len() <= 16);
        assert!(out.starts_with("[40]"));
    }
}
