//! Dot-path access to a parsed JSON configuration document
//!
//! Concentrator configuration files are JSON with C-style comments allowed.
//! [`ConfigDocument`] strips the comments, parses the text and then answers
//! lookups such as `radio_0.freq` relative to a root object.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Parsed configuration document scoped to one JSON object
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    root: Map<String, Value>,
}

impl ConfigDocument {
    /// Parse `text` (comments allowed) and scope it to the top-level object `section`
    ///
    /// Returns `Ok(None)` when the document is valid but has no such object.
    pub fn parse_section(text: &str, section: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(&strip_comments(text))?;
        let Value::Object(mut top) = value else {
            return Err(Error::Config("top-level JSON value is not an object".into()));
        };
        match top.remove(section) {
            Some(Value::Object(root)) => Ok(Some(Self { root })),
            _ => Ok(None),
        }
    }

    /// Read and parse `path`, scoped to `section`
    pub fn load_section<P: AsRef<Path>>(path: P, section: &str) -> Result<Option<Self>> {
        let text = fs::read_to_string(path)?;
        Self::parse_section(&text, section)
    }

    /// Raw value at a dot path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// True when `path` names a JSON object
    pub fn has_object(&self, path: &str) -> bool {
        matches!(self.get(path), Some(Value::Object(_)))
    }

    /// Boolean at `path`, `None` if absent or not a boolean
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    /// Number at `path` as f64, `None` if absent or not a number
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    /// Number at `path` truncated to an integer
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        let value = self.get(path)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    /// String at `path`
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }
}

/// Remove `//` line comments and `/* */` block comments outside of strings
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let lookahead = chars.peek().copied();
        match (c, lookahead) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                // Keep the newline so line numbers in parse errors stay right
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        /* board settings */
        "SX1301_conf": {
            "lorawan_public": true, // sync word
            "clksrc": 1,
            "radio_0": { "enable": true, "freq": 915000000, "type": "SX1257" },
            "note": "http://example.com/*not-a-comment*/"
        }
    }"#;

    #[test]
    fn test_strip_comments_keeps_strings() {
        let stripped = strip_comments(SAMPLE);
        assert!(!stripped.contains("board settings"));
        assert!(!stripped.contains("sync word"));
        assert!(stripped.contains("http://example.com/*not-a-comment*/"));
    }

    #[test]
    fn test_dot_path_lookup() {
        let doc = ConfigDocument::parse_section(SAMPLE, "SX1301_conf")
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_bool("lorawan_public"), Some(true));
        assert_eq!(doc.get_i64("clksrc"), Some(1));
        assert_eq!(doc.get_i64("radio_0.freq"), Some(915_000_000));
        assert_eq!(doc.get_str("radio_0.type"), Some("SX1257"));
        assert!(doc.has_object("radio_0"));
        assert!(!doc.has_object("radio_1"));
        assert_eq!(doc.get_bool("radio_0.freq"), None);
    }

    #[test]
    fn test_missing_section_is_none() {
        let doc = ConfigDocument::parse_section(r#"{"gateway_conf": {}}"#, "SX1301_conf").unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let result = ConfigDocument::parse_section("{ not json", "SX1301_conf");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_float_numbers_truncate() {
        let doc = ConfigDocument::parse_section(
            r#"{"SX1301_conf": {"chan_multiSF_0": {"if": -200000.0}}}"#,
            "SX1301_conf",
        )
        .unwrap()
        .unwrap();
        assert_eq!(doc.get_i64("chan_multiSF_0.if"), Some(-200_000));
    }
}
