//! Record data model: one parsed `identifier:secret|key=value|...` line with
//! its attribute bag and the original text.
//!
//! Attribute keys are stored as written (no case folding). Consumers read the
//! well-known keys through [`Record::attr_or`] with their own fallback, since
//! stats and CSV export deliberately use different defaults for the same key.
use std::collections::HashMap;

/// Well-known attribute keys read by stats, filtering and CSV export.
pub mod keys {
    pub const PLAN: &str = "Plan";
    pub const PHONE_VERIFIED: &str = "PhoneVerified";
    pub const COUNTRY: &str = "Country";
    pub const HOLD: &str = "Hold";
    pub const PAYMENT_METHOD: &str = "PaymentMethod";
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// A parsed credential line.
pub struct Record {
    pub identifier: String,
    pub secret: String,
    pub attributes: HashMap<String, String>,
    /// The input line, trimmed of surrounding whitespace only.
    pub raw: String,
}

impl Record {
    /// Construct a record with no attributes. `raw` is rebuilt as
    /// `identifier:secret`.
    pub fn new(identifier: &str, secret: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            secret: secret.to_string(),
            attributes: HashMap::new(),
            raw: format!("{}:{}", identifier, secret),
        }
    }

    /// Attribute value if present and non-empty.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Attribute value, or `fallback` when absent or empty.
    pub fn attr_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.attr(key).unwrap_or(fallback)
    }

    /// Attribute value as written, or `fallback` only when the key is absent.
    /// An empty value is returned as-is.
    pub fn attr_as_written_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.attributes.get(key).map_or(fallback, String::as_str)
    }

    /// Insert an attribute; a later value for the same key wins.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    /// Builder-style attribute insertion, also appending `|key=value` to `raw`.
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self.raw.push_str(&format!("|{}={}", key, value));
        self
    }
}
