//! Request-scoped flags.
//!
//! Small string map read by display and creation helpers, e.g.
//! `show_address`, `force_email`, `default_email`,
//! `partner_category_display`.

use std::collections::BTreeMap;

/// Opaque request context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value for `key`, or an empty string.
    pub fn get_string(&self, key: &str) -> &str {
        self.values.get(key).map_or("", String::as_str)
    }

    /// `true` for `1`, `true`, `yes` (case-insensitive); otherwise `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get_string(key).trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )
    }
}
