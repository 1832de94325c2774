//! Synchronization configuration.
//!
//! # Responsibility
//! - Hold the tunable parts of the hierarchy engine: which fields are
//!   owned by the commercial entity and the fallback address layout.
//!
//! # Invariants
//! - Commercial fields never include address or structural fields.

use crate::model::partner::PartnerField;
use crate::service::address_format::DEFAULT_ADDRESS_FORMAT;
use serde::Deserialize;

/// Engine configuration, deserializable from any serde format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Ordered fields owned by the commercial entity.
    pub commercial_fields: Vec<PartnerField>,
    /// Layout used when a partner's country provides none.
    pub default_address_format: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commercial_fields: vec![PartnerField::Vat, PartnerField::CreditLimit],
            default_address_format: DEFAULT_ADDRESS_FORMAT.to_string(),
        }
    }
}

impl SyncConfig {
    /// Checks that the configured field sets can be synchronized.
    ///
    /// # Errors
    /// - A commercial field is structural (`parent`, `is_company`, ...).
    /// - A commercial field is also an address field.
    /// - The default address format is blank.
    pub fn validate(&self) -> Result<(), String> {
        for field in &self.commercial_fields {
            if field.is_structural() {
                return Err(format!(
                    "field `{field}` shapes the hierarchy and cannot be a commercial field"
                ));
            }
            if field.is_address() {
                return Err(format!(
                    "field `{field}` is an address field and cannot be a commercial field"
                ));
            }
        }
        if self.default_address_format.trim().is_empty() {
            return Err("default_address_format cannot be empty".to_string());
        }
        Ok(())
    }
}
