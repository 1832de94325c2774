//! Country reference data consumed by address formatting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Country with an optional address layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    /// ISO code, e.g. `FR`.
    pub code: String,
    pub name: String,
    /// `%(field)s` template; `None` falls back to the default layout.
    pub address_format: Option<String>,
}

impl Country {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            address_format: None,
        }
    }

    pub fn with_address_format(mut self, format: impl Into<String>) -> Self {
        self.address_format = Some(format.into());
        self
    }
}

/// Federal state / region of a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryState {
    pub id: Uuid,
    pub country_id: Uuid,
    pub code: String,
    pub name: String,
}

impl CountryState {
    pub fn new(country_id: Uuid, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            country_id,
            code: code.into(),
            name: name.into(),
        }
    }
}
