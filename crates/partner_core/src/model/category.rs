//! Partner category (tag) model.
//!
//! # Invariants
//! - Categories form a forest through `parent_id`, like partners.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable category identifier.
pub type CategoryId = Uuid;

/// Hierarchical tag attached to partners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerCategory {
    pub id: CategoryId,
    pub name: String,
    /// Color index for UI chips.
    pub color: i64,
    pub parent_id: Option<CategoryId>,
    pub active: bool,
}

impl PartnerCategory {
    pub fn new(name: impl Into<String>, parent_id: Option<CategoryId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color: 0,
            parent_id,
            active: true,
        }
    }
}
