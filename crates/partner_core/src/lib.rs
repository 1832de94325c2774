//! Partner hierarchy core.
//! Owns the partner tree invariants: acyclic parents, commercial entity
//! resolution and field propagation between relatives.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::SyncConfig;
pub use context::Context;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::category::{CategoryId, PartnerCategory};
pub use model::country::{Country, CountryState};
pub use model::partner::{
    FieldValue, Partner, PartnerField, PartnerId, PartnerType, PartnerValidationError,
    PartnerValues, ADDRESS_FIELDS,
};
pub use repo::category_repo::{
    CategoryRepoError, CategoryRepoResult, CategoryRepository, SqliteCategoryRepository,
};
pub use repo::partner_repo::{
    PartnerRepoError, PartnerRepoResult, PartnerRepository, SqlitePartnerRepository,
};
pub use service::address::address_get;
pub use service::address_format::{
    parse_default_address, render_address, AddressData, TemplateRenderError,
    DEFAULT_ADDRESS_FORMAT,
};
pub use service::category_service::{CategoryService, CategoryServiceError, CategoryServiceResult};
pub use service::commercial::resolve_commercial_partner;
pub use service::error::{PartnerServiceError, PartnerServiceResult};
pub use service::hierarchy::check_no_cycle;
pub use service::naming::parse_partner_name;
pub use service::partner_service::PartnerService;
pub use service::sync::WriteOptions;

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
