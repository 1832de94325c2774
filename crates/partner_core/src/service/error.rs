//! Errors surfaced by the partner hierarchy services.

use crate::model::partner::{PartnerId, PartnerValidationError};
use crate::repo::partner_repo::PartnerRepoError;
use crate::service::address_format::TemplateRenderError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by partner services.
pub type PartnerServiceResult<T> = Result<T, PartnerServiceError>;

/// Errors from partner service operations.
///
/// Every variant aborts the triggering write; the atomic scope is rolled
/// back before the error reaches the caller.
#[derive(Debug)]
pub enum PartnerServiceError {
    /// Parent assignment would make a partner its own ancestor.
    CycleDetected {
        partner_id: PartnerId,
        parent_id: PartnerId,
    },
    /// Address layout could not be rendered.
    TemplateRender(TemplateRenderError),
    /// Target partner does not exist.
    PartnerNotFound(PartnerId),
    /// Requested parent does not exist.
    ParentNotFound(PartnerId),
    /// Record or value rejected by model validation.
    Validation(PartnerValidationError),
    /// Creation from text requires an email but none was found.
    EmailRequired,
    /// Synchronization settings rejected by `SyncConfig::validate`.
    InvalidConfig(String),
    /// Store-level failure.
    Repo(PartnerRepoError),
}

impl Display for PartnerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected {
                partner_id,
                parent_id,
            } => write!(
                f,
                "recursive partner hierarchy: partner {partner_id} under parent {parent_id}"
            ),
            Self::TemplateRender(err) => write!(f, "{err}"),
            Self::PartnerNotFound(id) => write!(f, "partner not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent partner not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::EmailRequired => write!(f, "cannot create contact without email address"),
            Self::InvalidConfig(message) => write!(f, "invalid sync config: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PartnerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TemplateRender(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PartnerRepoError> for PartnerServiceError {
    fn from(value: PartnerRepoError) -> Self {
        match value {
            PartnerRepoError::PartnerNotFound(id) => Self::PartnerNotFound(id),
            PartnerRepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<PartnerValidationError> for PartnerServiceError {
    fn from(value: PartnerValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TemplateRenderError> for PartnerServiceError {
    fn from(value: TemplateRenderError) -> Self {
        Self::TemplateRender(value)
    }
}
