//! Partner category use-case service.
//!
//! # Invariants
//! - The category tree stays acyclic: moves are checked before they are
//!   persisted.
//! - Names are trimmed and never blank.

use crate::context::Context;
use crate::model::category::{CategoryId, PartnerCategory};
use crate::model::partner::PartnerId;
use crate::repo::category_repo::{CategoryRepoError, CategoryRepository};
use crate::service::hierarchy;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Context key selecting the leaf-only label.
pub const CTX_CATEGORY_DISPLAY: &str = "partner_category_display";

const PATH_SEPARATOR: &str = " / ";
const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Result type used by category services.
pub type CategoryServiceResult<T> = Result<T, CategoryServiceError>;

/// Service error for category use-cases.
#[derive(Debug)]
pub enum CategoryServiceError {
    /// Move would make a category its own ancestor.
    CycleDetected {
        category_id: CategoryId,
        parent_id: CategoryId,
    },
    /// Category name is blank.
    NameRequired,
    CategoryNotFound(CategoryId),
    ParentNotFound(CategoryId),
    Repo(CategoryRepoError),
}

impl Display for CategoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected {
                category_id,
                parent_id,
            } => write!(
                f,
                "recursive tags: category {category_id} under parent {parent_id}"
            ),
            Self::NameRequired => write!(f, "tag name cannot be empty"),
            Self::CategoryNotFound(id) => write!(f, "partner category not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent category not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CategoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CategoryRepoError> for CategoryServiceError {
    fn from(value: CategoryRepoError) -> Self {
        match value {
            CategoryRepoError::CategoryNotFound(id) => Self::CategoryNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Category service facade over repository implementations.
pub struct CategoryService<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates one category, optionally under `parent_id`.
    pub fn create(
        &self,
        name: &str,
        parent_id: Option<CategoryId>,
    ) -> CategoryServiceResult<PartnerCategory> {
        let name = normalize_name(name)?;
        if let Some(parent_id) = parent_id {
            self.require_parent(parent_id)?;
        }
        let category = PartnerCategory::new(name, parent_id);
        self.repo.insert_category(&category)?;
        info!(
            "event=category_create module=service status=ok category_id={}",
            category.id
        );
        Ok(category)
    }

    pub fn get(&self, id: CategoryId) -> CategoryServiceResult<Option<PartnerCategory>> {
        Ok(self.repo.get_category(id)?)
    }

    pub fn rename(&self, id: CategoryId, name: &str) -> CategoryServiceResult<PartnerCategory> {
        let mut category = self.require(id)?;
        category.name = normalize_name(name)?;
        self.repo.update_category(&category)?;
        Ok(category)
    }

    /// Re-parents a category; `None` makes it a root.
    ///
    /// # Errors
    /// - `CycleDetected` when `parent_id` is the category itself or one of
    ///   its descendants.
    pub fn move_category(
        &self,
        id: CategoryId,
        parent_id: Option<CategoryId>,
    ) -> CategoryServiceResult<PartnerCategory> {
        let mut category = self.require(id)?;
        if let Some(parent_id) = parent_id {
            self.require_parent(parent_id)?;
            let cyclic = hierarchy::would_create_cycle(id, parent_id, |node| {
                self.repo
                    .get_category(node)
                    .map(|category| category.and_then(|category| category.parent_id))
            })?;
            if cyclic {
                warn!(
                    "event=category_move module=service status=rejected reason=cycle category_id={id} parent_id={parent_id}"
                );
                return Err(CategoryServiceError::CycleDetected {
                    category_id: id,
                    parent_id,
                });
            }
        }
        category.parent_id = parent_id;
        self.repo.update_category(&category)?;
        Ok(category)
    }

    /// Full `"Parent / Child"` path, or the own name when context
    /// `partner_category_display` is `short`.
    pub fn display_name(&self, id: CategoryId, ctx: &Context) -> CategoryServiceResult<String> {
        let category = self.require(id)?;
        if ctx.get_string(CTX_CATEGORY_DISPLAY) == "short" {
            return Ok(category.name);
        }

        let mut names = vec![category.name];
        let mut seen = vec![id];
        let mut cursor = category.parent_id;
        while let Some(parent_id) = cursor {
            if seen.contains(&parent_id) {
                break;
            }
            let Some(parent) = self.repo.get_category(parent_id)? else {
                break;
            };
            seen.push(parent_id);
            names.push(parent.name);
            cursor = parent.parent_id;
        }
        names.reverse();
        Ok(names.join(PATH_SEPARATOR))
    }

    /// Searches by name; a full path matches on its last segment.
    pub fn search(
        &self,
        name: &str,
        limit: Option<u32>,
    ) -> CategoryServiceResult<Vec<PartnerCategory>> {
        let term = name.rsplit(PATH_SEPARATOR).next().unwrap_or(name);
        Ok(self
            .repo
            .search_by_name(term, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?)
    }

    pub fn children(&self, parent_id: Option<CategoryId>) -> CategoryServiceResult<Vec<PartnerCategory>> {
        Ok(self.repo.list_children(parent_id)?)
    }

    /// Replaces the tags of one partner.
    pub fn set_partner_categories(
        &self,
        partner_id: PartnerId,
        category_ids: &[CategoryId],
    ) -> CategoryServiceResult<()> {
        for id in category_ids {
            self.require(*id)?;
        }
        self.repo.set_partner_categories(partner_id, category_ids)?;
        Ok(())
    }

    pub fn partner_categories(&self, partner_id: PartnerId) -> CategoryServiceResult<Vec<PartnerCategory>> {
        Ok(self.repo.list_partner_categories(partner_id)?)
    }

    fn require(&self, id: CategoryId) -> CategoryServiceResult<PartnerCategory> {
        self.repo
            .get_category(id)?
            .ok_or(CategoryServiceError::CategoryNotFound(id))
    }

    fn require_parent(&self, id: CategoryId) -> CategoryServiceResult<()> {
        match self.repo.get_category(id)? {
            Some(_) => Ok(()),
            None => Err(CategoryServiceError::ParentNotFound(id)),
        }
    }
}

fn normalize_name(name: &str) -> CategoryServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::NameRequired);
    }
    Ok(name.to_string())
}
