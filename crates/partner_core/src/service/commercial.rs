//! Commercial entity resolution and derived-field recompute.
//!
//! # Responsibility
//! - Resolve the commercial partner of a record by walking parent links.
//! - Keep the stored derived attributes (`commercial_partner_id`,
//!   `commercial_company_name`) in step with the fields they depend on.
//!
//! # Invariants
//! - `resolve(p) = p` when `p` is a company or a root, else
//!   `resolve(parent(p))`.
//! - Recompute runs in the caller's atomic scope, top-down, and only
//!   descends below records whose derived values changed.
//! - Inactive records are skipped by the cascade and re-derived when
//!   they are reactivated.

use crate::model::partner::{Partner, PartnerField, PartnerId, PartnerValues};
use crate::repo::partner_repo::{PartnerRepoError, PartnerRepoResult, PartnerRepository};
use log::debug;
use std::collections::{HashSet, VecDeque};

/// Stored attribute computed from other attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedField {
    CommercialPartner,
    CommercialCompanyName,
}

/// Where a derived attribute reads one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// Field on the record itself.
    Own(PartnerField),
    /// Field on the parent record.
    Parent(PartnerField),
    /// Field on the resolved commercial partner.
    Commercial(PartnerField),
}

/// Declarative dependency list of one derived attribute.
#[derive(Debug, Clone, Copy)]
pub struct DerivedFieldSpec {
    pub field: DerivedField,
    pub depends_on: &'static [Dependency],
}

pub const DERIVED_FIELDS: &[DerivedFieldSpec] = &[
    DerivedFieldSpec {
        field: DerivedField::CommercialPartner,
        depends_on: &[
            Dependency::Own(PartnerField::IsCompany),
            Dependency::Own(PartnerField::Parent),
            Dependency::Own(PartnerField::Active),
            Dependency::Parent(PartnerField::CommercialPartner),
        ],
    },
    DerivedFieldSpec {
        field: DerivedField::CommercialCompanyName,
        depends_on: &[
            Dependency::Own(PartnerField::CompanyName),
            Dependency::Own(PartnerField::Parent),
            Dependency::Own(PartnerField::CommercialPartner),
            Dependency::Own(PartnerField::Active),
            Dependency::Parent(PartnerField::IsCompany),
            Dependency::Commercial(PartnerField::Name),
            Dependency::Commercial(PartnerField::IsCompany),
        ],
    },
];

/// Whether a write of `values` can change any derived attribute, on the
/// written records or on records depending on them.
pub fn is_recompute_triggered(values: &PartnerValues) -> bool {
    DERIVED_FIELDS.iter().any(|derived| {
        derived.depends_on.iter().any(|dependency| match dependency {
            Dependency::Own(field) | Dependency::Parent(field) | Dependency::Commercial(field) => {
                values.has(*field)
            }
        })
    })
}

/// Resolves the commercial partner of `id` from the live parent chain.
///
/// # Errors
/// - `PartnerNotFound` when `id` or an ancestor is missing.
/// - `InvalidData` when the parent chain loops.
pub fn resolve_commercial_partner<R>(repo: &R, id: PartnerId) -> PartnerRepoResult<PartnerId>
where
    R: PartnerRepository + ?Sized,
{
    let mut visited = HashSet::new();
    let mut current = repo.require_partner(id)?;
    loop {
        if !visited.insert(current.id) {
            return Err(PartnerRepoError::InvalidData(format!(
                "parent chain of partner {id} loops at {}",
                current.id
            )));
        }
        match current.parent_id {
            Some(parent_id) if !current.is_company => {
                current = repo.require_partner(parent_id)?;
            }
            _ => return Ok(current.id),
        }
    }
}

/// Recomputes derived attributes of `roots` and cascades to descendants.
///
/// Roots are always re-evaluated and always push their children, since a
/// write on a root may change inputs its children read through
/// `Parent`/`Commercial` dependencies. Other records push their children
/// only when their own derived values changed.
///
/// Returns the number of records whose stored values changed.
pub fn recompute_derived<R>(repo: &R, roots: &[PartnerId]) -> PartnerRepoResult<usize>
where
    R: PartnerRepository + ?Sized,
{
    let mut queue: VecDeque<(PartnerId, bool)> = roots.iter().map(|id| (*id, true)).collect();
    let mut seen = HashSet::new();
    let mut updated = 0;

    while let Some((id, is_root)) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let mut partner = repo.require_partner(id)?;
        let (commercial_partner_id, commercial_company_name) = derive(repo, &partner)?;
        let changed = partner.commercial_partner_id != commercial_partner_id
            || partner.commercial_company_name != commercial_company_name;
        if changed {
            partner.commercial_partner_id = commercial_partner_id;
            partner.commercial_company_name = commercial_company_name;
            repo.update_partner(&partner)?;
            updated += 1;
        }
        if changed || is_root {
            for child in repo.list_children(id)? {
                queue.push_back((child.id, false));
            }
        }
    }

    if updated > 0 {
        debug!(
            "event=derived_recompute module=commercial status=ok roots={} updated={updated}",
            roots.len()
        );
    }
    Ok(updated)
}

fn derive<R>(repo: &R, partner: &Partner) -> PartnerRepoResult<(PartnerId, String)>
where
    R: PartnerRepository + ?Sized,
{
    let commercial_partner_id = match partner.parent_id {
        Some(parent_id) if !partner.is_company => {
            repo.require_partner(parent_id)?.commercial_partner_id
        }
        _ => partner.id,
    };

    let commercial = if commercial_partner_id == partner.id {
        partner.clone()
    } else {
        repo.require_partner(commercial_partner_id)?
    };
    let commercial_company_name = if commercial.is_company {
        commercial.name
    } else {
        partner.company_name.clone()
    };

    Ok((commercial_partner_id, commercial_company_name))
}
