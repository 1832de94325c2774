//! Write pipeline and field synchronization between relatives.
//!
//! # Responsibility
//! - Persist creates/writes, reject cycles, recompute derived attributes.
//! - Propagate commercial fields down from the commercial entity and
//!   address fields between a contact and its relatives.
//!
//! # Invariants
//! - Every write issued here on behalf of propagation carries
//!   `suppress_sync`, so synchronization never re-enters itself.
//! - Callers own the atomic scope; nothing here commits.

use crate::config::SyncConfig;
use crate::model::partner::{
    FieldValue, Partner, PartnerField, PartnerId, PartnerType, PartnerValues, ADDRESS_FIELDS,
};
use crate::repo::partner_repo::PartnerRepository;
use crate::service::commercial::{is_recompute_triggered, recompute_derived, resolve_commercial_partner};
use crate::service::error::{PartnerServiceError, PartnerServiceResult};
use crate::service::hierarchy;
use log::{debug, warn};
use std::collections::HashSet;

/// Per-write switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip field synchronization for this write. Cycle checks and derived
    /// recompute still run.
    pub suppress_sync: bool,
}

impl WriteOptions {
    pub const fn synced() -> Self {
        Self {
            suppress_sync: false,
        }
    }

    pub const fn suppressed() -> Self {
        Self {
            suppress_sync: true,
        }
    }
}

/// Applies writes and keeps relatives in step.
pub struct FieldSynchronizer<'a, R: PartnerRepository + ?Sized> {
    repo: &'a R,
    config: &'a SyncConfig,
}

impl<'a, R: PartnerRepository + ?Sized> FieldSynchronizer<'a, R> {
    pub fn new(repo: &'a R, config: &'a SyncConfig) -> Self {
        Self { repo, config }
    }

    /// Inserts a partner built from `values`, then synchronizes it and runs
    /// first-contact adoption.
    pub fn create(&self, values: &PartnerValues) -> PartnerServiceResult<Partner> {
        self.ensure_parent_exists(values)?;

        let mut partner = Partner::new(String::new());
        partner.apply(values)?;
        let id = self.repo.insert_partner(&partner)?.id;
        recompute_derived(self.repo, &[id])?;

        self.synchronize(id, values)?;
        self.adopt_first_contact_address(id)?;

        Ok(self.repo.require_partner(id)?)
    }

    /// Writes `values` onto every partner in `ids`.
    ///
    /// # Errors
    /// - `ParentNotFound` when the new parent does not exist.
    /// - `CycleDetected` when the new parent is a descendant (or self).
    pub fn write(
        &self,
        ids: &[PartnerId],
        values: &PartnerValues,
        options: WriteOptions,
    ) -> PartnerServiceResult<()> {
        if ids.is_empty() || values.is_empty() {
            return Ok(());
        }
        self.ensure_parent_exists(values)?;
        self.repo.write_values(ids, values)?;

        if values.has(PartnerField::Parent) {
            for id in ids {
                self.ensure_no_cycle(*id, values)?;
            }
        }
        if is_recompute_triggered(values) {
            recompute_derived(self.repo, ids)?;
        }
        if !options.suppress_sync {
            for id in ids {
                self.synchronize(*id, values)?;
            }
        }
        Ok(())
    }

    /// Propagates fields after `written` was applied to `id`.
    pub fn synchronize(&self, id: PartnerId, written: &PartnerValues) -> PartnerServiceResult<()> {
        self.pull_commercial(id, written)?;
        self.pull_address(id, written)?;

        let partner = self.repo.require_partner(id)?;
        let children = self.repo.list_children(id)?;
        if children.is_empty() {
            return Ok(());
        }
        self.push_commercial(&partner, &children, written)?;
        self.push_address(id, written)?;
        Ok(())
    }

    /// Copies the address of a lone first contact up to an address-less
    /// company or root parent.
    pub fn adopt_first_contact_address(&self, id: PartnerId) -> PartnerServiceResult<bool> {
        let partner = self.repo.require_partner(id)?;
        let Some(parent_id) = partner.parent_id else {
            return Ok(false);
        };
        let parent = self.repo.require_partner(parent_id)?;
        if !parent.is_company && parent.parent_id.is_some() {
            return Ok(false);
        }
        let siblings = self.repo.list_children(parent_id)?;
        if siblings.len() != 1 || siblings[0].id != id {
            return Ok(false);
        }
        if !partner.has_address() || parent.has_address() {
            return Ok(false);
        }

        debug!(
            "event=first_contact_adopt module=sync status=ok partner_id={id} parent_id={parent_id}"
        );
        self.write(
            &[parent_id],
            &partner.field_values(&ADDRESS_FIELDS),
            WriteOptions::suppressed(),
        )?;
        Ok(true)
    }

    fn pull_commercial(&self, id: PartnerId, written: &PartnerValues) -> PartnerServiceResult<()> {
        let reactivated = matches!(
            written.get(PartnerField::Active),
            Some(FieldValue::Bool(true))
        );
        if written.parent_id().is_none() && !reactivated {
            return Ok(());
        }
        let commercial_id = resolve_commercial_partner(self.repo, id)?;
        if commercial_id == id {
            return Ok(());
        }
        let commercial = self.repo.require_partner(commercial_id)?;
        self.write(
            &[id],
            &commercial.field_values(&self.config.commercial_fields),
            WriteOptions::suppressed(),
        )
    }

    fn pull_address(&self, id: PartnerId, written: &PartnerValues) -> PartnerServiceResult<()> {
        // Address values carried by the write itself take precedence, as a
        // block: unsupplied address fields stay as they are.
        if written.has_any(&ADDRESS_FIELDS) {
            return Ok(());
        }
        let partner = self.repo.require_partner(id)?;
        if partner.partner_type != PartnerType::Contact {
            return Ok(());
        }
        let Some(parent_id) = partner.parent_id else {
            return Ok(());
        };
        let parent = self.repo.require_partner(parent_id)?;
        if !parent.has_address() {
            return Ok(());
        }
        self.write(
            &[id],
            &parent.field_values(&ADDRESS_FIELDS),
            WriteOptions::suppressed(),
        )
    }

    fn push_commercial(
        &self,
        partner: &Partner,
        children: &[Partner],
        written: &PartnerValues,
    ) -> PartnerServiceResult<()> {
        let commercial_id = resolve_commercial_partner(self.repo, partner.id)?;
        let owns_values = commercial_id == partner.id
            && self
                .config
                .commercial_fields
                .iter()
                .any(|field| !partner.get(*field).is_empty());

        // A reparented subtree inherits the new commercial values.
        let mut stale_child = written.has(PartnerField::Parent) && commercial_id != partner.id;
        if !owns_values && !stale_child {
            for child in children.iter().filter(|child| !child.is_company) {
                if resolve_commercial_partner(self.repo, child.id)? != child.commercial_partner_id {
                    stale_child = true;
                    break;
                }
            }
        }
        if !owns_values && !stale_child {
            return Ok(());
        }

        let commercial = self.repo.require_partner(commercial_id)?;
        let mut values = commercial.field_values(&self.config.commercial_fields);
        values.insert(PartnerField::CommercialPartner, FieldValue::Id(commercial_id));

        let levels = self.non_company_levels(partner.id)?;
        let pushed: usize = levels.iter().map(Vec::len).sum();
        for level in levels.iter().rev() {
            self.write(level, &values, WriteOptions::suppressed())?;
        }
        debug!(
            "event=commercial_push module=sync status=ok partner_id={} commercial_partner_id={commercial_id} pushed={pushed}",
            partner.id
        );
        Ok(())
    }

    fn push_address(&self, id: PartnerId, written: &PartnerValues) -> PartnerServiceResult<()> {
        let address = written.subset(&ADDRESS_FIELDS);
        if address.is_empty() {
            return Ok(());
        }
        let contacts = self
            .repo
            .list_descendant_ids(id, Some(PartnerType::Contact))?;
        if contacts.is_empty() {
            return Ok(());
        }
        debug!(
            "event=address_push module=sync status=ok partner_id={id} contacts={}",
            contacts.len()
        );
        self.write(&contacts, &address, WriteOptions::suppressed())
    }

    /// Non-company descendants grouped by depth, not crossing companies.
    fn non_company_levels(&self, root: PartnerId) -> PartnerServiceResult<Vec<Vec<PartnerId>>> {
        let mut levels = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent_id in &frontier {
                for child in self.repo.list_children(*parent_id)? {
                    if !child.is_company && seen.insert(child.id) {
                        next.push(child.id);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(next.clone());
            frontier = next;
        }
        Ok(levels)
    }

    fn ensure_parent_exists(&self, values: &PartnerValues) -> PartnerServiceResult<()> {
        if let Some(parent_id) = values.parent_id() {
            if self.repo.get_partner(parent_id)?.is_none() {
                return Err(PartnerServiceError::ParentNotFound(parent_id));
            }
        }
        Ok(())
    }

    fn ensure_no_cycle(&self, id: PartnerId, values: &PartnerValues) -> PartnerServiceResult<()> {
        let acyclic = hierarchy::check_no_cycle(id, |node| {
            self.repo
                .get_partner(node)
                .map(|partner| partner.and_then(|partner| partner.parent_id))
        })?;
        if acyclic {
            return Ok(());
        }
        let parent_id = values.parent_id().unwrap_or(id);
        warn!(
            "event=parent_assign module=sync status=rejected reason=cycle partner_id={id} parent_id={parent_id}"
        );
        Err(PartnerServiceError::CycleDetected {
            partner_id: id,
            parent_id,
        })
    }
}
