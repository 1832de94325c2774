//! Partner use-case service.
//!
//! # Responsibility
//! - Front door for partner creates and writes: normalize values, open an
//!   atomic scope, run the write pipeline, commit or roll back.
//! - Read-side helpers: commercial entity, typed addresses, formatted
//!   addresses, display names, lookup by email or text.
//!
//! # Invariants
//! - A failed create/write leaves the store exactly as before the call.

use crate::config::SyncConfig;
use crate::context::Context;
use crate::model::partner::{
    Partner, PartnerField, PartnerId, PartnerType, PartnerValues, ADDRESS_FIELDS,
};
use crate::repo::partner_repo::PartnerRepository;
use crate::service::address;
use crate::service::address_format::format_partner_address;
use crate::service::commercial;
use crate::service::error::{PartnerServiceError, PartnerServiceResult};
use crate::service::hierarchy;
use crate::service::naming::{self, normalize_values, parse_partner_name};
use crate::service::sync::{FieldSynchronizer, WriteOptions};
use log::{error, info, warn};
use std::collections::BTreeMap;

/// Context key: `name_create` fails without an email.
pub const CTX_FORCE_EMAIL: &str = "force_email";
/// Context key: email used by `name_create` when the text carries none.
pub const CTX_DEFAULT_EMAIL: &str = "default_email";

const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Partner service facade over a store implementation.
pub struct PartnerService<R: PartnerRepository> {
    repo: R,
    config: SyncConfig,
}

impl<R: PartnerRepository> PartnerService<R> {
    /// Creates a service with the default commercial fields and layout.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            config: SyncConfig::default(),
        }
    }

    /// Creates a service with custom synchronization settings.
    pub fn with_config(repo: R, config: SyncConfig) -> PartnerServiceResult<Self> {
        config
            .validate()
            .map_err(PartnerServiceError::InvalidConfig)?;
        Ok(Self { repo, config })
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Creates one partner and synchronizes it with its relatives.
    pub fn create(&self, values: &PartnerValues) -> PartnerServiceResult<Partner> {
        let values = normalize_values(values);
        let partner = self.atomic(|sync| sync.create(&values))?;
        info!(
            "event=partner_create module=service status=ok partner_id={} parent_id={}",
            partner.id,
            partner
                .parent_id
                .map_or_else(|| "none".to_string(), |id| id.to_string())
        );
        Ok(partner)
    }

    /// Writes `values` onto every partner in `ids` with full synchronization.
    pub fn write(&self, ids: &[PartnerId], values: &PartnerValues) -> PartnerServiceResult<()> {
        self.write_with(ids, values, WriteOptions::synced())
    }

    /// Writes with explicit options.
    ///
    /// Suppressed writes still reject cycles and recompute derived values.
    pub fn write_with(
        &self,
        ids: &[PartnerId],
        values: &PartnerValues,
        options: WriteOptions,
    ) -> PartnerServiceResult<()> {
        let values = normalize_values(values);
        self.atomic(|sync| sync.write(ids, &values, options))?;
        info!(
            "event=partner_write module=service status=ok partners={} fields={} suppress_sync={}",
            ids.len(),
            values.len(),
            options.suppress_sync
        );
        Ok(())
    }

    /// Runs field synchronization for `id` as if `written` had just been
    /// applied to it.
    pub fn synchronize(&self, id: PartnerId, written: &PartnerValues) -> PartnerServiceResult<()> {
        self.atomic(|sync| sync.synchronize(id, written))
    }

    pub fn get(&self, id: PartnerId) -> PartnerServiceResult<Option<Partner>> {
        Ok(self.repo.get_partner(id)?)
    }

    /// Active direct children in creation order.
    pub fn children(&self, id: PartnerId) -> PartnerServiceResult<Vec<Partner>> {
        self.repo.require_partner(id)?;
        Ok(self.repo.list_children(id)?)
    }

    /// Returns `false` when the stored parent chain of `id` loops.
    pub fn check_no_cycle(&self, id: PartnerId) -> PartnerServiceResult<bool> {
        self.repo.require_partner(id)?;
        Ok(hierarchy::check_no_cycle(id, |node| {
            self.repo
                .get_partner(node)
                .map(|partner| partner.and_then(|partner| partner.parent_id))
        })?)
    }

    pub fn resolve_commercial_partner(&self, id: PartnerId) -> PartnerServiceResult<PartnerId> {
        Ok(commercial::resolve_commercial_partner(&self.repo, id)?)
    }

    /// Stored commercial partner record of `id`.
    pub fn commercial_entity(&self, id: PartnerId) -> PartnerServiceResult<Partner> {
        let partner = self.repo.require_partner(id)?;
        Ok(self.repo.require_partner(partner.commercial_partner_id)?)
    }

    /// Typed address lookup, see [`address::address_get`].
    pub fn address_get(
        &self,
        seeds: &[PartnerId],
        roles: &[PartnerType],
    ) -> PartnerServiceResult<BTreeMap<PartnerType, PartnerId>> {
        Ok(address::address_get(&self.repo, seeds, roles)?)
    }

    /// Renders the postal address of `id` using its country layout.
    pub fn format_address(
        &self,
        id: PartnerId,
        include_company_name: bool,
    ) -> PartnerServiceResult<String> {
        let partner = self.repo.require_partner(id)?;
        let country = match partner.country_id {
            Some(country_id) => self.repo.get_country(country_id)?,
            None => None,
        };
        let state = match partner.state_id {
            Some(state_id) => self.repo.get_state(state_id)?,
            None => None,
        };

        format_partner_address(
            &partner,
            country.as_ref(),
            state.as_ref(),
            &self.config.default_address_format,
            include_company_name,
        )
        .map_err(|err| {
            warn!(
                "event=address_format module=service status=error partner_id={id} error={}",
                err.message
            );
            PartnerServiceError::from(err)
        })
    }

    /// Address without the company line.
    pub fn contact_address(&self, id: PartnerId) -> PartnerServiceResult<String> {
        self.format_address(id, false)
    }

    /// Human-facing label of `id` under the given context flags.
    pub fn display_name(&self, id: PartnerId, ctx: &Context) -> PartnerServiceResult<String> {
        let partner = self.repo.require_partner(id)?;
        let address = if naming::needs_address(ctx) {
            Some(self.format_address(id, true)?)
        } else {
            None
        };
        Ok(naming::display_name(&partner, ctx, address.as_deref()))
    }

    /// Creates a contact from `"Name <email>"` text.
    ///
    /// # Errors
    /// - `EmailRequired` when context `force_email` is set and the text has
    ///   no address.
    pub fn name_create(&self, text: &str, ctx: &Context) -> PartnerServiceResult<Partner> {
        let (mut name, mut email) = parse_partner_name(text);
        if email.is_empty() && ctx.get_bool(CTX_FORCE_EMAIL) {
            return Err(PartnerServiceError::EmailRequired);
        }
        if name.is_empty() && !email.is_empty() {
            name = email.clone();
        }
        if email.is_empty() {
            email = ctx.get_string(CTX_DEFAULT_EMAIL).to_string();
        }
        self.create(
            &PartnerValues::new()
                .with(PartnerField::Name, name)
                .with(PartnerField::Email, email),
        )
    }

    /// Returns the first partner whose email matches the address in `text`
    /// (case-insensitive), creating one when none exists.
    pub fn find_or_create(&self, text: &str, ctx: &Context) -> PartnerServiceResult<Partner> {
        let (_, parsed) = parse_partner_name(text);
        let email = if parsed.is_empty() {
            text.trim().to_string()
        } else {
            parsed
        };
        if let Some(found) = self.repo.find_by_email(&email, 1)?.into_iter().next() {
            return Ok(found);
        }
        self.name_create(&email, ctx)
    }

    /// Materializes the free-text company name of `id` as a company partner.
    ///
    /// The company takes the partner's address; the partner and its
    /// children are moved under it. Returns `None` when there is no
    /// company name.
    pub fn create_company(&self, id: PartnerId) -> PartnerServiceResult<Option<Partner>> {
        let partner = self.repo.require_partner(id)?;
        if partner.company_name.trim().is_empty() {
            return Ok(None);
        }

        let company = self.atomic(|sync| {
            let mut values = partner.field_values(&ADDRESS_FIELDS);
            values.insert(PartnerField::Name, partner.company_name.clone());
            values.insert(PartnerField::IsCompany, true);
            let company = sync.create(&normalize_values(&values))?;

            let reparent = normalize_values(&PartnerValues::new().with(PartnerField::Parent, company.id));
            let child_ids: Vec<PartnerId> = self
                .repo
                .list_children(id)?
                .into_iter()
                .map(|child| child.id)
                .collect();
            sync.write(&[id], &reparent, WriteOptions::synced())?;
            sync.write(&child_ids, &reparent, WriteOptions::synced())?;
            Ok(company)
        })?;

        info!(
            "event=company_create module=service status=ok partner_id={id} company_id={}",
            company.id
        );
        Ok(Some(company))
    }

    /// Active partners whose name, email or reference contains `term`.
    pub fn search(&self, term: &str, limit: Option<u32>) -> PartnerServiceResult<Vec<Partner>> {
        Ok(self
            .repo
            .search_partners(term, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?)
    }

    fn atomic<T>(
        &self,
        op: impl FnOnce(&FieldSynchronizer<'_, R>) -> PartnerServiceResult<T>,
    ) -> PartnerServiceResult<T> {
        self.repo.begin_atomic()?;
        let sync = FieldSynchronizer::new(&self.repo, &self.config);
        match op(&sync) {
            Ok(value) => {
                self.repo.commit_atomic()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.repo.rollback_atomic() {
                    error!(
                        "event=partner_write module=service status=error stage=rollback error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }
}
