//! Typed address lookup within company boundaries.
//!
//! # Invariants
//! - Read-only.
//! - Deterministic for a fixed store state: children are scanned in store
//!   order and the first match per role wins.
//! - The search never descends into a company other than the probe.

use crate::model::partner::{PartnerId, PartnerType};
use crate::repo::partner_repo::{PartnerRepoResult, PartnerRepository};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Finds, for each requested role, the closest partner of that type.
///
/// Each seed is scanned breadth-first over its non-company descendants;
/// when nothing more is found the scan restarts one level up, unless the
/// probe is a company or a root. `contact` is always resolved.
/// Unmatched roles fall back to the contact match, then to the first seed.
pub fn address_get<R>(
    repo: &R,
    seeds: &[PartnerId],
    roles: &[PartnerType],
) -> PartnerRepoResult<BTreeMap<PartnerType, PartnerId>>
where
    R: PartnerRepository + ?Sized,
{
    let mut wanted: BTreeSet<PartnerType> = roles.iter().copied().collect();
    wanted.insert(PartnerType::Contact);

    let mut result = BTreeMap::new();
    let Some(first_seed) = seeds.first().copied() else {
        return Ok(result);
    };

    let mut visited = HashSet::new();
    let mut probed = HashSet::new();
    'seeds: for seed in seeds {
        let mut probe = repo.require_partner(*seed)?;
        while probed.insert(probe.id) {
            let mut queue = VecDeque::from([probe.clone()]);
            while let Some(record) = queue.pop_front() {
                visited.insert(record.id);
                if wanted.contains(&record.partner_type) {
                    result.entry(record.partner_type).or_insert(record.id);
                }
                if result.len() == wanted.len() {
                    break 'seeds;
                }
                for child in repo.list_children(record.id)? {
                    if !child.is_company && !visited.contains(&child.id) {
                        queue.push_back(child);
                    }
                }
            }

            match probe.parent_id {
                Some(parent_id) if !probe.is_company => {
                    probe = repo.require_partner(parent_id)?;
                }
                _ => break,
            }
        }
    }

    let fallback = result
        .get(&PartnerType::Contact)
        .copied()
        .unwrap_or(first_seed);
    for role in wanted {
        result.entry(role).or_insert(fallback);
    }
    Ok(result)
}
