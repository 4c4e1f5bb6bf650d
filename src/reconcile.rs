//! Scene reconciliation: merge a remote element batch into the local scene.
//!
//! ALGORITHM
//! =========
//! For each remote element, in remote order:
//! 1. Id is being interactively edited locally → skip; the local element
//!    survives via step 3 and is reconciled on a later cycle.
//! 2. Local has a strictly higher version → keep local.
//! 3. Same version, different nonce → keep the lower nonce. Every peer sees
//!    both nonces, so every peer picks the same winner.
//! 4. Otherwise → take remote.
//!
//! Local elements the remote batch never mentioned are appended afterwards
//! in their original relative order. Output order is z-order, so both
//! halves of the ordering are part of the contract.
//!
//! Pure: no I/O, no clock, same inputs give the same output.

use std::collections::{HashMap, HashSet};

use crate::element::Element;

/// Merge `remote` into `local`, leaving `in_progress` ids to the local side.
#[must_use]
pub fn reconcile_elements(local: &[Element], remote: &[Element], in_progress: &HashSet<String>) -> Vec<Element> {
    let mut local_by_id: HashMap<&str, &Element> = local.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut merged = Vec::with_capacity(local.len().max(remote.len()));

    for remote_el in remote {
        if in_progress.contains(&remote_el.id) {
            continue;
        }

        let winner = match local_by_id.remove(remote_el.id.as_str()) {
            Some(local_el) if local_el.version > remote_el.version => local_el,
            Some(local_el)
                if local_el.version == remote_el.version && local_el.version_nonce != remote_el.version_nonce =>
            {
                if local_el.version_nonce < remote_el.version_nonce { local_el } else { remote_el }
            }
            _ => remote_el,
        };
        merged.push(winner.clone());
    }

    // Local-only leftovers, first-seen order.
    for local_el in local {
        if let Some(el) = local_by_id.remove(local_el.id.as_str()) {
            merged.push(el.clone());
        }
    }

    merged
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
