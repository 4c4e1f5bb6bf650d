//! Presence directory: what each connected peer is pointing at.
//!
//! DESIGN
//! ======
//! Keyed by the relay-assigned connection id. That id changes on every
//! reconnect and is supplied by untrusted peers, so it is never treated as a
//! user identity and nothing durable hangs off it.
//!
//! Two write paths:
//! - roster change → `replace_roster`: wholesale rebuild, stale ids dropped,
//!   known ids keep their state, unknown ids start empty.
//! - presence event → `apply_pointer` / `apply_idle`: patch one entry.

use std::collections::HashMap;

use serde::Serialize;

use crate::idle::UserIdleState;
use crate::message::{IdleStatusPayload, MouseLocationPayload, Pointer, PointerButton, SelectedElementIds};

/// Last-known presence of one peer connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub pointer: Option<Pointer>,
    pub button: Option<PointerButton>,
    pub selected_element_ids: SelectedElementIds,
    pub username: Option<String>,
    pub user_state: Option<UserIdleState>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceDirectory {
    entries: HashMap<String, Collaborator>,
}

impl PresenceDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<&Collaborator> {
        self.entries.get(connection_id)
    }

    /// Owned copy for handing to the editor.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Collaborator> {
        self.entries.clone()
    }

    /// Rebuild from the relay's roster.
    pub fn replace_roster(&mut self, connection_ids: &[String]) {
        let mut next = HashMap::with_capacity(connection_ids.len());
        for id in connection_ids {
            if id.is_empty() {
                continue;
            }
            let entry = self.entries.remove(id).unwrap_or_default();
            next.insert(id.clone(), entry);
        }
        self.entries = next;
    }

    /// Patch pointer, button, selection and name. Returns false for an unusable id.
    pub fn apply_pointer(&mut self, payload: &MouseLocationPayload) -> bool {
        if payload.socket_id.is_empty() {
            return false;
        }
        let entry = self.entries.entry(payload.socket_id.clone()).or_default();
        entry.pointer = Some(payload.pointer);
        entry.button = Some(payload.button);
        entry.selected_element_ids.clone_from(&payload.selected_element_ids);
        entry.username = Some(payload.username.clone());
        true
    }

    /// Patch idle state and name. Returns false for an unusable id.
    pub fn apply_idle(&mut self, payload: &IdleStatusPayload) -> bool {
        if payload.socket_id.is_empty() {
            return false;
        }
        let entry = self.entries.entry(payload.socket_id.clone()).or_default();
        entry.user_state = Some(payload.user_state);
        entry.username = Some(payload.username.clone());
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
