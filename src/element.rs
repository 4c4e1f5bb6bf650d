//! Scene elements as the collaboration core sees them.
//!
//! DESIGN
//! ======
//! The editor owns the full element model; this crate only needs the
//! replication attributes (`id`, `version`, `versionNonce`, `isDeleted`).
//! Everything else is carried through untouched in `attrs` so a round trip
//! through the relay never loses drawing data.
//!
//! Deleted elements are tombstones: they stay in the scene and on the wire
//! so deletions propagate through the same merge path as edits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Element types whose extent is defined by their point list.
const LINEAR_TYPES: [&str; 3] = ["arrow", "line", "draw"];

/// One drawing primitive. Field names match the editor's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Stable across clients.
    pub id: String,
    /// Bumped on every logical edit.
    pub version: u64,
    /// Random tiebreaker regenerated on every edit.
    pub version_nonce: i64,
    #[serde(default)]
    pub is_deleted: bool,
    /// Opaque drawing attributes (`type`, geometry, style, ...).
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Element {
    #[must_use]
    pub fn new(id: impl Into<String>, version: u64, version_nonce: i64) -> Self {
        Self { id: id.into(), version, version_nonce, is_deleted: false, attrs: Map::new() }
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_deleted(mut self, is_deleted: bool) -> Self {
        self.is_deleted = is_deleted;
        self
    }

    /// Element `type` attribute, if present.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.attrs.get("type").and_then(Value::as_str)
    }

    /// Zero-extent elements are noise on the wire; linear elements need two points.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_invisibly_small(&self) -> bool {
        if self.kind().is_some_and(|k| LINEAR_TYPES.contains(&k)) {
            return self
                .attrs
                .get("points")
                .and_then(Value::as_array)
                .map_or(true, |points| points.len() < 2);
        }
        let width = self.attrs.get("width").and_then(Value::as_f64);
        let height = self.attrs.get("height").and_then(Value::as_f64);
        width == Some(0.0) && height == Some(0.0)
    }
}

/// Monotone summary of a scene: the sum of element versions.
///
/// Any edit bumps one element's version, so the sum strictly increases.
/// Only meaningful for "is this newer than what we last saw" comparisons.
/// Versions come from peers, so the sum saturates at `u64::MAX`.
#[must_use]
pub fn scene_version(elements: &[Element]) -> u64 {
    elements.iter().fold(0u64, |sum, e| sum.saturating_add(e.version))
}

/// Elements worth sending: tombstones always, live elements unless invisibly small.
#[must_use]
pub fn syncable_elements(elements: &[Element]) -> Vec<Element> {
    elements
        .iter()
        .filter(|e| e.is_deleted || !e.is_invisibly_small())
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "element_test.rs"]
mod tests;
