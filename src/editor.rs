//! Editor and host-shell contracts.
//!
//! DESIGN
//! ======
//! The drawing editor owns the element model, rendering and undo history.
//! The session touches it only through `Editor`: read the scene, replace
//! it with `update_scene`, clear history, and read interaction state to
//! learn which elements are mid-edit.
//!
//! The embedding shell owns the address bar, share-link chrome, theme and
//! user identity, reached through `HostShell`.
//!
//! `MemoryEditor` and `MemoryShell` are plain in-memory implementations
//! used by the CLI and by tests; they record what the session asked of them.

use std::collections::{HashMap, HashSet};

use crate::element::Element;
use crate::message::SelectedElementIds;
use crate::presence::Collaborator;

// =============================================================================
// EDITOR
// =============================================================================

/// Interaction state the session needs from the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub selected_element_ids: SelectedElementIds,
    /// Text element being typed into.
    pub editing_element_id: Option<String>,
    /// Element under a resize handle.
    pub resizing_element_id: Option<String>,
    /// Elements being dragged.
    pub dragging_element_ids: Vec<String>,
}

impl AppState {
    /// Ids the local user is interacting with right now. Remote versions of
    /// these are held back until the interaction ends.
    #[must_use]
    pub fn in_progress_ids(&self) -> HashSet<String> {
        self.editing_element_id
            .iter()
            .chain(self.resizing_element_id.iter())
            .chain(self.dragging_element_ids.iter())
            .cloned()
            .collect()
    }
}

/// One call to `Editor::update_scene`. `None` leaves that part untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneUpdate {
    pub elements: Option<Vec<Element>>,
    pub collaborators: Option<HashMap<String, Collaborator>>,
    /// Record this state as an undo checkpoint.
    pub commit_to_history: bool,
}

impl SceneUpdate {
    #[must_use]
    pub fn elements(elements: Vec<Element>) -> Self {
        Self { elements: Some(elements), ..Self::default() }
    }

    #[must_use]
    pub fn collaborators(collaborators: HashMap<String, Collaborator>) -> Self {
        Self { collaborators: Some(collaborators), ..Self::default() }
    }

    #[must_use]
    pub fn committed(mut self) -> Self {
        self.commit_to_history = true;
        self
    }
}

pub trait Editor {
    /// Live elements, tombstones excluded.
    fn scene_elements(&self) -> Vec<Element>;

    /// Every element, tombstones included.
    fn scene_elements_including_deleted(&self) -> Vec<Element>;

    fn update_scene(&mut self, update: SceneUpdate);

    fn clear_history(&mut self);

    fn app_state(&self) -> AppState;
}

/// In-memory editor that records every update it receives.
#[derive(Debug, Clone, Default)]
pub struct MemoryEditor {
    elements: Vec<Element>,
    collaborators: HashMap<String, Collaborator>,
    app_state: AppState,
    updates: Vec<SceneUpdate>,
    history_clears: usize,
}

impl MemoryEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_elements(elements: Vec<Element>) -> Self {
        Self { elements, ..Self::default() }
    }

    /// A local edit: replace the scene without going through `update_scene`.
    pub fn set_elements(&mut self, elements: Vec<Element>) {
        self.elements = elements;
    }

    pub fn set_app_state(&mut self, app_state: AppState) {
        self.app_state = app_state;
    }

    #[must_use]
    pub fn collaborators(&self) -> &HashMap<String, Collaborator> {
        &self.collaborators
    }

    /// Every `update_scene` call so far, oldest first.
    #[must_use]
    pub fn updates(&self) -> &[SceneUpdate] {
        &self.updates
    }

    /// Drain the recorded updates. Long-running hosts call this so the log
    /// does not grow with every peer pointer move.
    pub fn take_updates(&mut self) -> Vec<SceneUpdate> {
        std::mem::take(&mut self.updates)
    }

    #[must_use]
    pub fn history_clears(&self) -> usize {
        self.history_clears
    }
}

impl Editor for MemoryEditor {
    fn scene_elements(&self) -> Vec<Element> {
        self.elements.iter().filter(|e| !e.is_deleted).cloned().collect()
    }

    fn scene_elements_including_deleted(&self) -> Vec<Element> {
        self.elements.clone()
    }

    fn update_scene(&mut self, update: SceneUpdate) {
        if let Some(elements) = &update.elements {
            self.elements.clone_from(elements);
        }
        if let Some(collaborators) = &update.collaborators {
            self.collaborators.clone_from(collaborators);
        }
        self.updates.push(update);
    }

    fn clear_history(&mut self) {
        self.history_clears += 1;
    }

    fn app_state(&self) -> AppState {
        self.app_state.clone()
    }
}

// =============================================================================
// HOST SHELL
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

pub trait HostShell {
    /// Current page address.
    fn location(&self) -> String;

    /// Replace the visible address without reloading.
    fn push_location(&mut self, url: &str);

    fn set_share_url(&mut self, url: &str);

    fn clear_share_url(&mut self);

    fn theme(&self) -> Theme;

    /// Name shown to peers next to this user's pointer.
    fn display_name(&self) -> String;

    /// Collaboration started or stopped.
    fn share_state_changed(&mut self, collaborating: bool);

    /// User-visible warning with a grepable code.
    fn alert(&mut self, code: &'static str, message: &str);
}

/// In-memory shell that records alerts and share-state notifications.
#[derive(Debug, Clone, Default)]
pub struct MemoryShell {
    location: String,
    pushed: Vec<String>,
    share_url: Option<String>,
    display_name: String,
    theme: Theme,
    alerts: Vec<(&'static str, String)>,
    share_states: Vec<bool>,
}

impl MemoryShell {
    #[must_use]
    pub fn new(location: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { location: location.into(), display_name: display_name.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    #[must_use]
    pub fn share_url(&self) -> Option<&str> {
        self.share_url.as_deref()
    }

    /// Every address pushed through [`HostShell::push_location`], in order.
    #[must_use]
    pub fn pushed_locations(&self) -> &[String] {
        &self.pushed
    }

    #[must_use]
    pub fn alerts(&self) -> &[(&'static str, String)] {
        &self.alerts
    }

    #[must_use]
    pub fn share_states(&self) -> &[bool] {
        &self.share_states
    }
}

impl HostShell for MemoryShell {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn push_location(&mut self, url: &str) {
        url.clone_into(&mut self.location);
        self.pushed.push(url.to_owned());
    }

    fn set_share_url(&mut self, url: &str) {
        self.share_url = Some(url.to_owned());
    }

    fn clear_share_url(&mut self) {
        self.share_url = None;
    }

    fn theme(&self) -> Theme {
        self.theme
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn share_state_changed(&mut self, collaborating: bool) {
        self.share_states.push(collaborating);
    }

    fn alert(&mut self, code: &'static str, message: &str) {
        self.alerts.push((code, message.to_owned()));
    }
}

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;
