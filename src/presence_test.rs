use super::*;

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

fn pointer_event(socket_id: &str, x: f64, username: &str) -> MouseLocationPayload {
    MouseLocationPayload {
        socket_id: socket_id.into(),
        pointer: Pointer { x, y: 0.0 },
        button: PointerButton::Down,
        selected_element_ids: [("el-1".to_owned(), true)].into(),
        username: username.into(),
    }
}

fn idle_event(socket_id: &str, state: UserIdleState) -> IdleStatusPayload {
    IdleStatusPayload { socket_id: socket_id.into(), user_state: state, username: "zed".into() }
}

// =============================================================================
// replace_roster
// =============================================================================

#[test]
fn roster_default_initializes_unknown_ids() {
    let mut dir = PresenceDirectory::new();
    dir.replace_roster(&ids(&["a", "b"]));
    assert_eq!(dir.len(), 2);
    assert_eq!(dir.get("a"), Some(&Collaborator::default()));
}

#[test]
fn roster_keeps_known_entries_and_drops_stale_ones() {
    let mut dir = PresenceDirectory::new();
    dir.apply_pointer(&pointer_event("a", 4.0, "ada"));
    dir.apply_pointer(&pointer_event("gone", 1.0, "old"));

    dir.replace_roster(&ids(&["a", "c"]));

    assert_eq!(dir.len(), 2);
    assert_eq!(dir.get("a").unwrap().pointer, Some(Pointer { x: 4.0, y: 0.0 }));
    assert!(dir.get("gone").is_none());
    assert_eq!(dir.get("c"), Some(&Collaborator::default()));
}

#[test]
fn roster_ignores_empty_ids() {
    let mut dir = PresenceDirectory::new();
    dir.replace_roster(&ids(&["", "a"]));
    assert_eq!(dir.len(), 1);
}

#[test]
fn empty_roster_clears_everything() {
    let mut dir = PresenceDirectory::new();
    dir.apply_pointer(&pointer_event("a", 1.0, "ada"));
    dir.replace_roster(&[]);
    assert!(dir.is_empty());
}

// =============================================================================
// apply_pointer / apply_idle
// =============================================================================

#[test]
fn pointer_event_upserts_entry() {
    let mut dir = PresenceDirectory::new();
    assert!(dir.apply_pointer(&pointer_event("s1", 2.0, "ada")));
    let entry = dir.get("s1").unwrap();
    assert_eq!(entry.button, Some(PointerButton::Down));
    assert_eq!(entry.username.as_deref(), Some("ada"));
    assert_eq!(entry.selected_element_ids.get("el-1"), Some(&true));
}

#[test]
fn pointer_event_preserves_idle_state() {
    let mut dir = PresenceDirectory::new();
    dir.apply_idle(&idle_event("s1", UserIdleState::Idle));
    dir.apply_pointer(&pointer_event("s1", 2.0, "ada"));
    let entry = dir.get("s1").unwrap();
    assert_eq!(entry.user_state, Some(UserIdleState::Idle));
    assert_eq!(entry.username.as_deref(), Some("ada"));
}

#[test]
fn idle_event_preserves_pointer() {
    let mut dir = PresenceDirectory::new();
    dir.apply_pointer(&pointer_event("s1", 9.0, "ada"));
    assert!(dir.apply_idle(&idle_event("s1", UserIdleState::Away)));
    let entry = dir.get("s1").unwrap();
    assert_eq!(entry.pointer, Some(Pointer { x: 9.0, y: 0.0 }));
    assert_eq!(entry.user_state, Some(UserIdleState::Away));
    assert_eq!(entry.username.as_deref(), Some("zed"));
}

#[test]
fn empty_socket_id_is_rejected() {
    let mut dir = PresenceDirectory::new();
    assert!(!dir.apply_pointer(&pointer_event("", 1.0, "x")));
    assert!(!dir.apply_idle(&idle_event("", UserIdleState::Idle)));
    assert!(dir.is_empty());
}

#[test]
fn snapshot_is_independent_copy() {
    let mut dir = PresenceDirectory::new();
    dir.apply_pointer(&pointer_event("s1", 1.0, "ada"));
    let snap = dir.snapshot();
    dir.clear();
    assert!(dir.is_empty());
    assert_eq!(snap.len(), 1);
}
