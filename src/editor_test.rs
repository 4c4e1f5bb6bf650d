use super::*;

#[test]
fn in_progress_ids_cover_every_interaction() {
    let state = AppState {
        editing_element_id: Some("text".into()),
        resizing_element_id: Some("box".into()),
        dragging_element_ids: vec!["a".into(), "b".into()],
        ..AppState::default()
    };
    let ids = state.in_progress_ids();
    assert_eq!(ids.len(), 4);
    assert!(ids.contains("text") && ids.contains("box") && ids.contains("a"));
}

#[test]
fn idle_editor_has_nothing_in_progress() {
    assert!(AppState::default().in_progress_ids().is_empty());
}

#[test]
fn memory_editor_hides_tombstones_from_live_scene() {
    let editor = MemoryEditor::with_elements(vec![Element::new("a", 1, 1), Element::new("b", 2, 1).with_deleted(true)]);
    assert_eq!(editor.scene_elements().len(), 1);
    assert_eq!(editor.scene_elements_including_deleted().len(), 2);
}

#[test]
fn update_scene_only_touches_supplied_parts() {
    let mut editor = MemoryEditor::with_elements(vec![Element::new("a", 1, 1)]);
    editor.update_scene(SceneUpdate::collaborators(HashMap::from([("s1".into(), Collaborator::default())])));
    assert_eq!(editor.scene_elements().len(), 1);
    assert_eq!(editor.collaborators().len(), 1);

    editor.update_scene(SceneUpdate::elements(Vec::new()).committed());
    assert!(editor.scene_elements().is_empty());
    assert_eq!(editor.collaborators().len(), 1);
    assert!(editor.updates()[1].commit_to_history);
}

#[test]
fn take_updates_drains_the_log() {
    let mut editor = MemoryEditor::new();
    editor.update_scene(SceneUpdate::elements(vec![Element::new("a", 1, 1)]));
    editor.update_scene(SceneUpdate::collaborators(HashMap::new()));

    let taken = editor.take_updates();

    assert_eq!(taken.len(), 2);
    assert!(editor.updates().is_empty());
    assert_eq!(editor.scene_elements().len(), 1);
    editor.update_scene(SceneUpdate::elements(Vec::new()));
    assert_eq!(editor.take_updates().len(), 1);
}

#[test]
fn memory_shell_records_calls() {
    let mut shell = MemoryShell::new("https://draw.test/", "ada").with_theme(Theme::Dark);
    shell.set_share_url("https://draw.test/#room=a,b");
    shell.share_state_changed(true);
    shell.alert("E_DECRYPT", "couldn't decrypt data");
    shell.push_location("https://draw.test/#room=a,b");

    assert_eq!(shell.theme(), Theme::Dark);
    assert_eq!(shell.share_url(), Some("https://draw.test/#room=a,b"));
    assert_eq!(shell.location(), "https://draw.test/#room=a,b");
    assert_eq!(shell.share_states(), [true]);
    assert_eq!(shell.alerts()[0].0, "E_DECRYPT");

    shell.clear_share_url();
    assert_eq!(shell.share_url(), None);
}
