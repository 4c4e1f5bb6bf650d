use super::*;
use serde_json::json;

fn rect(id: &str, width: f64, height: f64) -> Element {
    Element::new(id, 1, 7)
        .with_attr("type", json!("rectangle"))
        .with_attr("width", json!(width))
        .with_attr("height", json!(height))
}

// =============================================================================
// serde
// =============================================================================

#[test]
fn deserializes_editor_json_and_keeps_unknown_attrs() {
    let raw = json!({
        "id": "e1",
        "type": "ellipse",
        "x": 10.5,
        "y": -3,
        "version": 4,
        "versionNonce": 123_456,
        "isDeleted": false,
        "strokeColor": "#000000"
    });
    let el: Element = serde_json::from_value(raw).unwrap();
    assert_eq!(el.id, "e1");
    assert_eq!(el.version, 4);
    assert_eq!(el.version_nonce, 123_456);
    assert_eq!(el.kind(), Some("ellipse"));
    assert_eq!(el.attrs["strokeColor"], "#000000");
}

#[test]
fn serializes_with_camel_case_replication_fields() {
    let el = Element::new("e1", 2, 9).with_deleted(true);
    let value = serde_json::to_value(&el).unwrap();
    assert_eq!(value["versionNonce"], 9);
    assert_eq!(value["isDeleted"], true);
    assert!(value.get("attrs").is_none());
}

#[test]
fn missing_is_deleted_defaults_to_false() {
    let el: Element = serde_json::from_value(json!({"id": "a", "version": 1, "versionNonce": 1})).unwrap();
    assert!(!el.is_deleted);
}

// =============================================================================
// scene_version
// =============================================================================

#[test]
fn scene_version_of_empty_scene_is_zero() {
    assert_eq!(scene_version(&[]), 0);
}

#[test]
fn scene_version_sums_versions_including_tombstones() {
    let scene = [Element::new("a", 3, 1), Element::new("b", 5, 2).with_deleted(true)];
    assert_eq!(scene_version(&scene), 8);
}

#[test]
fn scene_version_increases_on_any_edit() {
    let before = [Element::new("a", 3, 1), Element::new("b", 5, 2)];
    let after = [Element::new("a", 3, 1), Element::new("b", 6, 99)];
    assert!(scene_version(&after) > scene_version(&before));
}

#[test]
fn scene_version_saturates_on_huge_peer_versions() {
    let scene = [Element::new("x", u64::MAX, 1), Element::new("y", 2, 1)];
    assert_eq!(scene_version(&scene), u64::MAX);
    assert_eq!(scene_version(&[Element::new("x", u64::MAX - 1, 1), Element::new("y", 1, 1)]), u64::MAX);
}

// =============================================================================
// is_invisibly_small / syncable_elements
// =============================================================================

#[test]
fn zero_sized_shape_is_invisibly_small() {
    assert!(rect("a", 0.0, 0.0).is_invisibly_small());
}

#[test]
fn sized_shape_is_visible() {
    assert!(!rect("a", 0.0, 12.0).is_invisibly_small());
}

#[test]
fn shape_without_geometry_is_visible() {
    assert!(!Element::new("a", 1, 1).is_invisibly_small());
}

#[test]
fn linear_element_needs_two_points() {
    let one = Element::new("l", 1, 1)
        .with_attr("type", json!("line"))
        .with_attr("points", json!([[0, 0]]));
    let two = Element::new("l", 1, 1)
        .with_attr("type", json!("arrow"))
        .with_attr("points", json!([[0, 0], [5, 5]]));
    assert!(one.is_invisibly_small());
    assert!(!two.is_invisibly_small());
}

#[test]
fn syncable_drops_small_live_elements_but_keeps_tombstones() {
    let scene = vec![
        rect("visible", 10.0, 10.0),
        rect("tiny", 0.0, 0.0),
        rect("tiny-deleted", 0.0, 0.0).with_deleted(true),
    ];
    let ids: Vec<String> = syncable_elements(&scene).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["visible", "tiny-deleted"]);
}
