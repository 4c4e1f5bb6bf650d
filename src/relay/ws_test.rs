use super::*;
use serde_json::{Value, json};

fn decode_json(value: &Value) -> Result<Option<RelayEvent>, TransportError> {
    decode_frame(&value.to_string())
}

// =============================================================================
// INBOUND
// =============================================================================

#[test]
fn connected_frame_carries_socket_id() {
    let event = decode_json(&json!({"event": "connected", "data": {"socketId": "abc"}})).unwrap();
    assert_eq!(event, Some(RelayEvent::Connected { socket_id: "abc".into() }));
}

#[test]
fn unit_events_decode_without_data() {
    assert_eq!(decode_json(&json!({"event": "init-room"})).unwrap(), Some(RelayEvent::InitRoom));
    assert_eq!(decode_json(&json!({"event": "first-in-room"})).unwrap(), Some(RelayEvent::FirstInRoom));
}

#[test]
fn roster_and_new_user_decode() {
    assert_eq!(
        decode_json(&json!({"event": "new-user", "data": "s2"})).unwrap(),
        Some(RelayEvent::NewUser { socket_id: "s2".into() })
    );
    assert_eq!(
        decode_json(&json!({"event": "room-user-change", "data": ["s1", "s2"]})).unwrap(),
        Some(RelayEvent::RoomUserChange { socket_ids: vec!["s1".into(), "s2".into()] })
    );
}

#[test]
fn client_broadcast_decodes_base64_payloads() {
    let event = decode_json(&json!({
        "event": "client-broadcast",
        "data": {"ciphertext": STANDARD.encode([1u8, 2, 3]), "iv": STANDARD.encode([9u8; 12])}
    }))
    .unwrap();
    assert_eq!(event, Some(RelayEvent::ClientBroadcast { ciphertext: vec![1, 2, 3], iv: vec![9; 12] }));
}

#[test]
fn client_broadcast_with_bad_base64_is_error() {
    let err = decode_json(&json!({
        "event": "client-broadcast",
        "data": {"ciphertext": "***", "iv": ""}
    }))
    .unwrap_err();
    assert!(matches!(err, TransportError::Encode(_)));
}

#[test]
fn outbound_only_frames_are_ignored() {
    assert_eq!(decode_json(&json!({"event": "join-room", "data": "room"})).unwrap(), None);
}

#[test]
fn unknown_event_is_error() {
    assert!(matches!(decode_json(&json!({"event": "chat", "data": 1})), Err(TransportError::Encode(_))));
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[test]
fn join_room_encodes_room_id() {
    let text = encode_outbound(&Outbound::JoinRoom { room_id: "r1".into() }).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({"event": "join-room", "data": "r1"}));
}

#[test]
fn broadcast_picks_channel_by_volatility() {
    let reliable = Outbound::Broadcast { room_id: "r1".into(), volatile: false, ciphertext: vec![7], iv: [0; 12] };
    let volatile = Outbound::Broadcast { room_id: "r1".into(), volatile: true, ciphertext: vec![7], iv: [0; 12] };

    let reliable: Value = serde_json::from_str(&encode_outbound(&reliable).unwrap()).unwrap();
    let volatile: Value = serde_json::from_str(&encode_outbound(&volatile).unwrap()).unwrap();

    assert_eq!(reliable["event"], "server-broadcast");
    assert_eq!(volatile["event"], "server-volatile-broadcast");
    assert_eq!(reliable["data"]["roomId"], "r1");
    assert_eq!(reliable["data"]["ciphertext"], STANDARD.encode([7u8]));
    assert_eq!(reliable["data"]["iv"], STANDARD.encode([0u8; 12]));
}

#[test]
fn frame_names_match_event_constants() {
    let frame = outbound_to_frame(&Outbound::JoinRoom { room_id: "r".into() });
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["event"], crate::relay::EVENT_JOIN_ROOM);
    assert_eq!(Outbound::JoinRoom { room_id: "r".into() }.name(), crate::relay::EVENT_JOIN_ROOM);
}

// =============================================================================
// RELAY SIDE
// =============================================================================

#[test]
fn relay_reads_client_broadcasts() {
    let text = json!({
        "event": "server-volatile-broadcast",
        "data": {"roomId": "r1", "ciphertext": STANDARD.encode([5u8, 6]), "iv": STANDARD.encode([3u8; 12])}
    })
    .to_string();
    assert_eq!(
        decode_outbound(&text).unwrap(),
        Some(Outbound::Broadcast { room_id: "r1".into(), volatile: true, ciphertext: vec![5, 6], iv: [3; 12] })
    );
    assert_eq!(
        decode_outbound(r#"{"event":"join-room","data":"r1"}"#).unwrap(),
        Some(Outbound::JoinRoom { room_id: "r1".into() })
    );
    assert_eq!(decode_outbound(r#"{"event":"init-room"}"#).unwrap(), None);
}

#[test]
fn relay_rejects_short_iv() {
    let text = json!({
        "event": "server-broadcast",
        "data": {"roomId": "r1", "ciphertext": STANDARD.encode([1u8]), "iv": STANDARD.encode([0u8; 8])}
    })
    .to_string();
    assert!(matches!(decode_outbound(&text), Err(TransportError::Encode(_))));
}

#[test]
fn relay_events_decode_on_the_client() {
    let events = [
        RelayEvent::Connected { socket_id: "s1".into() },
        RelayEvent::InitRoom,
        RelayEvent::NewUser { socket_id: "s2".into() },
        RelayEvent::ClientBroadcast { ciphertext: vec![1, 2], iv: vec![7; 12] },
    ];
    for event in events {
        let text = encode_event(&event).unwrap().unwrap();
        assert_eq!(decode_frame(&text).unwrap(), Some(event));
    }
    assert_eq!(encode_event(&RelayEvent::Disconnected).unwrap(), None);
}

// =============================================================================
// CONNECTOR
// =============================================================================

#[tokio::test]
async fn unreachable_relay_is_unavailable() {
    let connector = WsConnector::new("ws://127.0.0.1:1");
    let Err(err) = connector.connect().await else {
        panic!("expected connect failure");
    };
    assert!(matches!(err, TransportError::Unavailable(_)));
    assert_eq!(crate::ErrorCode::error_code(&err), "E_TRANSPORT");
}
