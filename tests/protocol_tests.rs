use armada::protocol::{ClientMessage, PeerMessage, ServerMessage, Signal, SignalKind};
use armada::{Coord, Player, RelayError};
use serde_json::{json, Value};

#[test]
fn test_client_messages_parse_from_camel_case() {
    let msg = ClientMessage::parse(
        r#"{"type":"create_room","playerId":"p1","playerName":"Ann","maxTurns":30}"#,
    )
    .unwrap();
    assert_eq!(
        msg,
        ClientMessage::CreateRoom {
            player_id: "p1".into(),
            player_name: "Ann".into(),
            max_turns: Some(30),
        }
    );

    let msg =
        ClientMessage::parse(r#"{"type":"create_room","playerId":"p1","playerName":"Ann"}"#)
            .unwrap();
    assert!(matches!(msg, ClientMessage::CreateRoom { max_turns: None, .. }));
}

#[test]
fn test_signal_field_aliases() {
    for (kind, field) in [
        ("webrtc_offer", "offer"),
        ("webrtc_answer", "answer"),
        ("webrtc_ice_candidate", "candidate"),
    ] {
        let text = json!({"type": kind, "targetPeer": "p2", field: {"x": 1}}).to_string();
        let msg = ClientMessage::parse(&text).unwrap();
        let (_, signal) = msg.as_signal().expect("signal");
        assert_eq!(signal.to, "p2");
        assert_eq!(signal.data, json!({"x": 1}));
    }
}

#[test]
fn test_parse_errors_are_classified() {
    assert!(matches!(
        ClientMessage::parse("{"),
        Err(RelayError::MalformedMessage(_))
    ));
    assert_eq!(
        ClientMessage::parse(r#"{"type":"dance"}"#).unwrap_err(),
        RelayError::UnknownMessageType("dance".into())
    );
    assert!(matches!(
        ClientMessage::parse(r#"{"type":"webrtc_offer","targetPeer":"p2"}"#),
        Err(RelayError::MalformedMessage(_))
    ));
}

#[test]
fn test_server_message_shapes() {
    let players = vec![Player::host("p1", "Ann"), Player::new("p2", "Bo")];
    let value = serde_json::to_value(ServerMessage::RoomJoined {
        room_code: "ABC123".into(),
        player_id: "p2".into(),
        players: players.clone(),
    })
    .unwrap();
    assert_eq!(value["type"], "room_joined");
    assert_eq!(value["roomCode"], "ABC123");
    assert_eq!(value["playerId"], "p2");
    assert_eq!(value["players"][0]["isHost"], true);
    assert_eq!(value["players"][1]["isHost"], false);

    let value = serde_json::to_value(ServerMessage::PlayerLeft {
        player_id: "p1".into(),
        players,
    })
    .unwrap();
    assert_eq!(value["type"], "player_left");
    assert_eq!(value["playerId"], "p1");

    let signal = Signal {
        to: "p2".into(),
        data: json!({"sdp": "x"}),
    };
    let value = serde_json::to_value(ServerMessage::relayed(SignalKind::Offer, "p1", &signal)).unwrap();
    assert_eq!(
        value,
        json!({"type": "webrtc_offer", "from": "p1", "to": "p2", "data": {"sdp": "x"}})
    );

    let value = serde_json::to_value(ServerMessage::error(&RelayError::RoomFull("ABC123".into())))
        .unwrap();
    assert_eq!(value, json!({"type": "error", "message": "room ABC123 is full"}));
}

#[test]
fn test_peer_message_shapes() {
    let attack = PeerMessage::AttackSync {
        coordinates: Coord::new(3, 4),
        attacker: "p1".into(),
        attacking_ship_id: "p1-Carrier-0".into(),
        turn: 7,
    };
    let value: Value = serde_json::from_str(&attack.to_text().unwrap()).unwrap();
    assert_eq!(value["type"], "attack_sync");
    assert_eq!(value["attackingShipId"], "p1-Carrier-0");
    assert_eq!(value["coordinates"], json!({"x": 3, "y": 4}));

    let turn = PeerMessage::TurnSync {
        current_player: Player::new("p2", "Bo"),
        turn_count: 8,
        from_player: "p1".into(),
    };
    let value = serde_json::to_value(&turn).unwrap();
    assert_eq!(value["type"], "turn_sync");
    assert_eq!(value["turnCount"], 8);
    assert_eq!(value["fromPlayer"], "p1");
    assert_eq!(value["currentPlayer"]["id"], "p2");

    let text = r#"{"type":"move_sync","shipId":"p2-Cruiser-2","coordinates":{"x":0,"y":1},"player":"p2","turn":3}"#;
    assert_eq!(
        PeerMessage::from_text(text).unwrap(),
        PeerMessage::MoveSync {
            ship_id: "p2-Cruiser-2".into(),
            coordinates: Coord::new(0, 1),
            player: "p2".into(),
            turn: 3,
        }
    );
}
