//! Integration tests for the orchestrator, the connection handler, and the
//! full WebSocket flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use geoguess::prelude::*;
use geoguess_store::ResultQuery;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Orchestrator harness
// =========================================================================

const TARGET: Coordinate = Coordinate {
    lat: 40.0,
    lon: -75.0,
};

fn single_target() -> Arc<dyn TargetSource> {
    Arc::new(TargetList::new(vec![RoundTarget::new("img-1", TARGET)]).unwrap())
}

fn duel_settings() -> RoomSettings {
    RoomSettings {
        max_players: 2,
        total_rounds: 1,
        round_time_limit_secs: Some(30),
        auto_advance: true,
        results_display_secs: 5,
    }
}

struct Harness {
    orchestrator: Orchestrator<MemoryStore>,
    store: Arc<MemoryStore>,
    hub: Arc<ConnectionHub>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(ConnectionHub::new());
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        hub.clone(),
        single_target(),
        EngineConfig::default(),
    );
    Harness {
        orchestrator,
        store,
        hub,
    }
}

fn user(id: &str) -> UserId {
    UserId::from(id)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn create_room(h: &Harness, host: &str) -> RoomCode {
    match h
        .orchestrator
        .dispatch(&user(host), ClientEvent::CreateRoom {
            settings: duel_settings(),
        })
        .await
        .unwrap()
    {
        Some(ServerEvent::RoomState { room }) => room.code,
        other => panic!("expected RoomState, got {other:?}"),
    }
}

// =========================================================================
// Orchestrator
// =========================================================================

#[tokio::test]
async fn test_create_room_replies_directly() {
    let h = harness();
    let reply = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::CreateRoom {
            settings: duel_settings(),
        })
        .await
        .unwrap();
    let Some(ServerEvent::RoomState { room }) = reply else {
        panic!("expected RoomState");
    };
    assert_eq!(room.host, user("a"));
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.player(&user("a")).unwrap().ready);
    assert_eq!(h.orchestrator.rooms().room_count().await, 1);
}

#[tokio::test]
async fn test_join_confirmation_arrives_through_room_stream() {
    let h = harness();
    let (_, mut a_rx) = h.hub.register(user("a"));
    let (_, mut b_rx) = h.hub.register(user("b"));
    let code = create_room(&h, "a").await;

    let reply = h
        .orchestrator
        .dispatch(&user("b"), ClientEvent::JoinRoom { code: code.clone() })
        .await
        .unwrap();
    assert!(reply.is_none());

    let b_events = drain(&mut b_rx);
    assert!(matches!(
        b_events.as_slice(),
        [ServerEvent::RoomState { room }] if room.players.len() == 2
    ));
    let a_events = drain(&mut a_rx);
    assert!(matches!(
        a_events.as_slice(),
        [ServerEvent::PlayerJoined { player, .. }] if player.user_id == user("b")
    ));
}

#[tokio::test]
async fn test_handle_event_reports_errors_to_requester() {
    let h = harness();
    let (_, mut rx) = h.hub.register(user("a"));
    let code = RoomCode::parse("ZZZZZZ").unwrap();

    h.orchestrator
        .handle_event(&user("a"), ClientEvent::JoinRoom { code })
        .await;

    match drain(&mut rx).as_slice() {
        [ServerEvent::Error { kind, message }] => {
            assert_eq!(*kind, ErrorKind::NotFound);
            assert!(message.contains("ZZZZZZ"));
        }
        other => panic!("expected one error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_host_only_action_is_forbidden() {
    let h = harness();
    let code = create_room(&h, "a").await;
    h.orchestrator
        .dispatch(&user("b"), ClientEvent::JoinRoom { code: code.clone() })
        .await
        .unwrap();

    let err = h
        .orchestrator
        .dispatch(&user("b"), ClientEvent::StartGame { code })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_control_frames_rejected_after_handshake() {
    let h = harness();
    let err = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::Hello {
            version: PROTOCOL_VERSION,
            token: Some("a".into()),
            resume: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadState);
}

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let h = harness();
    let reply = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::Heartbeat { client_time: 42 })
        .await
        .unwrap();
    assert!(matches!(
        reply,
        Some(ServerEvent::HeartbeatAck { client_time: 42, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_multiplayer_round_through_orchestrator() {
    let h = harness();
    let (_, mut a_rx) = h.hub.register(user("a"));
    let (_, mut b_rx) = h.hub.register(user("b"));
    let code = create_room(&h, "a").await;

    for (who, event) in [
        ("b", ClientEvent::JoinRoom { code: code.clone() }),
        ("b", ClientEvent::SetReady {
            code: code.clone(),
            ready: true,
        }),
        ("a", ClientEvent::StartGame { code: code.clone() }),
        ("a", ClientEvent::SubmitGuess {
            code: code.clone(),
            round: 1,
            location: TARGET,
        }),
        ("b", ClientEvent::SubmitGuess {
            code: code.clone(),
            round: 1,
            location: Coordinate {
                lat: 41.0,
                lon: -75.0,
            },
        }),
    ] {
        assert!(h.orchestrator.dispatch(&user(who), event).await.unwrap().is_none());
    }

    let a_events = drain(&mut a_rx);
    let accepted = a_events.iter().find_map(|e| match e {
        ServerEvent::GuessAccepted { outcome, .. } => Some(outcome.score),
        _ => None,
    });
    assert_eq!(accepted, Some(1000));

    let results = drain(&mut b_rx)
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::RoundResults { outcomes, .. } => Some(outcomes),
            _ => None,
        })
        .expect("round sealed once both guessed");
    let scores: Vec<(String, u32)> = results
        .iter()
        .map(|o| (o.user_id.to_string(), o.score))
        .collect();
    assert_eq!(scores, vec![("a".into(), 1000), ("b".into(), 946)]);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(drain(&mut a_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::GameFinished { .. })));

    let reply = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::MyStats)
        .await
        .unwrap();
    let Some(ServerEvent::PersonalStats { stats }) = reply else {
        panic!("expected PersonalStats");
    };
    assert_eq!(stats.multiplayer_games, 1);
    assert_eq!(stats.best_score, 1000);
    assert_eq!(stats.global_rank, 1);
}

// =========================================================================
// Solo play and statistics
// =========================================================================

#[tokio::test]
async fn test_solo_guess_scores_and_records() {
    let h = harness();
    let reply = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::SoloGuess {
            target: TARGET,
            location: TARGET,
        })
        .await
        .unwrap();
    assert!(matches!(
        reply,
        Some(ServerEvent::SoloResult { score: 1000, distance_km }) if distance_km == 0.0
    ));

    let anonymous = h
        .orchestrator
        .solo_guess(None, TARGET, Coordinate {
            lat: 41.0,
            lon: -75.0,
        })
        .await
        .unwrap();
    assert_eq!(anonymous.score, 946);
    assert_eq!(anonymous.round, 0);
    assert!(anonymous.user_id.is_none());

    let stored = h.store.query_results(&ResultQuery::all()).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_solo_guess_rejects_out_of_range() {
    let h = harness();
    let err = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::SoloGuess {
            target: TARGET,
            location: Coordinate {
                lat: 91.0,
                lon: 0.0,
            },
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadState);
    assert_eq!(h.store.result_count().await, 0);
}

#[tokio::test]
async fn test_solo_guess_store_failure_is_internal() {
    let h = harness();
    h.store.fail_result_appends(true);
    let err = h
        .orchestrator
        .solo_guess(Some(user("a")), TARGET, TARGET)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_stats_queries_reply_directly() {
    let h = harness();
    for (who, lat) in [("a", 40.0), ("b", 45.0), ("a", 50.0)] {
        h.orchestrator
            .solo_guess(Some(user(who)), TARGET, Coordinate { lat, lon: -75.0 })
            .await
            .unwrap();
    }

    let Some(ServerEvent::Leaderboard { entries }) = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::Leaderboard { limit: None })
        .await
        .unwrap()
    else {
        panic!("expected Leaderboard");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].user_id, user("a"));
    assert_eq!(entries[0].total_games, 2);

    let Some(ServerEvent::RecentWinners { entries }) = h
        .orchestrator
        .dispatch(&user("a"), ClientEvent::RecentWinners {
            window_hours: Some(1),
            limit: Some(1),
        })
        .await
        .unwrap()
    else {
        panic!("expected RecentWinners");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].score, 1000);
}

// =========================================================================
// WebSocket end to end
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Running {
    addr: std::net::SocketAddr,
    stop: Option<tokio::sync::oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<Result<(), GeoguessError>>,
}

impl Running {
    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

async fn start_server() -> Running {
    let server = GeoguessServerBuilder::new()
        .bind("127.0.0.1:0")
        .targets(single_target())
        .build(DevAuthenticator, Arc::new(MemoryStore::new()))
        .await
        .expect("server should bind");
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));
    Running {
        addr,
        stop: Some(stop),
        task,
    }
}

async fn send(ws: &mut ClientWs, body: serde_json::Value) {
    let frame = json!({ "seq": 0, "timestamp": 0, "body": body });
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server should answer")
            .expect("stream open")
            .expect("valid frame");
        if msg.is_text() || msg.is_binary() {
            let envelope: Envelope<ServerEvent> =
                serde_json::from_slice(&msg.into_data()).unwrap();
            return envelope.body;
        }
    }
}

/// Skips events until one matches.
async fn expect_event(
    ws: &mut ClientWs,
    wanted: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    loop {
        let event = next_event(ws).await;
        if wanted(&event) {
            return event;
        }
    }
}

/// Connects and completes the handshake; returns the reconnect token.
async fn connect(addr: std::net::SocketAddr, token: &str) -> (ClientWs, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    send(
        &mut ws,
        json!({ "type": "Hello", "version": PROTOCOL_VERSION, "token": token }),
    )
    .await;
    match next_event(&mut ws).await {
        ServerEvent::Welcome {
            user_id,
            reconnect_token,
            ..
        } => {
            assert_eq!(user_id.as_str(), token);
            (ws, reconnect_token)
        }
        other => panic!("expected Welcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ws_handshake_rejects_wrong_version() {
    let server = start_server().await;
    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}", server.addr))
            .await
            .unwrap();
    send(&mut ws, json!({ "type": "Hello", "version": 99, "token": "a" })).await;

    match next_event(&mut ws).await {
        ServerEvent::Error { kind, message } => {
            assert_eq!(kind, ErrorKind::BadState);
            assert!(message.contains("version"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_ws_first_frame_must_be_hello() {
    let server = start_server().await;
    let (mut ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}", server.addr))
            .await
            .unwrap();
    send(&mut ws, json!({ "type": "MyStats" })).await;
    assert!(matches!(
        next_event(&mut ws).await,
        ServerEvent::Error {
            kind: ErrorKind::BadState,
            ..
        }
    ));
    server.stop().await;
}

#[tokio::test]
async fn test_ws_second_connection_for_same_user_rejected() {
    let server = start_server().await;
    let (_first, _) = connect(server.addr, "alice").await;

    let (mut second, _) =
        tokio_tungstenite::connect_async(format!("ws://{}", server.addr))
            .await
            .unwrap();
    send(
        &mut second,
        json!({ "type": "Hello", "version": PROTOCOL_VERSION, "token": "alice" }),
    )
    .await;
    assert!(matches!(
        next_event(&mut second).await,
        ServerEvent::Error {
            kind: ErrorKind::Conflict,
            ..
        }
    ));
    server.stop().await;
}

#[tokio::test]
async fn test_ws_malformed_frame_keeps_connection() {
    let server = start_server().await;
    let (mut ws, _) = connect(server.addr, "alice").await;

    ws.send(Message::text("not json".to_string())).await.unwrap();
    assert!(matches!(
        next_event(&mut ws).await,
        ServerEvent::Error {
            kind: ErrorKind::BadState,
            ..
        }
    ));

    send(&mut ws, json!({ "type": "Heartbeat", "client_time": 7 })).await;
    assert!(matches!(
        next_event(&mut ws).await,
        ServerEvent::HeartbeatAck { client_time: 7, .. }
    ));
    server.stop().await;
}

/// Resumes a session with its reconnect token, retrying until the server
/// has seen the old connection close.
async fn resume(addr: std::net::SocketAddr, token: &str) -> (ClientWs, UserId) {
    for _ in 0..50 {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        send(
            &mut ws,
            json!({ "type": "Hello", "version": PROTOCOL_VERSION, "resume": token }),
        )
        .await;
        match next_event(&mut ws).await {
            ServerEvent::Welcome { user_id, .. } => return (ws, user_id),
            ServerEvent::Error { .. } => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    panic!("session never became resumable");
}

#[tokio::test]
async fn test_ws_resume_with_reconnect_token() {
    let server = start_server().await;
    let (mut ws, token) = connect(server.addr, "alice").await;
    send(&mut ws, json!({ "type": "Disconnect", "reason": "bye" })).await;
    drop(ws);

    let (_ws, resumed) = resume(server.addr, &token).await;
    assert_eq!(resumed, user("alice"));
    server.stop().await;
}

#[tokio::test]
async fn test_ws_resumed_player_recovers_open_round() {
    let server = start_server().await;
    let (mut a, _) = connect(server.addr, "alice").await;
    let (mut b, b_token) = connect(server.addr, "bob").await;

    send(
        &mut a,
        json!({ "type": "CreateRoom", "settings": {
            "max_players": 2,
            "total_rounds": 1,
            "round_time_limit_secs": 60,
            "auto_advance": true,
            "results_display_secs": 5
        }}),
    )
    .await;
    let ServerEvent::RoomState { room } = next_event(&mut a).await else {
        panic!("expected RoomState");
    };
    let code = room.code.to_string();

    send(&mut b, json!({ "type": "JoinRoom", "code": code })).await;
    expect_event(&mut b, |e| matches!(e, ServerEvent::RoomState { .. })).await;
    send(&mut b, json!({ "type": "SetReady", "code": code, "ready": true })).await;
    expect_event(&mut a, |e| matches!(e, ServerEvent::ReadyChanged { .. })).await;
    send(&mut a, json!({ "type": "StartGame", "code": code })).await;
    expect_event(&mut b, |e| matches!(e, ServerEvent::RoundStarted { .. })).await;

    send(
        &mut a,
        json!({ "type": "SubmitGuess", "code": code, "round": 1,
                "location": { "lat": 40.0, "lon": -75.0 } }),
    )
    .await;
    expect_event(&mut b, |e| matches!(e, ServerEvent::PlayerGuessed { .. })).await;

    // Bob drops mid-round and comes back; the round announcement is gone.
    send(&mut b, json!({ "type": "Disconnect", "reason": "wifi" })).await;
    drop(b);
    let (mut b, resumed) = resume(server.addr, &b_token).await;
    assert_eq!(resumed, user("bob"));

    send(&mut b, json!({ "type": "GetRoom", "code": code })).await;
    let ServerEvent::RoomState { room } =
        expect_event(&mut b, |e| matches!(e, ServerEvent::RoomState { .. })).await
    else {
        unreachable!();
    };
    let round = room.round.expect("round in play");
    assert_eq!(round.index, 1);
    assert_eq!(round.image_id, "img-1");
    assert_eq!(round.status, RoundStatus::Active);
    assert_eq!(round.guessed, vec![user("alice")]);
    assert!(!round.has_guessed(&user("bob")));
    assert!(round.time_left_ms.is_some_and(|ms| ms <= 60_000));
    assert_eq!(round.target, None);

    send(
        &mut b,
        json!({ "type": "SubmitGuess", "code": code, "round": round.index,
                "location": { "lat": 41.0, "lon": -75.0 } }),
    )
    .await;
    let accepted =
        expect_event(&mut b, |e| matches!(e, ServerEvent::GuessAccepted { .. })).await;
    assert!(matches!(
        accepted,
        ServerEvent::GuessAccepted { ref outcome, .. } if outcome.score == 946
    ));

    server.stop().await;
}

#[tokio::test]
async fn test_ws_full_round() {
    let server = start_server().await;
    let (mut a, _) = connect(server.addr, "alice").await;
    let (mut b, _) = connect(server.addr, "bob").await;

    send(
        &mut a,
        json!({ "type": "CreateRoom", "settings": {
            "max_players": 2,
            "total_rounds": 1,
            "round_time_limit_secs": 30,
            "auto_advance": true,
            "results_display_secs": 5
        }}),
    )
    .await;
    let ServerEvent::RoomState { room } = next_event(&mut a).await else {
        panic!("expected RoomState");
    };
    let code = room.code.to_string();

    send(&mut b, json!({ "type": "JoinRoom", "code": code })).await;
    assert!(matches!(next_event(&mut b).await, ServerEvent::RoomState { .. }));
    assert!(matches!(next_event(&mut a).await, ServerEvent::PlayerJoined { .. }));

    send(&mut b, json!({ "type": "SetReady", "code": code, "ready": true })).await;
    expect_event(&mut a, |e| matches!(e, ServerEvent::ReadyChanged { .. })).await;
    send(&mut a, json!({ "type": "StartGame", "code": code })).await;

    let started = expect_event(&mut b, |e| matches!(e, ServerEvent::RoundStarted { .. })).await;
    let ServerEvent::RoundStarted { round, image_id, .. } = started else {
        unreachable!();
    };
    assert_eq!(round, 1);
    assert_eq!(image_id, "img-1");

    send(
        &mut a,
        json!({ "type": "SubmitGuess", "code": code, "round": 1,
                "location": { "lat": 40.0, "lon": -75.0 } }),
    )
    .await;
    let accepted =
        expect_event(&mut a, |e| matches!(e, ServerEvent::GuessAccepted { .. })).await;
    assert!(matches!(
        accepted,
        ServerEvent::GuessAccepted { ref outcome, .. } if outcome.score == 1000
    ));
    assert!(matches!(
        expect_event(&mut b, |e| matches!(e, ServerEvent::PlayerGuessed { .. })).await,
        ServerEvent::PlayerGuessed { ref user_id, .. } if user_id.as_str() == "alice"
    ));

    send(
        &mut b,
        json!({ "type": "SubmitGuess", "code": code, "round": 1,
                "location": { "lat": 41.0, "lon": -75.0 } }),
    )
    .await;
    for ws in [&mut a, &mut b] {
        let results =
            expect_event(ws, |e| matches!(e, ServerEvent::RoundResults { .. })).await;
        let ServerEvent::RoundResults {
            outcomes,
            standings,
            ..
        } = results
        else {
            unreachable!();
        };
        assert_eq!(outcomes[0].score, 1000);
        assert_eq!(outcomes[1].score, 946);
        assert_eq!(standings[0].user_id.as_str(), "alice");
    }

    server.stop().await;
}
