//! End-to-end tests against a real listener, driven by WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

use coinrush_server::ServerState;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const GENERIC_ERROR: &str = "Lobby not found, full, or already started";

async fn start_server() -> (SocketAddr, ServerState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = ServerState::default();
    tokio::spawn(coinrush_server::serve(listener, state.clone()));
    (addr, state)
}

/// Connect a client and consume its welcome message, returning its id.
async fn connect(addr: SocketAddr) -> (Peer, Value) {
    let (mut peer, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    let welcome = recv(&mut peer).await;
    assert_eq!(welcome["type"], "welcome");
    assert!(welcome["id"].is_u64());
    (peer, welcome["id"].clone())
}

async fn send(peer: &mut Peer, msg: Value) {
    peer.send(Message::Text(msg.to_string())).await.unwrap();
}

async fn recv(peer: &mut Peer) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), peer.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Skip ahead to the next message of the given type. Snapshots stream in continuously
/// once a game has started.
async fn recv_type(peer: &mut Peer, ty: &str) -> Value {
    loop {
        let msg = recv(peer).await;
        if msg["type"] == ty {
            return msg;
        }
    }
}

async fn create_lobby(peer: &mut Peer, difficulty: &str) -> String {
    send(
        peer,
        json!({ "type": "create_lobby", "map": "arena1", "difficulty": difficulty }),
    )
    .await;
    let created = recv(peer).await;
    assert_eq!(created["type"], "lobby_created");
    created["code"].as_str().unwrap().to_owned()
}

async fn join_lobby(peer: &mut Peer, code: &str) -> Value {
    send(peer, json!({ "type": "join_lobby", "code": code })).await;
    recv(peer).await
}

#[tokio::test]
async fn create_join_start() {
    let (addr, _state) = start_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;
    assert_ne!(a_id, b_id);

    send(
        &mut a,
        json!({ "type": "create_lobby", "map": "arena1", "difficulty": "hard" }),
    )
    .await;
    let created = recv(&mut a).await;
    assert_eq!(created["type"], "lobby_created");
    assert_eq!(created["hostId"], a_id);
    assert_eq!(created["playerId"], a_id);
    let code = created["code"].as_str().unwrap().to_owned();
    assert_eq!(code.len(), 4);
    assert!(code.chars().all(|c| c.is_ascii_uppercase()));

    assert_eq!(
        join_lobby(&mut b, &code).await,
        json!({ "type": "lobby_joined", "code": code, "hostId": a_id, "playerId": b_id })
    );
    assert_eq!(recv(&mut b).await, json!({ "type": "player_joined", "count": 2 }));
    assert_eq!(recv(&mut a).await, json!({ "type": "player_joined", "count": 2 }));

    send(&mut a, json!({ "type": "start_game" })).await;
    for peer in [&mut a, &mut b] {
        let start = recv(peer).await;
        assert_eq!(start["type"], "start_game");
        assert_eq!(start["map"], "arena1");
        assert_eq!(start["difficulty"], "hard");
        assert_eq!(start["enemies"].as_array().unwrap().len(), 2);
        assert_eq!(start["coins"].as_array().unwrap().len(), 2);

        let players = start["players"].as_object().unwrap();
        assert_eq!(players.len(), 2);
        let a_state = &players[&a_id.to_string()];
        assert_eq!(
            a_state,
            &json!({ "x": 100.0, "y": 100.0, "width": 40.0, "height": 40.0, "speed": 4.0, "score": 0.0 })
        );
        for enemy in start["enemies"].as_array().unwrap() {
            let speed = enemy["speed"].as_f64().unwrap();
            assert!((1.0..2.0).contains(&speed));
        }
    }

    // The world keeps streaming once the game has started
    let update = recv_type(&mut b, "update_state").await;
    assert_eq!(update["players"].as_object().unwrap().len(), 2);
    assert_eq!(update["enemies"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn only_host_starts() {
    let (addr, _state) = start_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;

    let code = create_lobby(&mut a, "normal").await;
    assert_eq!(join_lobby(&mut b, &code).await["type"], "lobby_joined");
    recv_type(&mut a, "player_joined").await;
    recv_type(&mut b, "player_joined").await;

    // Ignored without a reply
    send(&mut b, json!({ "type": "start_game" })).await;
    send(&mut a, json!({ "type": "start_game" })).await;
    let start = recv(&mut b).await;
    assert_eq!(start["type"], "start_game");
    assert_eq!(start["enemies"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn fifth_player_is_rejected() {
    let (addr, _state) = start_server().await;
    let (mut host, _) = connect(addr).await;
    let code = create_lobby(&mut host, "normal").await;

    let mut others = Vec::new();
    for count in 2..=4 {
        let (mut peer, _) = connect(addr).await;
        assert_eq!(join_lobby(&mut peer, &code).await["type"], "lobby_joined");
        assert_eq!(
            recv(&mut peer).await,
            json!({ "type": "player_joined", "count": count })
        );
        others.push(peer);
    }

    let (mut fifth, _) = connect(addr).await;
    assert_eq!(
        join_lobby(&mut fifth, &code).await,
        json!({ "type": "error", "message": GENERIC_ERROR })
    );
}

#[tokio::test]
async fn no_joins_after_start() {
    let (addr, _state) = start_server().await;
    let (mut host, _) = connect(addr).await;
    let code = create_lobby(&mut host, "impossible").await;

    send(&mut host, json!({ "type": "start_game" })).await;
    let start = recv(&mut host).await;
    assert_eq!(start["enemies"].as_array().unwrap().len(), 5);

    let (mut late, _) = connect(addr).await;
    assert_eq!(
        join_lobby(&mut late, &code).await,
        json!({ "type": "error", "message": GENERIC_ERROR })
    );
}

#[tokio::test]
async fn lobby_closes_after_last_member_leaves() {
    let (addr, state) = start_server().await;
    let (mut host, _) = connect(addr).await;
    let code = create_lobby(&mut host, "normal").await;
    assert_eq!(state.lobby_count(), 1);

    host.close(None).await.unwrap();
    drop(host);
    timeout(Duration::from_secs(2), async {
        while state.lobby_count() != 0 || state.player_count() != 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Lobby was never closed");

    let (mut peer, _) = connect(addr).await;
    assert_eq!(
        join_lobby(&mut peer, &code).await,
        json!({ "type": "error", "message": GENERIC_ERROR })
    );
}

#[tokio::test]
async fn members_hear_about_departures() {
    let (addr, _state) = start_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;

    let code = create_lobby(&mut a, "normal").await;
    assert_eq!(join_lobby(&mut b, &code).await["type"], "lobby_joined");
    recv_type(&mut a, "player_joined").await;

    b.close(None).await.unwrap();
    assert_eq!(
        recv(&mut a).await,
        json!({ "type": "player_left", "playerId": b_id })
    );
}

#[tokio::test]
async fn malformed_messages_are_ignored() {
    let (addr, _state) = start_server().await;
    let (mut peer, _) = connect(addr).await;

    peer.send(Message::Text("not json".to_owned())).await.unwrap();
    send(&mut peer, json!({ "type": "teleport" })).await;
    send(&mut peer, json!({ "type": 7 })).await;
    send(&mut peer, json!({ "code": "ABCD" })).await;
    send(&mut peer, json!({ "type": "player_state", "state": 5 })).await;

    // Nothing was sent back for any of those
    create_lobby(&mut peer, "normal").await;
}

#[tokio::test]
async fn any_difficulty_is_echoed() {
    let (addr, _state) = start_server().await;

    for (map, difficulty) in [
        (json!("arena1"), json!(3)),
        (json!("arena1"), Value::Null),
        (json!({ "name": "arena2" }), json!("chill")),
    ] {
        let (mut host, _) = connect(addr).await;
        send(
            &mut host,
            json!({ "type": "create_lobby", "map": map, "difficulty": difficulty }),
        )
        .await;
        assert_eq!(recv(&mut host).await["type"], "lobby_created");

        send(&mut host, json!({ "type": "start_game" })).await;
        let start = recv(&mut host).await;
        assert_eq!(start["type"], "start_game");
        assert_eq!(start["map"], map);
        assert_eq!(start["difficulty"], difficulty);
        assert_eq!(start["enemies"].as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn non_string_code_gets_generic_error() {
    let (addr, _state) = start_server().await;
    let (mut host, _) = connect(addr).await;
    create_lobby(&mut host, "normal").await;

    let (mut peer, _) = connect(addr).await;
    for code in [json!(1234), Value::Null] {
        send(&mut peer, json!({ "type": "join_lobby", "code": code })).await;
        assert_eq!(
            recv(&mut peer).await,
            json!({ "type": "error", "message": GENERIC_ERROR })
        );
    }
}

#[tokio::test]
async fn player_state_is_merged_and_relayed() {
    let (addr, _state) = start_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let key = a_id.to_string();

    let code = create_lobby(&mut a, "normal").await;
    assert_eq!(join_lobby(&mut b, &code).await["type"], "lobby_joined");
    recv_type(&mut a, "player_joined").await;
    send(&mut a, json!({ "type": "start_game" })).await;
    recv_type(&mut b, "start_game").await;

    send(
        &mut a,
        json!({ "type": "player_state", "state": { "x": 400, "y": 300, "name": "ann" } }),
    )
    .await;
    send(
        &mut a,
        json!({ "type": "player_state", "state": { "x": 410, "score": "7" } }),
    )
    .await;

    let seen = timeout(Duration::from_secs(2), async {
        loop {
            let update = recv_type(&mut b, "update_state").await;
            let state = update["players"][&key].clone();
            if state["x"] == 410.0 {
                return state;
            }
        }
    })
    .await
    .expect("Player state was never relayed");
    assert_eq!(seen["y"], 300.0);
    assert_eq!(seen["name"], "ann");
    assert_eq!(seen["width"], 40.0);
    assert_eq!(seen["score"], 0.0);
}

#[tokio::test]
async fn idle_server_ticks_quietly() {
    let (addr, state) = start_server().await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(state.lobby_count(), 0);
    assert_eq!(coinrush_server::tick::tick_lobbies(&state, std::time::Instant::now()), 0);

    // Still serving
    let (mut peer, _) = connect(addr).await;
    create_lobby(&mut peer, "normal").await;
}
