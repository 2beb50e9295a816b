use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game_state::{Coin, Enemy};
use crate::lobby::{Difficulty, LobbyCode};
use crate::player::{PlayerStateUpdate, Players};
use crate::PlayerId;

/// Reply to any failed `join_lobby`, whatever the reason.
pub const LOBBY_UNAVAILABLE: &str = "Lobby not found, full, or already started";

/// Messages sent by clients. Every message is a JSON object with a `type` field.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// `map` and `difficulty` may be any JSON value, they are only ever echoed back.
    CreateLobby {
        #[serde(default)]
        map: Value,
        #[serde(default)]
        difficulty: Difficulty,
    },
    /// The code is kept as raw JSON so a code that isn't even a string is reported
    /// the same way as an unknown one.
    JoinLobby {
        #[serde(default)]
        code: Value,
    },
    StartGame,
    PlayerState {
        #[serde(default)]
        state: PlayerStateUpdate,
    },
}

/// Messages sent by the server. Snapshots borrow from lobby state since they are
/// encoded once and then fanned out to every member.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Welcome {
        id: PlayerId,
    },
    LobbyCreated {
        code: LobbyCode,
        #[serde(rename = "hostId")]
        host_id: PlayerId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    LobbyJoined {
        code: LobbyCode,
        #[serde(rename = "hostId")]
        host_id: PlayerId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    Error {
        message: &'a str,
    },
    PlayerJoined {
        count: usize,
    },
    StartGame {
        map: &'a Value,
        difficulty: &'a Difficulty,
        players: &'a Players,
        coins: &'a [Coin],
        enemies: &'a [Enemy],
    },
    UpdateState {
        players: &'a Players,
        coins: &'a [Coin],
        enemies: &'a [Enemy],
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}
