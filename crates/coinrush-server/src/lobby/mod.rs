use std::sync::Arc;

use coinrush_lib::game_state::SimConfig;
use coinrush_lib::lobby::{LobbyCode, LobbyOptions};
use coinrush_lib::PlayerId;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::state::OwnedId;

use self::{
    lobby_actor::LobbyActor,
    lobby_handle::{LobbyHandle, LobbyHandleProvider},
};

pub mod lobby_actor;
pub mod lobby_handle;

/// Actions that may queue up for a lobby before ticks start being skipped.
const LOBBY_INBOX_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("No open lobby has this code")]
    NotFound,
    #[error("Attempted to add a player to a full lobby")]
    LobbyFull,
    #[error("Attempted to join a lobby whose game already started")]
    AlreadyStarted,
    #[error("Player {0:#} is already in this lobby")]
    AlreadyMember(PlayerId),
    #[error("Action attempted by Player {0:#} who is not in this lobby")]
    PlayerInvalid(PlayerId),
    #[error("Non-host attempted a host-only action")]
    NeedsHost,
    #[error("The Lobby Handle is no longer connected to a lobby.")]
    HandleInvalid,
}

pub type LobbyResult<T> = Result<T, LobbyError>;

pub fn start_new_lobby(
    code: OwnedId<LobbyCode>,
    config: Arc<SimConfig>,
    options: LobbyOptions,
    host_id: PlayerId,
    host_outbox: Outbox,
) -> (LobbyHandleProvider, LobbyHandle) {
    let (sender, receiver) = mpsc::channel(LOBBY_INBOX_CAPACITY);
    let handle_provider = LobbyHandleProvider {
        sender: sender.downgrade(),
        code: *code,
    };
    let handle = LobbyHandle {
        sender,
        player_id: host_id,
        code: *code,
    };
    let actor = LobbyActor::new(receiver, code, config, options, host_id, host_outbox);
    tokio::spawn(actor.run());

    (handle_provider, handle)
}
