use coinrush_lib::game_state::SimConfig;
use coinrush_lib::lobby::{LobbyCode, LobbyOptions};
use coinrush_lib::PlayerId;
use rand::{thread_rng, Rng};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::lobby::lobby_handle::{LobbyHandle, LobbyHandleProvider};
use crate::lobby::{self, LobbyError, LobbyResult};
use crate::outbox::Outbox;

/// Connection registry and lobby store shared by every task of the server.
#[derive(Clone, Debug, Default)]
pub struct ServerState {
    players: Arc<Mutex<HashSet<PlayerId>>>,
    lobbies: Arc<Mutex<HashMap<LobbyCode, LobbyHandleProvider>>>,
    config: Arc<SimConfig>,
}

impl ServerState {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Register a newly connected session under a fresh id.
    pub fn add_player(&self) -> OwnedId<PlayerId> {
        let mut players = self.players();
        let player_id = loop {
            let id: PlayerId = thread_rng().gen::<u32>().into();
            if !players.contains(&id) {
                break id;
            }
        };
        players.insert(player_id);
        OwnedId::<PlayerId>::new(self.clone(), player_id)
    }

    /// Open a new lobby with the player represented by `host_id` as the only member.
    ///
    /// A fresh code is drawn until it doesn't collide with an open lobby. This will add a
    /// [`LobbyHandleProvider`] to [`ServerState`]'s lobby list and return a concrete
    /// `LobbyHandle` for the host.
    pub fn open_lobby(
        &self,
        host_id: PlayerId,
        host_outbox: Outbox,
        options: LobbyOptions,
    ) -> LobbyHandle {
        let mut lobbies = self.lobbies();
        let code = loop {
            let code = LobbyCode::random(&mut thread_rng());
            if !lobbies.contains_key(&code) {
                break code;
            }
        };

        let (handle_provider, handle) = lobby::start_new_lobby(
            OwnedId::<LobbyCode>::new(self.clone(), code),
            self.config.clone(),
            options,
            host_id,
            host_outbox,
        );
        tracing::info!("Lobby {code} opened by {host_id}");
        lobbies.insert(code, handle_provider);
        handle
    }

    /// Get a [`LobbyHandleProvider`] instance for the specified `code`
    ///
    /// # Errors
    ///
    /// Will return a [`LobbyError::NotFound`] if the given code does not correspond
    /// to an open lobby.
    pub fn get_lobby_handle_provider(&self, code: LobbyCode) -> LobbyResult<LobbyHandleProvider> {
        self.lobbies()
            .get(&code)
            .cloned()
            .ok_or(LobbyError::NotFound)
    }

    /// Snapshot of every open lobby. Lobbies opened or closed afterwards aren't reflected.
    pub fn lobby_handle_providers(&self) -> Vec<LobbyHandleProvider> {
        self.lobbies().values().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players().len()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies().len()
    }

    // A panic elsewhere must not take the whole server down with a poisoned lock.
    fn players(&self) -> MutexGuard<HashSet<PlayerId>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lobbies(&self) -> MutexGuard<HashMap<LobbyCode, LobbyHandleProvider>> {
        self.lobbies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wrapper around Id types that is handed out when an Id is stored in the state
/// and when dropped will remove that id from the state.
#[derive(Debug)]
pub struct OwnedId<Id: Copy> {
    state: ServerState,
    id: Id,
    cleanup: fn(ServerState, Id),
}

impl<Id: Display + Copy> Display for OwnedId<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.id.fmt(f)
    }
}

/// Workaround for testing LobbyActor
#[cfg(test)]
impl From<LobbyCode> for OwnedId<LobbyCode> {
    fn from(v: LobbyCode) -> Self {
        Self {
            state: ServerState::default(),
            id: v,
            cleanup: |_, _| {},
        }
    }
}

impl OwnedId<PlayerId> {
    fn new(state: ServerState, id: PlayerId) -> Self {
        Self {
            state,
            id,
            cleanup: |state, id| {
                state.players().remove(&id);
            },
        }
    }
}

impl OwnedId<LobbyCode> {
    fn new(state: ServerState, id: LobbyCode) -> Self {
        Self {
            state,
            id,
            cleanup: |state, id| {
                tracing::info!("Lobby {id} closed");
                state.lobbies().remove(&id);
            },
        }
    }
}

impl<Id: Copy> Deref for OwnedId<Id> {
    type Target = Id;

    fn deref(&self) -> &Self::Target {
        &self.id
    }
}

impl<Id: Copy> Drop for OwnedId<Id> {
    fn drop(&mut self) {
        (self.cleanup)(self.state.clone(), self.id);
    }
}
