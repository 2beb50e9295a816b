use std::sync::Arc;
use std::time::Instant;

use coinrush_lib::game_state::{GameState, SimConfig};
use coinrush_lib::lobby::{LobbyCode, LobbyOptions};
use coinrush_lib::net::{Frame, ServerMessage};
use coinrush_lib::player::{PlayerState, PlayerStateUpdate};
use coinrush_lib::{PlayerId, MAX_PLAYERS};
use rand::thread_rng;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::outbox::Outbox;
use crate::state::OwnedId;

use super::{LobbyError, LobbyResult};

/// A session that is a member of this lobby.
#[derive(Debug)]
struct Member {
    id: PlayerId,
    outbox: Outbox,
}

pub struct LobbyActor {
    receiver: mpsc::Receiver<LobbyAction>,
    code: OwnedId<LobbyCode>,
    config: Arc<SimConfig>,
    options: LobbyOptions,
    host_id: PlayerId,
    /// In join order
    members: Vec<Member>,
    game: GameState,
    started: bool,
}

#[derive(Debug)]
pub enum LobbyAction {
    AddPlayer {
        respond_to: oneshot::Sender<LobbyResult<()>>,
        id: PlayerId,
        outbox: Outbox,
    },
    RemovePlayer {
        id: PlayerId,
    },
    StartGame {
        respond_to: oneshot::Sender<LobbyResult<()>>,
        id: PlayerId,
    },
    UpdatePlayerState {
        id: PlayerId,
        update: PlayerStateUpdate,
    },
    Tick {
        now: Instant,
    },
}

impl LobbyActor {
    pub fn new(
        receiver: mpsc::Receiver<LobbyAction>,
        code: OwnedId<LobbyCode>,
        config: Arc<SimConfig>,
        options: LobbyOptions,
        host_id: PlayerId,
        host_outbox: Outbox,
    ) -> Self {
        let mut game = GameState::new(&config, &mut thread_rng());
        game.players.insert(host_id, PlayerState::default());

        Self {
            receiver,
            code,
            config,
            options,
            host_id,
            members: vec![Member {
                id: host_id,
                outbox: host_outbox,
            }],
            game,
            started: false,
        }
    }

    #[instrument(skip_all, fields(lobby = %self.code))]
    pub async fn run(mut self) {
        tracing::info!("Lobby opened");
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                LobbyAction::AddPlayer {
                    respond_to,
                    id,
                    outbox,
                } => {
                    let _ = respond_to.send(self.add_player(id, outbox));
                }
                LobbyAction::RemovePlayer { id } => self.rem_player(id),
                LobbyAction::StartGame { respond_to, id } => {
                    let _ = respond_to.send(self.start_game(id));
                }
                LobbyAction::UpdatePlayerState { id, update } => {
                    if let Err(e) = self.update_player_state(id, update) {
                        tracing::debug!("Ignoring player state: {e}");
                    }
                }
                LobbyAction::Tick { now } => self.tick(now),
            }
        }
        // Dropping `self.code` removes this lobby from the server
    }

    /// Encode `message` once and queue it for every member whose connection is still open.
    fn broadcast(&self, message: &ServerMessage) {
        let frame = match Frame::encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("{e}");
                return;
            }
        };
        for member in self.members.iter().filter(|m| m.outbox.is_open()) {
            member.outbox.send(frame.clone());
        }
    }

    fn is_member(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|m| m.id == player_id)
    }
}

// ----------------------------------------------------------------------------
// Message Handlers
// ----------------------------------------------------------------------------
impl LobbyActor {
    /// Adds a new player to this lobby, replies to them with the lobby's details and
    /// tells every member (the new one included) how many players are now in the lobby.
    ///
    /// # Errors
    ///
    /// This function will return an error if the lobby is full, already started, closing,
    /// or if the player is already a member.
    #[instrument(skip(self, outbox))]
    fn add_player(&mut self, player_id: PlayerId, outbox: Outbox) -> LobbyResult<()> {
        // The last member left and this lobby is on its way out
        if self.members.is_empty() {
            return Err(LobbyError::NotFound);
        }
        if self.members.len() >= MAX_PLAYERS {
            return Err(LobbyError::LobbyFull);
        }
        if self.started {
            return Err(LobbyError::AlreadyStarted);
        }
        if self.is_member(player_id) {
            return Err(LobbyError::AlreadyMember(player_id));
        }

        outbox.send_message(&ServerMessage::LobbyJoined {
            code: *self.code,
            host_id: self.host_id,
            player_id,
        });
        self.members.push(Member {
            id: player_id,
            outbox,
        });
        self.game.players.insert(player_id, PlayerState::default());
        tracing::info!("Player joined lobby");

        self.broadcast(&ServerMessage::PlayerJoined {
            count: self.members.len(),
        });
        Ok(())
    }

    /// Removes a player from the lobby. The lobby is closed once nobody is left, otherwise
    /// the remaining members are told who left.
    #[instrument(skip(self))]
    fn rem_player(&mut self, player_id: PlayerId) {
        let Some(idx) = self.members.iter().position(|m| m.id == player_id) else {
            tracing::debug!("Attempted to remove player from lobby who isn't in it");
            return;
        };
        self.members.remove(idx);
        self.game.players.remove(player_id);
        tracing::info!("Player left lobby");

        // Close the lobby after the last player leaves by closing our receiver.
        // This will cause the run loop to consume all remaining messages,
        // and then exit
        if self.members.is_empty() {
            self.receiver.close();
            return;
        }

        self.broadcast(&ServerMessage::PlayerLeft { player_id });
    }

    /// Starts the game, spawning the first batch of enemies and sending everyone the
    /// initial world.
    ///
    /// # Errors
    ///
    /// Fails when `player_id` isn't the host or the game is already running.
    #[instrument(skip(self))]
    fn start_game(&mut self, player_id: PlayerId) -> LobbyResult<()> {
        if self.host_id != player_id || !self.is_member(player_id) {
            return Err(LobbyError::NeedsHost);
        }
        if self.started {
            return Err(LobbyError::AlreadyStarted);
        }

        self.started = true;
        self.game.enemies.clear();
        self.game
            .spawn_enemies(&self.options.difficulty, &self.config.arena, &mut thread_rng());

        self.broadcast(&ServerMessage::StartGame {
            map: &self.options.map,
            difficulty: &self.options.difficulty,
            players: &self.game.players,
            coins: &self.game.coins,
            enemies: &self.game.enemies,
        });
        tracing::info!("Started game with {} enemies", self.game.enemies.len());
        Ok(())
    }

    /// Merges a partial update into the player's state, then checks every player
    /// against every coin.
    #[instrument(skip(self, update))]
    fn update_player_state(
        &mut self,
        player_id: PlayerId,
        update: PlayerStateUpdate,
    ) -> LobbyResult<()> {
        let player = self
            .game
            .players
            .get_mut(player_id)
            .ok_or(LobbyError::PlayerInvalid(player_id))?;
        player.merge(update);

        if self
            .game
            .collect_coins(&self.options.difficulty, &self.config, &mut thread_rng())
        {
            tracing::debug!(
                "Coins collected, {} enemies now chasing",
                self.game.enemies.len()
            );
        }
        Ok(())
    }

    /// Advances every enemy and sends the resulting world to all members.
    /// Lobbies that haven't started yet are left alone.
    fn tick(&mut self, now: Instant) {
        if !self.started {
            return;
        }

        self.game.step_enemies(now, &self.config);
        self.broadcast(&ServerMessage::UpdateState {
            players: &self.game.players,
            coins: &self.game.coins,
            enemies: &self.game.enemies,
        });
    }
}
