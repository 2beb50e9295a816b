use std::time::Instant;

use coinrush_lib::lobby::LobbyCode;
use coinrush_lib::player::PlayerStateUpdate;
use coinrush_lib::PlayerId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::outbox::Outbox;

use super::LobbyError;
use super::{lobby_actor::LobbyAction, LobbyResult};

/// Held by the server's lobby store. Doesn't keep the lobby alive on its own.
#[derive(Clone, Debug)]
pub struct LobbyHandleProvider {
    pub(super) sender: mpsc::WeakSender<LobbyAction>,
    pub(super) code: LobbyCode,
}

impl LobbyHandleProvider {
    pub fn code(&self) -> LobbyCode {
        self.code
    }

    /// Adds a new player to this lobby and returns their handle to it.
    ///
    /// No handle is created unless the lobby accepted the player, so a failed join
    /// never removes anyone from the lobby.
    pub async fn join_lobby(
        &self,
        player_id: PlayerId,
        outbox: Outbox,
    ) -> LobbyResult<LobbyHandle> {
        let sender = self.sender.upgrade().ok_or(LobbyError::HandleInvalid)?;
        let (tx, rx) = oneshot::channel();
        let msg = LobbyAction::AddPlayer {
            respond_to: tx,
            id: player_id,
            outbox,
        };
        // If this fails, rx.await will fail as well
        let _ = sender.send(msg).await;
        rx.await.unwrap_or(Err(LobbyError::HandleInvalid))?;

        Ok(LobbyHandle {
            sender,
            player_id,
            code: self.code,
        })
    }

    /// Queue a simulation tick without waiting. Returns false if the tick was dropped,
    /// either because the lobby is backed up or because it is gone.
    pub fn tick(&self, now: Instant) -> bool {
        let Some(sender) = self.sender.upgrade() else {
            return false;
        };
        sender.try_send(LobbyAction::Tick { now }).is_ok()
    }
}

/// A member's connection to their lobby. The member is removed when this is dropped.
#[derive(Debug)]
pub struct LobbyHandle {
    pub(super) sender: mpsc::Sender<LobbyAction>,
    pub(super) player_id: PlayerId,
    pub(super) code: LobbyCode,
}

impl LobbyHandle {
    pub fn code(&self) -> LobbyCode {
        self.code
    }

    async fn execute<T>(
        &self,
        msg: LobbyAction,
        rx: oneshot::Receiver<Result<T, LobbyError>>,
    ) -> Result<T, LobbyError> {
        // Ignore first error, if there is an error, rx.await will fail as well since it's sender
        // will have been dropped
        let _ = self.sender.send(msg).await;
        rx.await.unwrap_or(Err(LobbyError::HandleInvalid))
    }

    pub async fn start_game(&self) -> Result<(), LobbyError> {
        let (tx, rx) = oneshot::channel();
        let msg = LobbyAction::StartGame {
            respond_to: tx,
            id: self.player_id,
        };
        self.execute(msg, rx).await
    }

    /// Player state updates are fire and forget, nobody is told about a rejected one.
    pub async fn update_player_state(&self, update: PlayerStateUpdate) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyAction::UpdatePlayerState {
                id: self.player_id,
                update,
            })
            .await
            .map_err(|_| LobbyError::HandleInvalid)
    }
}

impl Drop for LobbyHandle {
    fn drop(&mut self) {
        let id = self.player_id;
        match self.sender.try_send(LobbyAction::RemovePlayer { id }) {
            Ok(()) | Err(TrySendError::Closed(_)) => (),
            Err(TrySendError::Full(msg)) => {
                let tx = self.sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = tx.send(msg).await {
                        tracing::warn!(%e, "Failed to remove player from their lobby.");
                    }
                });
            }
        }
    }
}
