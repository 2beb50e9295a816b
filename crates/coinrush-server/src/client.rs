use std::net::SocketAddr;

use abort_on_drop::ChildTask;
use anyhow::Context;
use coinrush_lib::lobby::{LobbyCode, LobbyOptions};
use coinrush_lib::net::connection::{self, ConnectionRx, ConnectionTx};
use coinrush_lib::net::{ClientMessage, Frame, FrameError, ServerMessage, LOBBY_UNAVAILABLE};
use coinrush_lib::player::PlayerStateUpdate;
use coinrush_lib::PlayerId;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::instrument;

use crate::lobby::lobby_handle::LobbyHandle;
use crate::outbox::Outbox;
use crate::state::{OwnedId, ServerState};

/// Take a socket for a newly connected client and begin serving it.
pub async fn handle_new_connection(state: ServerState, socket: TcpStream, addr: SocketAddr) {
    let socket = match tokio_tungstenite::accept_async(socket).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(%addr, "WebSocket handshake failed: {e}");
            return;
        }
    };
    Client::new(state, socket).run().await;
}

async fn send_task<S>(mut conn_tx: ConnectionTx<S>, mut outbox_rx: mpsc::Receiver<Frame>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = outbox_rx.recv().await {
        if let Err(e) = conn_tx.write_frame(&frame).await {
            tracing::debug!("Failed to write to client: {e}");
            return;
        }
    }
    let _ = conn_tx.close().await;
}

/// One connected session. A session is in at most one lobby at a time.
struct Client<S> {
    // Declared first so the session leaves its lobby before its id is released
    lobby: Option<LobbyHandle>,
    player_id: OwnedId<PlayerId>,
    state: ServerState,
    conn_rx: ConnectionRx<S>,
    outbox: Outbox,
    _writer: ChildTask<()>,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn new(state: ServerState, socket: WebSocketStream<S>) -> Self {
        let player_id = state.add_player();
        let (conn_tx, conn_rx) = connection::from_socket(socket);
        let (outbox, outbox_rx) = Outbox::new();
        let writer = tokio::spawn(send_task(conn_tx, outbox_rx));

        Self {
            lobby: None,
            player_id,
            state,
            conn_rx,
            outbox,
            _writer: writer.into(),
        }
    }

    /// Takes ownership of self to guarantee that client will be dropped when it's
    /// message loop ends
    #[instrument(skip_all, fields(player_id = %self.player_id))]
    async fn run(mut self) {
        tracing::info!("Player connected");
        self.outbox.send_message(&ServerMessage::Welcome {
            id: *self.player_id,
        });

        loop {
            let incoming = match self.conn_rx.read_frame().await {
                Ok(Some(m)) => m,
                Ok(None) => break,
                Err(FrameError::Malformed(e)) => {
                    tracing::debug!("Dropping malformed message: {e}");
                    continue;
                }
                Err(e) => {
                    tracing::debug!("Error reading message, closing connection: {e}");
                    break;
                }
            };

            tracing::trace!("Received message: {incoming:?}");
            self.process(incoming).await;
        }
        tracing::info!("Player disconnected");
    }

    async fn process(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::CreateLobby { map, difficulty } => {
                self.create_lobby(LobbyOptions { map, difficulty })
            }
            ClientMessage::JoinLobby { code } => self.join_lobby(&code).await,
            ClientMessage::StartGame => self.start_game().await,
            ClientMessage::PlayerState { state } => self.update_player_state(state).await,
        }
    }

    fn create_lobby(&mut self, options: LobbyOptions) {
        // Leave any previous lobby before opening the new one
        self.lobby = None;

        let id = *self.player_id;
        let handle = self.state.open_lobby(id, self.outbox.clone(), options);
        self.outbox.send_message(&ServerMessage::LobbyCreated {
            code: handle.code(),
            host_id: id,
            player_id: id,
        });
        self.lobby = Some(handle);
    }

    async fn join_lobby(&mut self, code: &Value) {
        if let Err(e) = self.try_join_lobby(code).await {
            tracing::debug!("Failed to join lobby {code}: {e:#}");
            self.outbox
                .send_message(&ServerMessage::Error {
                    message: LOBBY_UNAVAILABLE,
                });
        }
    }

    async fn try_join_lobby(&mut self, code: &Value) -> anyhow::Result<()> {
        let code: LobbyCode = code.as_str().context("Lobby code is not a string")?.parse()?;
        let provider = self.state.get_lobby_handle_provider(code)?;
        let handle = provider
            .join_lobby(*self.player_id, self.outbox.clone())
            .await?;
        // Replacing the old handle leaves the previous lobby
        self.lobby = Some(handle);
        Ok(())
    }

    async fn start_game(&mut self) {
        let Some(lobby) = &self.lobby else {
            tracing::debug!("Ignoring start_game outside of a lobby");
            return;
        };
        if let Err(e) = lobby.start_game().await {
            tracing::debug!("Ignoring start_game: {e}");
        }
    }

    async fn update_player_state(&mut self, update: PlayerStateUpdate) {
        let Some(lobby) = &self.lobby else {
            tracing::trace!("Ignoring player_state outside of a lobby");
            return;
        };
        if let Err(e) = lobby.update_player_state(update).await {
            tracing::debug!("Ignoring player_state: {e}");
        }
    }
}
