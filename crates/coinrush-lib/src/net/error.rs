use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid lobby code '{0}'")]
    InvalidLobbyCode(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed message: {0}")]
    Malformed(serde_json::Error),
    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
    #[error("Connection reset by peer")]
    ConnectionReset,
    #[error("WebSocket Error: {0}")]
    WebSocket(tungstenite::Error),
}

impl From<tungstenite::Error> for FrameError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(e)
    }
}
