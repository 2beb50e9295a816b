pub use connection::Frame;
pub use error::{FrameError, ProtocolError};
pub use message::{ClientMessage, ServerMessage, LOBBY_UNAVAILABLE};

pub mod connection;
mod error;
mod message;
