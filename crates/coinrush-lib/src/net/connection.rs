use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, error::ProtocolError as WsProtocolError, Message};
use tokio_tungstenite::WebSocketStream;

use super::{ClientMessage, FrameError, ServerMessage};

/// An encoded [`ServerMessage`], cheap to clone when fanning out to many sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    pub fn encode(message: &ServerMessage) -> Result<Self, FrameError> {
        let text = serde_json::to_string(message).map_err(FrameError::Encode)?;
        Ok(Self(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn from_socket<S>(socket: WebSocketStream<S>) -> (ConnectionTx<S>, ConnectionRx<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = socket.split();
    (ConnectionTx { sink }, ConnectionRx { stream })
}

pub struct ConnectionTx<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

pub struct ConnectionRx<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> ConnectionTx<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        self.sink.send(Message::Text(frame.as_str().to_owned())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), FrameError> {
        self.sink.close().await?;
        Ok(())
    }
}

impl<S> ConnectionRx<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the next message from the client.
    ///
    /// Returns `Ok(None)` once the client has closed the connection. A frame that
    /// isn't a valid [`ClientMessage`] yields [`FrameError::Malformed`] and leaves the
    /// connection usable.
    pub async fn read_frame(&mut self) -> Result<Option<ClientMessage>, FrameError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(m)) => m,
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ))
                | None => return Ok(None),
                Some(Err(tungstenite::Error::Protocol(
                    WsProtocolError::ResetWithoutClosingHandshake,
                ))) => return Err(FrameError::ConnectionReset),
                Some(Err(e)) => return Err(e.into()),
            };

            return match message {
                Message::Text(text) => serde_json::from_str(&text)
                    .map(Some)
                    .map_err(FrameError::Malformed),
                Message::Binary(bytes) => serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(FrameError::Malformed),
                Message::Close(_) => Ok(None),
                // Pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
        }
    }
}
