use coinrush_lib::net::{Frame, ServerMessage};
use tokio::sync::mpsc;

/// Frames that may queue up for one session before new ones are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Best-effort queue of outgoing frames for a single session.
///
/// Sending never waits. If the session's writer has gone away or can't keep up, the
/// frame is dropped.
#[derive(Clone, Debug)]
pub struct Outbox {
    sender: mpsc::Sender<Frame>,
}

impl Outbox {
    pub fn new() -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(OUTBOX_CAPACITY);
        (Self { sender }, receiver)
    }

    pub fn send(&self, frame: Frame) {
        if let Err(e) = self.sender.try_send(frame) {
            tracing::trace!("Dropped outgoing frame: {e}");
        }
    }

    pub fn send_message(&self, message: &ServerMessage) {
        match Frame::encode(message) {
            Ok(frame) => self.send(frame),
            Err(e) => tracing::error!("{e}"),
        }
    }

    /// False once the session's writer has stopped.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}
