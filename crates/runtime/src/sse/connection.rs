//! A single SSE connection's bounded outbound queue (spec §4.11).

use tokio::sync::mpsc;

use crate::sse::event::SseFrame;
use crate::types::{ConnectionId, SseError};

/// One subscriber's connection to an agent's event stream.
pub struct Connection {
    pub id: ConnectionId,
    sender: mpsc::Sender<SseFrame>,
}

impl Connection {
    pub fn new(id: ConnectionId, sender: mpsc::Sender<SseFrame>) -> Self {
        Self { id, sender }
    }

    /// Enqueue a frame without blocking. Returns
    /// [`SseError::QueueOverflow`] if the subscriber is not draining its
    /// queue fast enough — the manager is responsible for deciding
    /// whether that means dropping the connection.
    pub fn try_send(&self, frame: SseFrame) -> Result<(), SseError> {
        self.sender.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SseError::QueueOverflow {
                connection_id: self.id.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => SseError::UnknownConnection {
                connection_id: self.id.to_string(),
            },
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
