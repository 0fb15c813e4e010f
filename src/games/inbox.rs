use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::{Instant, timeout_at};
use tracing::warn;

use crate::model::ChatMessage;

/// A game's view of the chat: every message posted after the game subscribed.
pub struct Inbox {
    rx: broadcast::Receiver<ChatMessage>,
}

impl Inbox {
    pub fn new(rx: broadcast::Receiver<ChatMessage>) -> Self {
        Self { rx }
    }

    /// First message accepted by `accept` before `deadline`, `None` once the
    /// deadline passes or the chat closes.
    pub async fn next_matching(
        &mut self,
        deadline: Instant,
        mut accept: impl FnMut(&ChatMessage) -> bool,
    ) -> Option<ChatMessage> {
        loop {
            match timeout_at(deadline, self.rx.recv()).await {
                Err(_elapsed) => return None,
                Ok(Ok(msg)) => {
                    if accept(&msg) {
                        return Some(msg);
                    }
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "game inbox lagged, messages dropped");
                }
                Ok(Err(RecvError::Closed)) => return None,
            }
        }
    }

    /// Discard everything already queued.
    pub fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return,
            }
        }
    }
}
