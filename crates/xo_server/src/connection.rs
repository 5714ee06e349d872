//! Send/close handle linking a participant to its connection worker.

use crate::protocol::{ResultTag, ServerMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Why a non-blocking send did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The worker dropped its outbox.
    Closed,
    /// The outbox is at capacity.
    Full,
}

/// Cloneable handle a match uses to reach one connection.
///
/// Sends never block. Messages go through a bounded channel; the close signal
/// travels separately so it is delivered even when the buffer is full.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    messages: mpsc::Sender<ServerMessage>,
    close: Arc<watch::Sender<Option<ResultTag>>>,
}

impl ConnectionHandle {
    /// Creates a handle and the outbox its connection worker drains.
    pub fn channel(capacity: usize) -> (Self, Outbox) {
        let (messages_tx, messages_rx) = mpsc::channel(capacity.max(1));
        let (close_tx, close_rx) = watch::channel(None);
        (
            Self {
                messages: messages_tx,
                close: Arc::new(close_tx),
            },
            Outbox {
                messages: messages_rx,
                close: close_rx,
                closed: false,
            },
        )
    }

    /// Queues a message without waiting.
    pub fn send(&self, message: ServerMessage) -> Result<(), SendFailure> {
        self.messages.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Asks the worker to close the connection with `tag`.
    ///
    /// Only the first close takes effect.
    pub fn close(&self, tag: ResultTag) -> Result<(), SendFailure> {
        if self.close.is_closed() {
            return Err(SendFailure::Closed);
        }
        self.close.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(tag);
                true
            } else {
                false
            }
        });
        Ok(())
    }
}

/// Item pulled from an [`Outbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Write this message to the socket.
    Message(ServerMessage),
    /// Write a close frame with this tag and stop.
    Close(ResultTag),
}

/// Receiving side owned by the connection worker.
#[derive(Debug)]
pub struct Outbox {
    messages: mpsc::Receiver<ServerMessage>,
    close: watch::Receiver<Option<ResultTag>>,
    closed: bool,
}

impl Outbox {
    /// Takes the next ready item without waiting.
    ///
    /// Queued messages always come out before the close.
    pub fn try_next(&mut self) -> Option<Outgoing> {
        if self.closed {
            return None;
        }
        if let Ok(message) = self.messages.try_recv() {
            return Some(Outgoing::Message(message));
        }
        let tag = *self.close.borrow_and_update();
        tag.map(|tag| {
            self.closed = true;
            Outgoing::Close(tag)
        })
    }

    /// Waits for the next item. `None` once closed or every handle is gone.
    pub async fn next(&mut self) -> Option<Outgoing> {
        loop {
            if let Some(item) = self.try_next() {
                return Some(item);
            }
            if self.closed {
                return None;
            }
            tokio::select! {
                message = self.messages.recv() => match message {
                    Some(message) => return Some(Outgoing::Message(message)),
                    None => return self.try_next(),
                },
                changed = self.close.changed() => {
                    if changed.is_err() {
                        return self.try_next();
                    }
                }
            }
        }
    }

    /// Drains everything currently ready. Handy for tests and shutdown.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
