//! One connected client: an opaque identity plus, once joined, the room it
//! belongs to and its subscription to that room's feed.

use std::fmt;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::protocol::ServerEvent;
use crate::room::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a session's room feed yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    Event(ServerEvent),
    /// The session fell behind the room's buffer and events were lost. The
    /// caller must resync it from a fresh snapshot.
    Lagged,
}

#[derive(Debug)]
struct Membership {
    room_id: String,
    feed: broadcast::Receiver<Envelope>,
}

/// Not `Clone`: `Hub::disconnect` consumes it, so teardown runs once.
#[derive(Debug, Default)]
pub struct Session {
    id: SessionId,
    membership: Option<Membership>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.room_id.as_str())
    }

    pub(crate) fn enter(&mut self, room_id: String, feed: broadcast::Receiver<Envelope>) {
        self.membership = Some(Membership { room_id, feed });
    }

    pub(crate) fn leave(&mut self) -> Option<String> {
        self.membership.take().map(|m| m.room_id)
    }

    /// Next item from the joined room's feed addressed to this session.
    ///
    /// Pends forever while not joined. Returns `None` once the room's feed is
    /// closed (the room ended), after which the session is roomless again.
    pub async fn recv(&mut self) -> Option<Feed> {
        let me = self.id;
        let Some(membership) = self.membership.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            match membership.feed.recv().await {
                Ok(envelope) if envelope.audience.reaches(me) => {
                    return Some(Feed::Event(envelope.event))
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session_id = %me,
                        room_id = %membership.room_id,
                        skipped,
                        "session lagged behind room feed"
                    );
                    return Some(Feed::Lagged);
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::debug!(session_id = %me, "room feed closed");
        self.membership = None;
        None
    }
}
