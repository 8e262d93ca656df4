//! Live state of one room: the shared video, the host's playhead and the roster.

pub mod store;

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::protocol::ServerEvent;
use crate::session::SessionId;

pub use store::{RoomGuard, RoomStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    pub is_host: bool,
}

/// Everything a joiner needs to line up with the room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub timestamp: f64,
    pub is_playing: bool,
    pub video_url: Option<String>,
    pub participants: Vec<Participant>,
    pub host_session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    AllExcept(SessionId),
}

impl Audience {
    pub fn reaches(self, session: SessionId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(sender) => sender != session,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub event: ServerEvent,
}

#[derive(Debug)]
pub struct Room {
    id: String,
    pub video_url: Option<String>,
    pub playhead: f64,
    pub is_playing: bool,
    pub host: Option<SessionId>,
    pub participants: HashMap<SessionId, Participant>,
    /// `None` once the room has been removed from the store.
    feed: Option<broadcast::Sender<Envelope>>,
}

impl Room {
    pub(crate) fn new(id: String, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            id,
            video_url: None,
            playhead: 0.0,
            is_playing: false,
            host: None,
            participants: HashMap::new(),
            feed: Some(tx),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.feed.is_none()
    }

    pub(crate) fn close(&mut self) {
        self.feed = None;
    }

    /// Only the recorded host may move the playhead; a hostless room accepts
    /// any member.
    pub fn can_control(&self, sender: SessionId) -> bool {
        self.host.map_or(true, |host| host == sender)
    }

    pub fn roster(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            timestamp: self.playhead,
            is_playing: self.is_playing,
            video_url: self.video_url.clone(),
            participants: self.roster(),
            host_session_id: self.host,
        }
    }

    pub(crate) fn subscribe(&self) -> Option<broadcast::Receiver<Envelope>> {
        self.feed.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Fans `event` out to the room. Must be called with the room locked so
    /// members see events in processing order.
    pub(crate) fn publish(&self, audience: Audience, event: ServerEvent) {
        if let Some(feed) = &self.feed {
            // No receivers is fine: the room may be down to its sender.
            let _ = feed.send(Envelope { audience, event });
        }
    }
}
