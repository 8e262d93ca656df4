//! Wire format for the `/ws` channel.
//!
//! Every frame is a JSON text frame `{"event": "<name>", "data": {...}}` with
//! camelCase payload fields. Inbound and outbound events are closed enums so the
//! hub dispatches through a single `match`.

use serde::{Deserialize, Serialize};

use crate::room::{Participant, RoomSnapshot};

/// Receivers re-seek only when their local position is further than this from
/// an authoritative timestamp. The server never enforces it.
pub const DRIFT_TOLERANCE_SECS: f64 = 2.0;

/// Receiver-side drift rule.
pub fn needs_resync(local: f64, authoritative: f64) -> bool {
    (local - authoritative).abs() > DRIFT_TOLERANCE_SECS
}

/* ------------ client → server ------------ */

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    VideoPlay(PlaybackUpdate),
    VideoPause(PlaybackUpdate),
    SyncTimestamp(PlaybackUpdate),
    ChatMessage(ChatSend),
    UpdateVideoUrl(VideoChange),
    EndRoom(RoomRef),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: String,
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Intent only; granted when the room has no host yet.
    #[serde(default)]
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    pub room_id: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSend {
    pub room_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoChange {
    pub room_id: String,
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: String,
}

impl ClientEvent {
    /// Decodes one text frame. Anything malformed, unknown or carrying an
    /// impossible playhead yields `None`; callers drop it silently.
    pub fn parse(raw: &str) -> Option<Self> {
        let event: Self = serde_json::from_str(raw).ok()?;
        if event.room_id().is_empty() {
            return None;
        }
        match &event {
            Self::VideoPlay(p) | Self::VideoPause(p) | Self::SyncTimestamp(p)
                if !(p.timestamp.is_finite() && p.timestamp >= 0.0) =>
            {
                None
            }
            _ => Some(event),
        }
    }

    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom(j) => &j.room_id,
            Self::VideoPlay(p) | Self::VideoPause(p) | Self::SyncTimestamp(p) => &p.room_id,
            Self::ChatMessage(c) => &c.room_id,
            Self::UpdateVideoUrl(v) => &v.room_id,
            Self::EndRoom(r) => &r.room_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join_room",
            Self::VideoPlay(_) => "video_play",
            Self::VideoPause(_) => "video_pause",
            Self::SyncTimestamp(_) => "sync_timestamp",
            Self::ChatMessage(_) => "chat_message",
            Self::UpdateVideoUrl(_) => "update_video_url",
            Self::EndRoom(_) => "end_room",
        }
    }
}

/* ------------ server → client ------------ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Join reply, delivered to the joiner only.
    RoomState(RoomSnapshot),
    UserJoined(RosterDelta),
    UserLeft(RosterDelta),
    VideoPlay(Playhead),
    VideoPause(Playhead),
    SyncTimestamp(Playhead),
    ChatMessage(ChatLine),
    UpdateVideoUrl(VideoUrl),
    RoomEnded {},
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterDelta {
    pub user_id: String,
    pub display_name: String,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Playhead {
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub user_id: String,
    pub display_name: String,
    pub message: String,
    /// RFC 3339, stamped by the server on receipt.
    pub sent_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUrl {
    pub video_url: String,
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        // Plain data with string keys: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
