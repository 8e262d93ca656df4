use tokio::sync::mpsc;

use crate::registry::{RoomPatch, RoomRegistry};

/// A registry write the hub wants done eventually.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOp {
    Playback { room_id: String, is_playing: Option<bool>, timestamp: f64 },
    Video { room_id: String, video_url: String },
    Delete { room_id: String },
}

impl MirrorOp {
    pub fn room_id(&self) -> &str {
        match self {
            MirrorOp::Playback { room_id, .. }
            | MirrorOp::Video { room_id, .. }
            | MirrorOp::Delete { room_id } => room_id,
        }
    }
}

/// Fire-and-forget handle onto the mirror queue. Submitting never blocks and
/// nobody waits on the outcome.
#[derive(Debug, Clone)]
pub struct Mirror {
    tx: mpsc::UnboundedSender<MirrorOp>,
}

impl Mirror {
    /// A mirror whose queue is drained by the caller.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MirrorOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A mirror drained by a background worker writing to `registry`.
    pub fn spawn(registry: RoomRegistry) -> Self {
        let (mirror, rx) = Self::channel();
        tokio::spawn(task(rx, registry));
        mirror
    }

    pub fn submit(&self, op: MirrorOp) {
        if let Err(e) = self.tx.send(op) {
            tracing::warn!(room_id = e.0.room_id(), "registry mirror is gone, dropping write");
        }
    }
}

/// Applies queued writes in order. Failures are logged and dropped.
pub async fn task(mut rx: mpsc::UnboundedReceiver<MirrorOp>, registry: RoomRegistry) {
    while let Some(op) = rx.recv().await {
        match apply(&registry, &op).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(room_id = op.room_id(), "no registry record to mirror into")
            }
            Err(error) => {
                tracing::warn!(room_id = op.room_id(), %error, "registry mirror write failed")
            }
        }
    }
    tracing::debug!("registry mirror stopped");
}

async fn apply(registry: &RoomRegistry, op: &MirrorOp) -> Result<bool, sqlx::Error> {
    match op {
        MirrorOp::Playback { room_id, is_playing, timestamp } => {
            let patch = RoomPatch {
                video_timestamp: Some(*timestamp),
                is_playing: *is_playing,
                ..Default::default()
            };
            Ok(registry.update_room(room_id, &patch).await?.is_some())
        }
        MirrorOp::Video { room_id, video_url } => {
            let patch = RoomPatch { video_url: Some(video_url.clone()), ..Default::default() };
            Ok(registry.update_room(room_id, &patch).await?.is_some())
        }
        MirrorOp::Delete { room_id } => registry.delete_room(room_id).await,
    }
}
