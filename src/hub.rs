//! Routes inbound events to room state and fans the results out.
//!
//! `Hub::dispatch` is the single entry point for client events, and every
//! room-scoped handler goes through `Hub::admit`, which checks membership and
//! host authority under the room lock. Rejected events are dropped without a
//! reply.

use std::sync::Arc;

use tracing::{debug, info};

use crate::protocol::{
    ChatLine, ChatSend, ClientEvent, Playhead, PlaybackUpdate, RoomRef, ServerEvent, VideoChange,
    VideoUrl,
};
use crate::room::{Audience, Participant, RoomGuard, RoomStore};
use crate::session::{Session, SessionId};
use crate::utils::mirror::{Mirror, MirrorOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Play,
    Pause,
    Seek,
}

#[derive(Debug, Clone)]
pub struct Hub {
    pub(crate) rooms: Arc<RoomStore>,
    pub(crate) mirror: Mirror,
}

impl Hub {
    pub fn new(rooms: RoomStore, mirror: Mirror) -> Self {
        Self { rooms: Arc::new(rooms), mirror }
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// Handles one client event. The returned event, if any, goes to the
    /// sender only (the join snapshot).
    pub async fn dispatch(&self, session: &mut Session, event: ClientEvent) -> Option<ServerEvent> {
        let sender = session.id();
        match event {
            ClientEvent::JoinRoom(join) => return Some(self.join(session, join).await),
            ClientEvent::VideoPlay(p) => self.playback(sender, Playback::Play, p).await,
            ClientEvent::VideoPause(p) => self.playback(sender, Playback::Pause, p).await,
            ClientEvent::SyncTimestamp(p) => self.playback(sender, Playback::Seek, p).await,
            ClientEvent::ChatMessage(c) => self.chat(sender, c).await,
            ClientEvent::UpdateVideoUrl(v) => self.change_video(sender, v).await,
            ClientEvent::EndRoom(r) => self.end_room(sender, r).await,
        }
        None
    }

    /// Locks `room_id` for `sender` if the sender is a member and, for playback
    /// events, the room's host (or the room has none).
    async fn admit(
        &self,
        sender: SessionId,
        room_id: &str,
        playback: bool,
    ) -> Option<(RoomGuard, Participant)> {
        let Some(room) = self.rooms.lock(room_id).await else {
            debug!(session_id = %sender, room_id, "event for unknown room dropped");
            return None;
        };
        let Some(member) = room.participants.get(&sender).cloned() else {
            debug!(session_id = %sender, room_id, "event from non-member dropped");
            return None;
        };
        if playback && !room.can_control(sender) {
            debug!(session_id = %sender, room_id, "playback from non-host dropped");
            return None;
        }
        Some((room, member))
    }

    async fn playback(&self, sender: SessionId, action: Playback, update: PlaybackUpdate) {
        let Some((mut room, _)) = self.admit(sender, &update.room_id, true).await else {
            return;
        };
        let playhead = Playhead { timestamp: update.timestamp };
        room.playhead = update.timestamp;

        let (is_playing, event) = match action {
            Playback::Play => (Some(true), ServerEvent::VideoPlay(playhead)),
            Playback::Pause => (Some(false), ServerEvent::VideoPause(playhead)),
            Playback::Seek => (None, ServerEvent::SyncTimestamp(playhead)),
        };
        if let Some(playing) = is_playing {
            room.is_playing = playing;
            info!(room_id = %update.room_id, timestamp = update.timestamp, ?action, "playback");
        }
        room.publish(Audience::AllExcept(sender), event);
        drop(room);

        self.mirror.submit(MirrorOp::Playback {
            room_id: update.room_id,
            is_playing,
            timestamp: update.timestamp,
        });
    }

    async fn chat(&self, sender: SessionId, chat: ChatSend) {
        let Some((room, member)) = self.admit(sender, &chat.room_id, false).await else {
            return;
        };
        debug!(room_id = %chat.room_id, user_id = %member.user_id, "chat");
        room.publish(
            Audience::Everyone,
            ServerEvent::ChatMessage(ChatLine {
                user_id: member.user_id,
                display_name: member.display_name,
                message: chat.message,
                sent_at: chrono::Utc::now().to_rfc3339(),
            }),
        );
    }

    // Any member may change the video, not only the host.
    async fn change_video(&self, sender: SessionId, change: VideoChange) {
        let Some((mut room, _)) = self.admit(sender, &change.room_id, false).await else {
            return;
        };
        info!(room_id = %change.room_id, video_url = %change.video_url, "video changed");
        room.video_url = Some(change.video_url.clone());
        room.publish(
            Audience::Everyone,
            ServerEvent::UpdateVideoUrl(VideoUrl { video_url: change.video_url.clone() }),
        );
        drop(room);

        self.mirror.submit(MirrorOp::Video {
            room_id: change.room_id,
            video_url: change.video_url,
        });
    }

    // Any member may end the room, not only the host.
    async fn end_room(&self, sender: SessionId, target: RoomRef) {
        let Some((room, _)) = self.admit(sender, &target.room_id, false).await else {
            return;
        };
        info!(room_id = %target.room_id, session_id = %sender, "room ended by participant");
        self.close_room(room).await;
        self.mirror.submit(MirrorOp::Delete { room_id: target.room_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JoinRoom;
    use crate::room::RoomSnapshot;
    use crate::session::Feed;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn hub() -> (Hub, UnboundedReceiver<MirrorOp>) {
        let (mirror, rx) = Mirror::channel();
        (Hub::new(RoomStore::new(32), mirror), rx)
    }

    async fn join(
        hub: &Hub,
        session: &mut Session,
        room: &str,
        name: &str,
        is_host: bool,
    ) -> RoomSnapshot {
        let event = ClientEvent::JoinRoom(JoinRoom {
            room_id: room.into(),
            user_id: format!("user-{name}"),
            display_name: name.into(),
            is_host,
        });
        match hub.dispatch(session, event).await {
            Some(ServerEvent::RoomState(snapshot)) => snapshot,
            other => panic!("expected room_state, got {other:?}"),
        }
    }

    fn play(room: &str, t: f64) -> ClientEvent {
        ClientEvent::VideoPlay(PlaybackUpdate { room_id: room.into(), timestamp: t })
    }

    fn pause(room: &str, t: f64) -> ClientEvent {
        ClientEvent::VideoPause(PlaybackUpdate { room_id: room.into(), timestamp: t })
    }

    fn seek(room: &str, t: f64) -> ClientEvent {
        ClientEvent::SyncTimestamp(PlaybackUpdate { room_id: room.into(), timestamp: t })
    }

    /// Next event within a short window, `None` if nothing arrives.
    async fn next(session: &mut Session) -> Option<ServerEvent> {
        match tokio::time::timeout(Duration::from_millis(50), session.recv()).await.ok()? {
            Some(Feed::Event(event)) => Some(event),
            Some(Feed::Lagged) => panic!("unexpected lag"),
            None => None,
        }
    }

    async fn drain(session: &mut Session) {
        while next(session).await.is_some() {}
    }

    #[tokio::test]
    async fn non_host_playback_is_silently_dropped() {
        let (hub, mut mirror) = hub();
        let (mut host, mut guest) = (Session::new(), Session::new());
        join(&hub, &mut host, "r", "host", true).await;
        join(&hub, &mut guest, "r", "guest", false).await;
        drain(&mut host).await;

        for event in [play("r", 10.0), pause("r", 11.0), seek("r", 12.0)] {
            assert!(hub.dispatch(&mut guest, event).await.is_none());
        }

        assert!(next(&mut host).await.is_none());
        let room = hub.rooms().lock("r").await.unwrap();
        assert_eq!(room.playhead, 0.0);
        assert!(!room.is_playing);
        assert!(mirror.try_recv().is_err());
    }

    #[tokio::test]
    async fn host_playback_reaches_everyone_but_host() {
        let (hub, mut mirror) = hub();
        let (mut host, mut guest) = (Session::new(), Session::new());
        join(&hub, &mut host, "r", "host", true).await;
        join(&hub, &mut guest, "r", "guest", false).await;
        drain(&mut host).await;

        hub.dispatch(&mut host, play("r", 30.0)).await;
        assert_eq!(
            next(&mut guest).await,
            Some(ServerEvent::VideoPlay(Playhead { timestamp: 30.0 }))
        );
        assert!(next(&mut host).await.is_none());

        hub.dispatch(&mut host, seek("r", 45.0)).await;
        assert_eq!(
            next(&mut guest).await,
            Some(ServerEvent::SyncTimestamp(Playhead { timestamp: 45.0 }))
        );
        {
            let room = hub.rooms().lock("r").await.unwrap();
            assert_eq!(room.playhead, 45.0);
            assert!(room.is_playing, "seek leaves the play flag alone");
        }

        hub.dispatch(&mut host, pause("r", 50.0)).await;
        assert_eq!(
            next(&mut guest).await,
            Some(ServerEvent::VideoPause(Playhead { timestamp: 50.0 }))
        );
        assert!(!hub.rooms().lock("r").await.unwrap().is_playing);

        let ops: Vec<_> = std::iter::from_fn(|| mirror.try_recv().ok()).collect();
        assert_eq!(
            ops,
            vec![
                MirrorOp::Playback { room_id: "r".into(), is_playing: Some(true), timestamp: 30.0 },
                MirrorOp::Playback { room_id: "r".into(), is_playing: None, timestamp: 45.0 },
                MirrorOp::Playback {
                    room_id: "r".into(),
                    is_playing: Some(false),
                    timestamp: 50.0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn hostless_room_accepts_any_member() {
        let (hub, _mirror) = hub();
        let (mut a, mut b) = (Session::new(), Session::new());
        join(&hub, &mut a, "r", "a", false).await;
        join(&hub, &mut b, "r", "b", false).await;
        drain(&mut a).await;

        hub.dispatch(&mut b, play("r", 10.0)).await;
        assert_eq!(
            next(&mut a).await,
            Some(ServerEvent::VideoPlay(Playhead { timestamp: 10.0 }))
        );
        assert!(next(&mut b).await.is_none());

        let room = hub.rooms().lock("r").await.unwrap();
        assert!(room.is_playing);
        assert_eq!(room.playhead, 10.0);
        assert!(room.host.is_none(), "playing does not claim the host seat");
    }

    #[tokio::test]
    async fn outsiders_cannot_touch_a_room() {
        let (hub, _mirror) = hub();
        let (mut member, mut outsider) = (Session::new(), Session::new());
        join(&hub, &mut member, "r", "m", false).await;

        hub.dispatch(&mut outsider, play("r", 99.0)).await;
        hub.dispatch(&mut outsider, ClientEvent::EndRoom(RoomRef { room_id: "r".into() })).await;
        hub.dispatch(&mut outsider, play("elsewhere", 1.0)).await;

        assert!(next(&mut member).await.is_none());
        assert_eq!(hub.rooms().lock("r").await.unwrap().playhead, 0.0);
        assert!(hub.rooms().lock("elsewhere").await.is_none(), "no phantom rooms");
    }

    #[tokio::test]
    async fn chat_echoes_to_sender_with_server_identity() {
        let (hub, _mirror) = hub();
        let (mut a, mut b) = (Session::new(), Session::new());
        join(&hub, &mut a, "r", "ann", false).await;
        join(&hub, &mut b, "r", "bob", false).await;
        drain(&mut a).await;

        let chat = ChatSend { room_id: "r".into(), message: "hi".into() };
        hub.dispatch(&mut a, ClientEvent::ChatMessage(chat)).await;

        for session in [&mut a, &mut b] {
            let Some(ServerEvent::ChatMessage(line)) = next(session).await else {
                panic!("chat not delivered");
            };
            assert_eq!(line.message, "hi");
            assert_eq!(line.display_name, "ann");
            assert_eq!(line.user_id, "user-ann");
            assert!(chrono::DateTime::parse_from_rfc3339(&line.sent_at).is_ok());
        }
    }

    #[tokio::test]
    async fn any_member_may_change_video() {
        let (hub, mut mirror) = hub();
        let (mut host, mut guest) = (Session::new(), Session::new());
        join(&hub, &mut host, "r", "host", true).await;
        join(&hub, &mut guest, "r", "guest", false).await;
        drain(&mut host).await;

        let change = VideoChange { room_id: "r".into(), video_url: "https://v/9".into() };
        hub.dispatch(&mut guest, ClientEvent::UpdateVideoUrl(change)).await;

        let expected = ServerEvent::UpdateVideoUrl(VideoUrl { video_url: "https://v/9".into() });
        assert_eq!(next(&mut host).await, Some(expected.clone()));
        assert_eq!(next(&mut guest).await, Some(expected));
        let room = hub.rooms().lock("r").await.unwrap();
        assert_eq!(room.video_url.as_deref(), Some("https://v/9"));
        drop(room);
        assert_eq!(
            mirror.try_recv().unwrap(),
            MirrorOp::Video { room_id: "r".into(), video_url: "https://v/9".into() }
        );
    }

    #[tokio::test]
    async fn end_room_is_unconditional() {
        let (hub, mut mirror) = hub();
        let mut sessions = [Session::new(), Session::new(), Session::new()];
        join(&hub, &mut sessions[0], "r", "host", true).await;
        join(&hub, &mut sessions[1], "r", "b", false).await;
        join(&hub, &mut sessions[2], "r", "c", false).await;
        for s in sessions.iter_mut() {
            drain(s).await;
        }

        // A non-host ends it.
        hub.dispatch(&mut sessions[2], ClientEvent::EndRoom(RoomRef { room_id: "r".into() })).await;

        for s in sessions.iter_mut() {
            assert_eq!(next(s).await, Some(ServerEvent::RoomEnded {}));
            assert!(next(s).await.is_none());
            assert!(s.room_id().is_none(), "membership cleared when feed closes");
        }
        assert!(hub.rooms().is_empty().await);
        assert_eq!(mirror.try_recv().unwrap(), MirrorOp::Delete { room_id: "r".into() });
    }
}
