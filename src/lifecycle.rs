//! Join, leave, disconnect and teardown transitions.

use tracing::{debug, info};

use crate::hub::Hub;
use crate::protocol::{JoinRoom, RosterDelta, ServerEvent};
use crate::room::{Audience, Participant, RoomGuard, RoomSnapshot};
use crate::session::{Feed, Session};

impl Hub {
    /// Puts `session` into the room, creating it if needed, and returns the
    /// snapshot the joiner syncs from. The snapshot is taken under the same
    /// lock as the insertion, and the session's feed is subscribed before the
    /// lock is released, so nothing published afterwards is missed.
    ///
    /// Re-joining the same room replaces the roster entry. Joining a different
    /// room leaves the current one first.
    pub async fn join(&self, session: &mut Session, join: JoinRoom) -> ServerEvent {
        if session.room_id().is_some_and(|current| current != join.room_id) {
            self.leave(session).await;
        }

        let sender = session.id();
        let mut room = self.rooms.get_or_create(&join.room_id).await;

        if join.is_host && room.host.is_none() {
            info!(room_id = %join.room_id, display_name = %join.display_name, "host claimed");
            room.host = Some(sender);
        }
        let participant = Participant {
            user_id: join.user_id.clone(),
            display_name: join.display_name.clone(),
            is_host: room.host == Some(sender),
        };
        let rejoin = room.participants.insert(sender, participant).is_some();

        // A session whose old room already ended still carries that room's id;
        // anything that is not a true re-join needs a fresh feed.
        if !rejoin {
            if let Some(feed) = room.subscribe() {
                session.enter(join.room_id.clone(), feed);
            }
        }

        let snapshot = room.snapshot();
        room.publish(
            Audience::AllExcept(sender),
            ServerEvent::UserJoined(RosterDelta {
                user_id: join.user_id,
                display_name: join.display_name,
                participants: snapshot.participants.clone(),
            }),
        );
        info!(
            room_id = %join.room_id,
            session_id = %sender,
            rejoin,
            participants = snapshot.participants.len(),
            "joined room"
        );
        ServerEvent::RoomState(snapshot)
    }

    /// Takes `session` out of its room, if any. A departing host leaves the
    /// room hostless; nobody is promoted. The last one out drops the room.
    pub async fn leave(&self, session: &mut Session) {
        let sender = session.id();
        let Some(room_id) = session.leave() else {
            return;
        };
        let Some(mut room) = self.rooms.lock(&room_id).await else {
            // Already ended.
            return;
        };
        let Some(gone) = room.participants.remove(&sender) else {
            return;
        };

        if room.host == Some(sender) {
            room.host = None;
            info!(room_id = %room_id, "host left, room is hostless");
        }

        if room.participants.is_empty() {
            self.rooms.remove(room).await;
            info!(room_id = %room_id, "room cleaned up (empty)");
            return;
        }

        room.publish(
            Audience::AllExcept(sender),
            ServerEvent::UserLeft(RosterDelta {
                user_id: gone.user_id,
                display_name: gone.display_name,
                participants: room.roster(),
            }),
        );
        debug!(room_id = %room_id, session_id = %sender, "left room");
    }

    /// Final teardown for a closed connection. Consumes the session, so it
    /// runs once per connection.
    pub async fn disconnect(&self, mut session: Session) {
        let session_id = session.id();
        self.leave(&mut session).await;
        info!(session_id = %session_id, "session disconnected");
    }

    /// Next event for `session` from its room. A session that fell behind the
    /// room's buffer gets a fresh `room_state` in place of what it lost.
    pub async fn next_event(&self, session: &mut Session) -> Option<ServerEvent> {
        loop {
            match session.recv().await? {
                Feed::Event(event) => return Some(event),
                Feed::Lagged => {
                    if let Some(snapshot) = self.resync(session).await {
                        return Some(ServerEvent::RoomState(snapshot));
                    }
                }
            }
        }
    }

    /// Swaps the session's feed for a fresh subscription and snapshots the
    /// room, both under the room lock, so the stale backlog is discarded and
    /// nothing newer is missed. `None` if the session is no longer in a live
    /// room; its old feed then reports closed on the next receive.
    async fn resync(&self, session: &mut Session) -> Option<RoomSnapshot> {
        let room_id = session.room_id()?.to_owned();
        let room = self.rooms.lock(&room_id).await?;
        if !room.participants.contains_key(&session.id()) {
            return None;
        }
        let feed = room.subscribe()?;
        session.enter(room_id.clone(), feed);
        debug!(room_id = %room_id, session_id = %session.id(), "lagging session resynced");
        Some(room.snapshot())
    }

    /// Ends a room from outside the socket protocol (the REST delete).
    /// Returns whether a live room existed.
    pub async fn end_room_by_id(&self, room_id: &str) -> bool {
        match self.rooms.lock(room_id).await {
            Some(room) => {
                info!(room_id, "room ended via registry delete");
                self.close_room(room).await;
                true
            }
            None => false,
        }
    }

    /// Tells every member the room is over, then drops it regardless of who
    /// is still connected.
    pub(crate) async fn close_room(&self, room: RoomGuard) {
        room.publish(Audience::Everyone, ServerEvent::RoomEnded {});
        self.rooms.remove(room).await;
    }
}
