//! Process-wide map of live rooms.
//!
//! Each room sits behind its own mutex; every read-modify-write on a room is
//! one critical section. A removed room is closed under its own lock before it
//! leaves the map, so a task that was already waiting on that lock notices the
//! tombstone and retries against the current entry.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::Room;

pub type RoomGuard = OwnedMutexGuard<Room>;

#[derive(Debug)]
pub struct RoomStore {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    channel_capacity: usize,
}

impl RoomStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self { rooms: RwLock::new(HashMap::new()), channel_capacity }
    }

    /// Locks the room, creating it with defaults if it does not exist.
    pub async fn get_or_create(&self, room_id: &str) -> RoomGuard {
        loop {
            let handle = {
                let mut rooms = self.rooms.write().await;
                rooms
                    .entry(room_id.to_owned())
                    .or_insert_with(|| {
                        tracing::debug!(room_id, "room created");
                        Arc::new(Mutex::new(Room::new(room_id.to_owned(), self.channel_capacity)))
                    })
                    .clone()
            };
            let guard = handle.lock_owned().await;
            if !guard.is_closed() {
                return guard;
            }
        }
    }

    /// Locks an existing room.
    pub async fn lock(&self, room_id: &str) -> Option<RoomGuard> {
        loop {
            let handle = self.rooms.read().await.get(room_id).cloned()?;
            let guard = handle.lock_owned().await;
            if !guard.is_closed() {
                return Some(guard);
            }
        }
    }

    /// Tombstones the room and drops it from the map. Members' feeds close once
    /// they have drained what was already published.
    pub async fn remove(&self, mut room: RoomGuard) {
        room.close();
        let mut rooms = self.rooms.write().await;
        let current = rooms
            .get(room.id())
            .is_some_and(|entry| Arc::ptr_eq(entry, OwnedMutexGuard::mutex(&room)));
        if current {
            rooms.remove(room.id());
        }
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
