//! Live rooms indexed by code.

use std::sync::Arc;

use dashmap::{
    DashMap,
    mapref::entry::{Entry, VacantEntry},
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{
    geometry::Geometry,
    room::{Room, SharedRoom},
    room_code::RoomCode,
};

#[derive(Clone)]
struct RegisteredRoom {
    instance: Uuid,
    room: SharedRoom,
}

/// Concurrent map from room code to room.
///
/// Creation and lookup never hold a room lock. Removal is keyed on the room
/// instance so a stale close cannot evict a newer room reusing the same code.
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, RegisteredRoom>,
    geometry: Geometry,
}

impl RoomRegistry {
    /// Empty registry whose rooms all play on `geometry`.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            rooms: DashMap::new(),
            geometry,
        }
    }

    /// Register an empty free-play room under a fresh random code.
    pub fn create_room(&self) -> (RoomCode, SharedRoom) {
        loop {
            let code = RoomCode::random();
            if let Entry::Vacant(entry) = self.rooms.entry(code.clone()) {
                let room = self.register(entry, code.clone());
                info!(room = %code, "room created");
                return (code, room);
            }
            debug!(room = %code, "room code collision; drawing another");
        }
    }

    /// Look up a live room.
    pub fn get_room(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.get(code).map(|entry| entry.room.clone())
    }

    /// Look up a room, registering an empty one under `code` if absent.
    pub fn get_or_create(&self, code: RoomCode) -> SharedRoom {
        match self.rooms.entry(code.clone()) {
            Entry::Occupied(entry) => entry.get().room.clone(),
            Entry::Vacant(entry) => {
                let room = self.register(entry, code.clone());
                info!(room = %code, "room created on first join");
                room
            }
        }
    }

    /// Retire `room` and drop its registry entry.
    ///
    /// Must be called with the room lock held. Returns `false` when the entry
    /// was already gone or belongs to a newer room with the same code.
    pub fn remove_room(&self, room: &mut Room) -> bool {
        room.retire();
        let instance = room.instance();
        let removed = self
            .rooms
            .remove_if(room.code().as_str(), |_, entry| entry.instance == instance)
            .is_some();
        if removed {
            info!(room = %room.code(), "room removed");
        }
        removed
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    fn register(
        &self,
        entry: VacantEntry<'_, RoomCode, RegisteredRoom>,
        code: RoomCode,
    ) -> SharedRoom {
        let room = Room::new(code, &self.geometry);
        let registered = RegisteredRoom {
            instance: room.instance(),
            room: Arc::new(Mutex::new(room)),
        };
        let shared = registered.room.clone();
        entry.insert(registered);
        shared
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(Geometry::default())
    }
}
