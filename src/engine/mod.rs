mod conflict;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use conflict::find_conflict;
pub use error::{EngineError, ErrorKind};

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::*;
use crate::store::{BookingStore, RoomStore};

/// Raw booking input as it arrives from a caller. Absent values are
/// reported as invalid arguments instead of being rejected at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingRequest {
    pub room_id: RoomId,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guest_count: i64,
    pub guest_names: Vec<String>,
    pub created_by: Option<String>,
    pub privilege: Option<GuestPrivilege>,
    pub special_requests: Option<String>,
}

/// Room catalog and booking rules over a pair of stores.
///
/// Availability check and booking insert for one room happen under that
/// room's lock, so two overlapping requests can never both succeed.
pub struct Engine {
    pub(super) rooms: Arc<dyn RoomStore>,
    pub(super) bookings: Arc<dyn BookingStore>,
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
    /// Serializes room-number uniqueness checks with room inserts.
    pub(super) catalog: Mutex<()>,
}

impl Engine {
    pub fn new(rooms: Arc<dyn RoomStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self {
            rooms,
            bookings,
            room_locks: DashMap::new(),
            catalog: Mutex::new(()),
        }
    }

    /// Engine over a single store that holds both rooms and bookings.
    pub fn with_store<S>(store: Arc<S>) -> Self
    where
        S: RoomStore + BookingStore + 'static,
    {
        Self::new(store.clone(), store)
    }

    /// Acquire the write lock for one room's booking list.
    pub(super) async fn lock_room(&self, room_id: RoomId) -> OwnedMutexGuard<()> {
        let lock = self
            .room_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
