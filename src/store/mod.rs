mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::model::*;

/// Persistence for the room catalog. Create-only: `save` accepts only an
/// unsaved room, so re-saving an identified room cannot be expressed.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist a new room, assigning its id. Room numbers are unique.
    async fn save(&self, room: NewRoom) -> Result<Room, StoreError>;
    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, StoreError>;
    async fn find_by_room_number(&self, number: u32) -> Result<Option<Room>, StoreError>;
    /// All rooms, ordered by room number.
    async fn find_all(&self) -> Result<Vec<Room>, StoreError>;
}

/// Persistence for bookings. Create-only, like [`RoomStore`].
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn save(&self, booking: NewBooking) -> Result<Booking, StoreError>;
    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    /// All bookings, ordered by check-in date.
    async fn find_all(&self) -> Result<Vec<Booking>, StoreError>;
    /// Bookings for one room, ordered by check-in date.
    async fn find_by_room_id(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    Constraint(String),
    WriterClosed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "storage I/O error: {e}"),
            StoreError::Constraint(e) => write!(f, "constraint violation: {e}"),
            StoreError::WriterClosed => write!(f, "WAL writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
