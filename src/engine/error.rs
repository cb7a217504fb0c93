use crate::model::{RoomId, Stay};
use crate::store::StoreError;

/// Coarse classification callers translate into user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input, or a reference to data that does not exist.
    InvalidArgument,
    /// Well-formed request that collides with existing data.
    Conflict,
    /// The store could not complete a read or write.
    Storage,
}

#[derive(Debug)]
pub enum EngineError {
    InvalidArgument(String),
    RoomNotFound(RoomId),
    CapacityExceeded { guests: u32, max_guests: u32 },
    LimitExceeded(&'static str),
    NotAvailable { room_number: u32, stay: Stay },
    DuplicateRoomNumber(u32),
    Storage(StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidArgument(_)
            | EngineError::RoomNotFound(_)
            | EngineError::CapacityExceeded { .. }
            | EngineError::LimitExceeded(_) => ErrorKind::InvalidArgument,
            EngineError::NotAvailable { .. } | EngineError::DuplicateRoomNumber(_) => {
                ErrorKind::Conflict
            }
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::RoomNotFound(id) => write!(f, "room with id {id} does not exist"),
            EngineError::CapacityExceeded { guests, max_guests } => {
                write!(f, "guest count {guests} exceeds room capacity {max_guests}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::NotAvailable { room_number, stay } => write!(
                f,
                "room {room_number} is not available between {} and {}",
                stay.check_in, stay.check_out
            ),
            EngineError::DuplicateRoomNumber(n) => write!(f, "room number {n} already exists"),
            EngineError::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e)
    }
}
