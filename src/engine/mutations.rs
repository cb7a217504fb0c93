use chrono::Utc;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_request};
use super::{BookingRequest, Engine, EngineError};

impl Engine {
    pub async fn create_room(&self, room: NewRoom) -> Result<Room, EngineError> {
        if room.number == 0 {
            return Err(EngineError::InvalidArgument("room number must be positive".into()));
        }
        if room.max_guests == 0 {
            return Err(EngineError::InvalidArgument("max guests must be positive".into()));
        }

        let _catalog = self.catalog.lock().await;
        if self.rooms.find_by_room_number(room.number).await?.is_some() {
            return Err(EngineError::DuplicateRoomNumber(room.number));
        }
        if self.rooms.find_all().await?.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        Ok(self.rooms.save(room).await?)
    }

    /// Validate and store a booking. Checks run in a fixed order and the
    /// first failure is returned; nothing is written unless all pass.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, EngineError> {
        let req = validate_request(request)?;

        let room = self
            .rooms
            .find_by_id(req.room_id)
            .await?
            .ok_or(EngineError::RoomNotFound(req.room_id))?;
        if req.guest_count > room.max_guests {
            return Err(EngineError::CapacityExceeded {
                guests: req.guest_count,
                max_guests: room.max_guests,
            });
        }

        let _guard = self.lock_room(room.id).await;
        let existing = self.bookings.find_by_room_id(room.id).await?;
        check_no_conflict(&room, &existing, &req.stay)?;
        if existing.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings for room"));
        }

        let booking = NewBooking {
            room_id: room.id,
            stay: req.stay,
            guest_names: req.guest_names,
            created_by: req.created_by,
            privilege: req.privilege,
            special_requests: req.special_requests,
            created_at: Utc::now(),
        };
        Ok(self.bookings.save(booking).await?)
    }
}
