use chrono::NaiveDate;

use crate::model::*;

use super::conflict::{find_conflict, validate_stay};
use super::{Engine, EngineError};

impl Engine {
    /// True when no existing booking of `room_id` overlaps the stay.
    /// Unknown rooms have no bookings and so are reported available.
    pub async fn is_room_available(
        &self,
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    ) -> Result<bool, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let existing = self.bookings.find_by_room_id(room_id).await?;
        Ok(find_conflict(&existing, &stay).is_none())
    }

    pub async fn get_room(&self, id: RoomId) -> Result<Option<Room>, EngineError> {
        Ok(self.rooms.find_by_id(id).await?)
    }

    pub async fn find_room_by_number(&self, number: u32) -> Result<Option<Room>, EngineError> {
        Ok(self.rooms.find_by_room_number(number).await?)
    }

    /// All rooms, ordered by room number.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, EngineError> {
        Ok(self.rooms.find_all().await?)
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, EngineError> {
        Ok(self.bookings.find_by_id(id).await?)
    }

    /// All bookings, ordered by check-in.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.bookings.find_all().await?)
    }

    pub async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, EngineError> {
        Ok(self.bookings.find_by_room_id(room_id).await?)
    }
}
