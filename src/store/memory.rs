use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::*;

use super::{BookingStore, RoomStore, StoreError};

/// Map-backed store. Ids start at 1 and are never reused.
pub struct InMemoryStore {
    rooms: DashMap<RoomId, Room>,
    /// Unique index: room number → room id.
    room_numbers: DashMap<u32, RoomId>,
    /// Per-room bookings, sorted by `stay.check_in`.
    bookings: DashMap<RoomId, Vec<Booking>>,
    /// Reverse lookup: booking id → room id
    booking_to_room: DashMap<BookingId, RoomId>,
    next_room_id: AtomicI64,
    next_booking_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            bookings: DashMap::new(),
            booking_to_room: DashMap::new(),
            next_room_id: AtomicI64::new(1),
            next_booking_id: AtomicI64::new(1),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_room.len()
    }

    pub(super) fn allocate_room_id(&self) -> RoomId {
        self.next_room_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(super) fn allocate_booking_id(&self) -> BookingId {
        self.next_booking_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(super) fn room_number_taken(&self, number: u32) -> bool {
        self.room_numbers.contains_key(&number)
    }

    /// Apply an already-identified record. Used for WAL replay and for
    /// publishing records after they are durable. Id sequences move past
    /// every applied id.
    pub fn apply_event(&self, event: &Event) -> Result<(), StoreError> {
        match event {
            Event::RoomCreated(room) => {
                match self.room_numbers.entry(room.number) {
                    Entry::Occupied(_) => {
                        return Err(duplicate_room_number(room.number));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(room.id);
                    }
                }
                self.rooms.insert(room.id, room.clone());
                self.next_room_id.fetch_max(room.id + 1, Ordering::SeqCst);
            }
            Event::BookingCreated(booking) => {
                self.insert_booking(booking.clone());
                self.next_booking_id.fetch_max(booking.id + 1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Insert booking maintaining per-room sort order by check-in.
    fn insert_booking(&self, booking: Booking) {
        self.booking_to_room.insert(booking.id, booking.room_id);
        let mut list = self.bookings.entry(booking.room_id).or_default();
        let pos = list.partition_point(|b| b.stay.check_in <= booking.stay.check_in);
        list.insert(pos, booking);
    }
}

fn duplicate_room_number(number: u32) -> StoreError {
    StoreError::Constraint(format!("room number {number} already exists"))
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn save(&self, room: NewRoom) -> Result<Room, StoreError> {
        let saved = match self.room_numbers.entry(room.number) {
            Entry::Occupied(_) => return Err(duplicate_room_number(room.number)),
            Entry::Vacant(slot) => {
                let saved = room.into_saved(self.allocate_room_id());
                slot.insert(saved.id);
                saved
            }
        };
        self.rooms.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.get(&id).map(|e| e.value().clone()))
    }

    async fn find_by_room_number(&self, number: u32) -> Result<Option<Room>, StoreError> {
        let Some(id) = self.room_numbers.get(&number).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.rooms.get(&id).map(|e| e.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by_key(|r| r.number);
        Ok(rooms)
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn save(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let saved = booking.into_saved(self.allocate_booking_id());
        self.insert_booking(saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let Some(room_id) = self.booking_to_room.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self
            .bookings
            .get(&room_id)
            .and_then(|list| list.iter().find(|b| b.id == id).cloned()))
    }

    async fn find_all(&self) -> Result<Vec<Booking>, StoreError> {
        let mut all: Vec<Booking> = self
            .bookings
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        all.sort_by_key(|b| (b.stay.check_in, b.id));
        Ok(all)
    }

    async fn find_by_room_id(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .get(&room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}
