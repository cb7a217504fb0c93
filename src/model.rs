use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned room identity.
pub type RoomId = i64;

/// Storage-assigned booking identity.
pub type BookingId = i64;

// ── Enumerations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Single,
    Double,
    Suite,
    Deluxe,
}

impl RoomType {
    pub const ALL: [RoomType; 4] = [RoomType::Single, RoomType::Double, RoomType::Suite, RoomType::Deluxe];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Single => "SINGLE",
            RoomType::Double => "DOUBLE",
            RoomType::Suite => "SUITE",
            RoomType::Deluxe => "DELUXE",
        }
    }
}

/// Guest status recorded on a booking. Carries no behavior in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuestPrivilege {
    Standard,
    Loyalty,
    Vip,
}

impl GuestPrivilege {
    pub const ALL: [GuestPrivilege; 3] = [GuestPrivilege::Standard, GuestPrivilege::Loyalty, GuestPrivilege::Vip];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuestPrivilege::Standard => "STANDARD",
            GuestPrivilege::Loyalty => "LOYALTY",
            GuestPrivilege::Vip => "VIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.what, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for RoomType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant { what: "room type", value: s.to_string() })
    }
}

impl FromStr for GuestPrivilege {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GuestPrivilege::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant { what: "guest privilege", value: s.to_string() })
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GuestPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Rooms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenities {
    pub balcony: bool,
    pub beach_view: bool,
    pub air_conditioning: bool,
}

/// A room that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub number: u32,
    pub room_type: RoomType,
    pub max_guests: u32,
    pub amenities: Amenities,
}

impl NewRoom {
    pub fn new(number: u32, room_type: RoomType, max_guests: u32, amenities: Amenities) -> Self {
        Self { number, room_type, max_guests, amenities }
    }

    /// Attach the storage-assigned id. Only stores call this.
    pub fn into_saved(self, id: RoomId) -> Room {
        Room {
            id,
            number: self.number,
            room_type: self.room_type,
            max_guests: self.max_guests,
            amenities: self.amenities,
        }
    }
}

/// A persisted room. The id never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub number: u32,
    pub room_type: RoomType,
    pub max_guests: u32,
    pub amenities: Amenities,
}

// ── Stays ────────────────────────────────────────────────────────

/// Half-open date range `[check_in, check_out)`.
///
/// Checking out on the day another guest checks in is not a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    /// Returns `None` unless `check_in` is strictly before `check_out`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    /// Build a stay without ordering checks. Degenerate and inverted
    /// ranges are representable; `overlaps` stays total over them.
    pub fn unchecked(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }
}

impl fmt::Display for Stay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

// ── Bookings ─────────────────────────────────────────────────────

/// A validated booking awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub stay: Stay,
    pub guest_names: Vec<String>,
    pub created_by: String,
    pub privilege: GuestPrivilege,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn guest_count(&self) -> u32 {
        self.guest_names.len() as u32
    }

    /// Attach the storage-assigned id. Only stores call this.
    pub fn into_saved(self, id: BookingId) -> Booking {
        Booking {
            id,
            room_id: self.room_id,
            stay: self.stay,
            guest_names: self.guest_names,
            created_by: self.created_by,
            privilege: self.privilege,
            special_requests: self.special_requests,
            created_at: self.created_at,
        }
    }
}

/// A persisted, immutable booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub stay: Stay,
    pub guest_names: Vec<String>,
    pub created_by: String,
    pub privilege: GuestPrivilege,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn guest_count(&self) -> u32 {
        self.guest_names.len() as u32
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated(Room),
    BookingCreated(Booking),
}
