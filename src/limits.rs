/// Max rooms in the catalog.
pub const MAX_ROOMS: usize = 10_000;

/// Max bookings recorded against a single room.
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;

/// Longest single stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Max bytes in one guest name.
pub const MAX_GUEST_NAME_LEN: usize = 256;

/// Max bytes in the creator tag (booking channel).
pub const MAX_CREATED_BY_LEN: usize = 64;

/// Max bytes in the special-requests text.
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 4096;
