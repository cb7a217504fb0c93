use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::{BookingRequest, EngineError};

/// Party details that passed input validation, before any store access.
#[derive(Debug)]
pub(crate) struct ValidRequest {
    pub room_id: RoomId,
    pub stay: Stay,
    pub guest_count: u32,
    pub guest_names: Vec<String>,
    pub created_by: String,
    pub privilege: GuestPrivilege,
    pub special_requests: Option<String>,
}

pub(crate) fn validate_stay(
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
) -> Result<Stay, EngineError> {
    let (Some(check_in), Some(check_out)) = (check_in, check_out) else {
        return Err(EngineError::InvalidArgument(
            "check-in and check-out must not be null".into(),
        ));
    };
    Stay::new(check_in, check_out).ok_or_else(|| {
        EngineError::InvalidArgument(format!(
            "check-in ({check_in}) must be before check-out ({check_out})"
        ))
    })
}

/// Shape checks on a booking request, in order; the first failure wins.
pub(crate) fn validate_request(req: BookingRequest) -> Result<ValidRequest, EngineError> {
    let stay = validate_stay(req.check_in, req.check_out)?;

    if req.guest_count <= 0 {
        return Err(EngineError::InvalidArgument("guest count must be positive".into()));
    }
    if req.guest_names.is_empty() {
        return Err(EngineError::InvalidArgument("guest names must not be empty".into()));
    }
    if req.guest_names.len() as i64 != req.guest_count {
        return Err(EngineError::InvalidArgument(format!(
            "guest count ({}) does not match number of guest names ({})",
            req.guest_count,
            req.guest_names.len()
        )));
    }
    let created_by = match req.created_by {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Err(EngineError::InvalidArgument("created-by must not be blank".into())),
    };
    let privilege = req
        .privilege
        .ok_or_else(|| EngineError::InvalidArgument("guest privilege must not be null".into()))?;

    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    if req.guest_names.iter().any(|n| n.len() > MAX_GUEST_NAME_LEN) {
        return Err(EngineError::LimitExceeded("guest name too long"));
    }
    if created_by.len() > MAX_CREATED_BY_LEN {
        return Err(EngineError::LimitExceeded("created-by too long"));
    }
    if req
        .special_requests
        .as_ref()
        .is_some_and(|s| s.len() > MAX_SPECIAL_REQUESTS_LEN)
    {
        return Err(EngineError::LimitExceeded("special requests too long"));
    }

    Ok(ValidRequest {
        room_id: req.room_id,
        stay,
        guest_count: req.guest_count as u32,
        guest_names: req.guest_names,
        created_by,
        privilege,
        special_requests: req.special_requests,
    })
}

/// First existing booking that overlaps `stay`. Input order does not matter.
pub fn find_conflict<'a>(existing: &'a [Booking], stay: &Stay) -> Option<&'a Booking> {
    existing.iter().find(|b| b.stay.overlaps(stay))
}

pub(crate) fn check_no_conflict(
    room: &Room,
    existing: &[Booking],
    stay: &Stay,
) -> Result<(), EngineError> {
    match find_conflict(existing, stay) {
        Some(_) => Err(EngineError::NotAvailable {
            room_number: room.number,
            stay: *stay,
        }),
        None => Ok(()),
    }
}
