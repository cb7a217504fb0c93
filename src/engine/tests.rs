use std::path::PathBuf;

use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::store::{InMemoryStore, WalStore};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn engine() -> Engine {
    Engine::with_store(Arc::new(InMemoryStore::new()))
}

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("hotelbook_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn double_room(number: u32) -> NewRoom {
    NewRoom::new(number, RoomType::Double, 2, Amenities::default())
}

fn request(room_id: RoomId, check_in: &str, check_out: &str, names: &[&str]) -> BookingRequest {
    BookingRequest {
        room_id,
        check_in: Some(d(check_in)),
        check_out: Some(d(check_out)),
        guest_count: names.len() as i64,
        guest_names: names.iter().map(|s| s.to_string()).collect(),
        created_by: Some("FRONT_DESK".into()),
        privilege: Some(GuestPrivilege::Standard),
        special_requests: Some(String::new()),
    }
}

#[tokio::test]
async fn booking_is_stored_with_given_fields() {
    let engine = engine();
    let room = assert_ok!(engine.create_room(double_room(101)).await);

    let booking = assert_ok!(
        engine
            .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A", "B"]))
            .await
    );
    assert!(booking.id > 0);
    assert_eq!(booking.room_id, room.id);
    assert_eq!(booking.stay, Stay::new(d("2024-07-01"), d("2024-07-05")).unwrap());
    assert_eq!(booking.guest_names, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(booking.guest_count(), 2);
    assert_eq!(booking.created_by, "FRONT_DESK");
    assert_eq!(booking.privilege, GuestPrivilege::Standard);
    assert_eq!(booking.special_requests.as_deref(), Some(""));

    let stored = assert_ok!(engine.get_booking(booking.id).await);
    assert_eq!(stored, Some(booking));
}

#[tokio::test]
async fn overlapping_booking_conflicts() {
    let engine = engine();
    let room = engine.create_room(double_room(101)).await.unwrap();
    engine
        .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A", "B"]))
        .await
        .unwrap();

    let err = assert_err!(
        engine
            .create_booking(request(room.id, "2024-07-03", "2024-07-07", &["C"]))
            .await
    );
    assert!(matches!(err, EngineError::NotAvailable { room_number: 101, .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(engine.bookings_for_room(room.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_day_turnover_allowed() {
    let engine = engine();
    let room = engine.create_room(double_room(101)).await.unwrap();
    engine
        .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A", "B"]))
        .await
        .unwrap();

    assert_ok!(
        engine
            .create_booking(request(room.id, "2024-07-05", "2024-07-08", &["C"]))
            .await
    );
    // And the stay that ends on the first one's check-in day.
    assert_ok!(
        engine
            .create_booking(request(room.id, "2024-06-28", "2024-07-01", &["D"]))
            .await
    );
    assert_eq!(engine.bookings_for_room(room.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_room_is_invalid_argument() {
    let engine = engine();
    let err = assert_err!(
        engine
            .create_booking(request(999, "2024-07-01", "2024-07-05", &["A"]))
            .await
    );
    assert!(matches!(err, EngineError::RoomNotFound(999)));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("999"));
}

#[tokio::test]
async fn capacity_boundary() {
    let engine = engine();
    let room = engine.create_room(double_room(101)).await.unwrap();

    let err = assert_err!(
        engine
            .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A", "B", "C"]))
            .await
    );
    assert!(matches!(
        err,
        EngineError::CapacityExceeded { guests: 3, max_guests: 2 }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_ok!(
        engine
            .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A", "B"]))
            .await
    );
}

#[tokio::test]
async fn count_name_mismatch_rejected_before_room_lookup() {
    let engine = engine();
    let mut req = request(999, "2024-07-01", "2024-07-05", &["Alice"]);
    req.guest_count = 2;
    let err = assert_err!(engine.create_booking(req).await);
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert!(engine.list_bookings().await.unwrap().is_empty());
}

#[tokio::test]
async fn capacity_checked_before_availability() {
    let engine = engine();
    let room = engine.create_room(double_room(101)).await.unwrap();
    engine
        .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A"]))
        .await
        .unwrap();

    // Overlaps and exceeds capacity: capacity is reported.
    let err = assert_err!(
        engine
            .create_booking(request(room.id, "2024-07-02", "2024-07-03", &["A", "B", "C"]))
            .await
    );
    assert!(matches!(err, EngineError::CapacityExceeded { .. }));
}

#[tokio::test]
async fn availability_reads_are_idempotent() {
    let engine = engine();
    let room = engine.create_room(double_room(101)).await.unwrap();
    engine
        .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["A"]))
        .await
        .unwrap();

    let (a, b) = (Some(d("2024-07-04")), Some(d("2024-07-06")));
    let first = engine.is_room_available(room.id, a, b).await.unwrap();
    let second = engine.is_room_available(room.id, a, b).await.unwrap();
    assert!(!first);
    assert_eq!(first, second);
    assert_eq!(engine.list_bookings().await.unwrap().len(), 1);

    let free = engine
        .is_room_available(room.id, Some(d("2024-07-05")), Some(d("2024-07-09")))
        .await
        .unwrap();
    assert!(free);
}

#[tokio::test]
async fn availability_of_unknown_room_is_true() {
    let engine = engine();
    let available = engine
        .is_room_available(42, Some(d("2024-07-01")), Some(d("2024-07-02")))
        .await
        .unwrap();
    assert!(available);
}

#[tokio::test]
async fn availability_rejects_bad_dates() {
    let engine = engine();
    let err = assert_err!(engine.is_room_available(1, None, Some(d("2024-07-02"))).await);
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let same = Some(d("2024-07-02"));
    let err = assert_err!(engine.is_room_available(1, same, same).await);
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn duplicate_room_number_conflicts() {
    let engine = engine();
    engine.create_room(double_room(101)).await.unwrap();
    let err = assert_err!(engine.create_room(double_room(101)).await);
    assert!(matches!(err, EngineError::DuplicateRoomNumber(101)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(engine.list_rooms().await.unwrap().len(), 1);
}

#[tokio::test]
async fn room_requires_positive_number_and_capacity() {
    let engine = engine();
    let err = assert_err!(
        engine
            .create_room(NewRoom::new(0, RoomType::Single, 1, Amenities::default()))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = assert_err!(
        engine
            .create_room(NewRoom::new(5, RoomType::Single, 0, Amenities::default()))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn room_lookups() {
    let engine = engine();
    for n in [303, 101, 202] {
        engine.create_room(double_room(n)).await.unwrap();
    }
    let numbers: Vec<u32> = engine
        .list_rooms()
        .await
        .unwrap()
        .iter()
        .map(|r| r.number)
        .collect();
    assert_eq!(numbers, vec![101, 202, 303]);

    let room = engine.find_room_by_number(202).await.unwrap().unwrap();
    assert_eq!(engine.get_room(room.id).await.unwrap(), Some(room));
    assert_eq!(engine.find_room_by_number(404).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_overlapping_bookings_single_winner() {
    let engine = Arc::new(engine());
    let room = engine.create_room(double_room(101)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let engine = engine.clone();
        let name = format!("guest {i}");
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(request(room.id, "2024-07-01", "2024-07-05", &[name.as_str()]))
                .await
        }));
    }

    let mut wins = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert!(matches!(e, EngineError::NotAvailable { .. })),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(engine.bookings_for_room(room.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_bookings_on_different_rooms_all_succeed() {
    let engine = Arc::new(engine());
    let mut room_ids = Vec::new();
    for n in 1..=8 {
        room_ids.push(engine.create_room(double_room(100 + n)).await.unwrap().id);
    }

    let mut handles = Vec::new();
    for room_id in room_ids {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(request(room_id, "2024-07-01", "2024-07-05", &["A"]))
                .await
        }));
    }
    for h in handles {
        assert_ok!(h.await.unwrap());
    }
    assert_eq!(engine.list_bookings().await.unwrap().len(), 8);
}

#[tokio::test]
async fn durable_engine_survives_restart() {
    let path = test_wal_path("restart.wal");
    let (room, booking) = {
        let engine = Engine::with_store(Arc::new(WalStore::open(&path).unwrap()));
        let room = engine.create_room(double_room(101)).await.unwrap();
        let booking = engine
            .create_booking(request(room.id, "2024-07-01", "2024-07-05", &["O'Brien", "Smith|Jones"]))
            .await
            .unwrap();
        (room, booking)
    };

    let engine = Engine::with_store(Arc::new(WalStore::open(&path).unwrap()));
    assert_eq!(engine.get_room(room.id).await.unwrap(), Some(room.clone()));
    assert_eq!(engine.get_booking(booking.id).await.unwrap(), Some(booking));

    // Conflicts are still detected against replayed bookings.
    let err = assert_err!(
        engine
            .create_booking(request(room.id, "2024-07-04", "2024-07-06", &["X"]))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
