use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};

use crate::model::*;
use crate::wal::Wal;

use super::{BookingStore, InMemoryStore, RoomStore, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

struct AppendRequest {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<AppendRequest>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!("wal flush to {} failed: {e}", wal.path().display());
        }

        for req in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = req.response.send(r);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[AppendRequest]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for req in batch {
        if let Err(e) = wal.append_buffered(&req.event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even after an append error, so partially buffered
    // bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

/// Durable store: an [`InMemoryStore`] rebuilt from the WAL on open.
/// A record becomes visible to readers only after its WAL entry is fsynced.
pub struct WalStore {
    memory: InMemoryStore,
    wal_tx: mpsc::Sender<AppendRequest>,
    /// Serializes the room-number check with the append.
    catalog: Mutex<()>,
}

impl WalStore {
    /// Replay `path` and start the writer task. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let memory = InMemoryStore::new();
        for event in &events {
            memory
                .apply_event(event)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        }
        info!(
            "replayed {} rooms, {} bookings from {}",
            memory.room_count(),
            memory.booking_count(),
            path.display()
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            memory,
            wal_tx,
            catalog: Mutex::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(AppendRequest {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        rx.await.map_err(|_| StoreError::WriterClosed)??;
        Ok(())
    }

    /// WAL-append then publish to the in-memory tables.
    async fn persist_and_apply(&self, event: Event) -> Result<(), StoreError> {
        self.wal_append(&event).await?;
        self.memory.apply_event(&event)
    }
}

#[async_trait]
impl RoomStore for WalStore {
    async fn save(&self, room: NewRoom) -> Result<Room, StoreError> {
        let _guard = self.catalog.lock().await;
        if self.memory.room_number_taken(room.number) {
            return Err(StoreError::Constraint(format!(
                "room number {} already exists",
                room.number
            )));
        }
        let saved = room.into_saved(self.memory.allocate_room_id());
        self.persist_and_apply(Event::RoomCreated(saved.clone())).await?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        RoomStore::find_by_id(&self.memory, id).await
    }

    async fn find_by_room_number(&self, number: u32) -> Result<Option<Room>, StoreError> {
        self.memory.find_by_room_number(number).await
    }

    async fn find_all(&self) -> Result<Vec<Room>, StoreError> {
        RoomStore::find_all(&self.memory).await
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn save(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let saved = booking.into_saved(self.memory.allocate_booking_id());
        self.persist_and_apply(Event::BookingCreated(saved.clone())).await?;
        Ok(saved)
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        BookingStore::find_by_id(&self.memory, id).await
    }

    async fn find_all(&self) -> Result<Vec<Booking>, StoreError> {
        BookingStore::find_all(&self.memory).await
    }

    async fn find_by_room_id(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError> {
        self.memory.find_by_room_id(room_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::{NaiveDate, Utc};

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hotelbook_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn new_booking(room_id: RoomId, names: &[&str]) -> NewBooking {
        NewBooking {
            room_id,
            stay: Stay::new(d("2024-07-01"), d("2024-07-05")).unwrap(),
            guest_names: names.iter().map(|s| s.to_string()).collect(),
            created_by: "ONLINE".into(),
            privilege: GuestPrivilege::Loyalty,
            special_requests: Some("quiet room".into()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let path = test_wal_path("reopen.wal");

        let (room, booking) = {
            let store = WalStore::open(&path).unwrap();
            let room = RoomStore::save(
                &store,
                NewRoom::new(101, RoomType::Suite, 4, Amenities { balcony: true, beach_view: true, air_conditioning: false }),
            )
            .await
            .unwrap();
            let booking = BookingStore::save(&store, new_booking(room.id, &["A|B", "C, D"]))
                .await
                .unwrap();
            (room, booking)
        };

        let store = WalStore::open(&path).unwrap();
        assert_eq!(store.find_by_room_number(101).await.unwrap(), Some(room.clone()));
        assert_eq!(BookingStore::find_by_id(&store, booking.id).await.unwrap(), Some(booking.clone()));
        assert_eq!(store.find_by_room_id(room.id).await.unwrap(), vec![booking]);
    }

    #[tokio::test]
    async fn ids_continue_after_reopen() {
        let path = test_wal_path("id_sequence.wal");
        {
            let store = WalStore::open(&path).unwrap();
            for n in 1..=3 {
                RoomStore::save(&store, NewRoom::new(100 + n, RoomType::Single, 1, Amenities::default()))
                    .await
                    .unwrap();
            }
        }

        let store = WalStore::open(&path).unwrap();
        let next = RoomStore::save(&store, NewRoom::new(200, RoomType::Single, 1, Amenities::default()))
            .await
            .unwrap();
        assert_eq!(next.id, 4);
    }

    #[tokio::test]
    async fn duplicate_room_number_not_logged() {
        let path = test_wal_path("duplicate.wal");
        let store = WalStore::open(&path).unwrap();
        RoomStore::save(&store, NewRoom::new(101, RoomType::Double, 2, Amenities::default()))
            .await
            .unwrap();
        let err = RoomStore::save(&store, NewRoom::new(101, RoomType::Suite, 3, Amenities::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_saves_get_distinct_ids() {
        let path = test_wal_path("concurrent.wal");
        let store = std::sync::Arc::new(WalStore::open(&path).unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                BookingStore::save(store.as_ref(), new_booking(1, &[&format!("guest {i}")]))
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(Wal::replay(&path).unwrap().len(), 16);
    }
}
