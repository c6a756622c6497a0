//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use joinwatch::DbError;
use joinwatch::clock::{Clock, TimePoint};
use joinwatch::config::{Mode, Settings, ThresholdSettings};
use joinwatch::notify::{NotificationSink, NotifyError};
use joinwatch::query::QueryError;
use joinwatch::snapshot::{ServerSnapshot, SnapshotSource};
use joinwatch::store::{BlobStore, PresenceStore};
use tokio_rusqlite::rusqlite;

pub const ADDRESS: &str = "10.0.0.5:27015";
pub const SERVER_NAME: &str = "Test Server";
pub const BUCKET: &str = "test-bucket";

/// Fixed timestamp for testing
pub const NOW: i64 = 1_700_000_000;

pub fn snapshot(count: u32, names: &[&str]) -> ServerSnapshot {
    ServerSnapshot::from_raw(SERVER_NAME, count, names.iter().copied())
}

pub fn all_settings() -> Settings {
    Settings {
        mode: Mode::All,
        server_address: ADDRESS.to_string(),
    }
}

pub fn threshold_settings(player_threshold: u32, cooldown_minutes: u32) -> ThresholdSettings {
    ThresholdSettings {
        player_threshold,
        cooldown_minutes,
        bucket: BUCKET.to_string(),
    }
}

pub fn threshold_mode(player_threshold: u32, cooldown_minutes: u32) -> Settings {
    Settings {
        mode: Mode::Threshold(threshold_settings(player_threshold, cooldown_minutes)),
        server_address: ADDRESS.to_string(),
    }
}

/// Hands out queued snapshots in order. `None` in the queue is a failed query.
#[derive(Default)]
pub struct FakeSource {
    queue: Mutex<VecDeque<Option<ServerSnapshot>>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(snapshots: impl IntoIterator<Item = ServerSnapshot>) -> Self {
        Self {
            queue: Mutex::new(snapshots.into_iter().map(Some).collect()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            queue: Mutex::new(VecDeque::from([None])),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, snapshot: ServerSnapshot) {
        self.queue.lock().unwrap().push_back(Some(snapshot));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for FakeSource {
    async fn fetch(&self) -> Result<ServerSnapshot, QueryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(Some(snapshot)) => Ok(snapshot),
            _ => Err(QueryError::Timeout(Duration::from_secs(5))),
        }
    }
}

/// In-memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    players: Mutex<HashSet<String>>,
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
    blob_puts: AtomicUsize,
    player_writes: AtomicUsize,
    fail_reads: bool,
    fail_writes: bool,
}

fn store_failure() -> DbError {
    DbError::Sqlite(rusqlite::Error::InvalidQuery)
}

impl MemoryStore {
    pub fn failing_reads(self) -> Self {
        Self {
            fail_reads: true,
            ..self
        }
    }

    pub fn failing_writes(self) -> Self {
        Self {
            fail_writes: true,
            ..self
        }
    }

    pub fn with_players(names: &[&str]) -> Self {
        let store = Self::default();
        store
            .players
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        store
    }

    pub fn with_timer(target: i64) -> Self {
        let store = Self::default();
        store.blobs.lock().unwrap().insert(
            (BUCKET.to_string(), "timer.txt".to_string()),
            target.to_string().into_bytes(),
        );
        store
    }

    pub fn players(&self) -> Vec<String> {
        let mut names: Vec<String> = self.players.lock().unwrap().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn timer(&self) -> Option<i64> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(BUCKET.to_string(), "timer.txt".to_string()))
            .map(|body| String::from_utf8(body.clone()).unwrap().parse().unwrap())
    }

    pub fn set_timer_raw(&self, body: &[u8]) {
        self.blobs.lock().unwrap().insert(
            (BUCKET.to_string(), "timer.txt".to_string()),
            body.to_vec(),
        );
    }

    pub fn blob_puts(&self) -> usize {
        self.blob_puts.load(Ordering::SeqCst)
    }

    pub fn player_writes(&self) -> usize {
        self.player_writes.load(Ordering::SeqCst)
    }
}

impl PresenceStore for MemoryStore {
    async fn scan_players(&self) -> Result<Vec<String>, DbError> {
        if self.fail_reads {
            return Err(store_failure());
        }
        Ok(self.players.lock().unwrap().iter().cloned().collect())
    }

    async fn put_player(&self, name: &str) -> Result<(), DbError> {
        if self.fail_writes {
            return Err(store_failure());
        }
        self.player_writes.fetch_add(1, Ordering::SeqCst);
        self.players.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn delete_player(&self, name: &str) -> Result<(), DbError> {
        if self.fail_writes {
            return Err(store_failure());
        }
        self.player_writes.fetch_add(1, Ordering::SeqCst);
        self.players.lock().unwrap().remove(name);
        Ok(())
    }
}

impl BlobStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        if self.fail_reads {
            return Err(store_failure());
        }
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), DbError> {
        if self.fail_writes {
            return Err(store_failure());
        }
        self.blob_puts.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

/// Remembers every published notification.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|(subject, _)| subject).collect()
    }
}

impl NotificationSink for RecordingSink {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Discord("webhook unreachable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

/// Clock pinned to one instant.
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> TimePoint {
        TimePoint::from_secs(self.0)
    }
}
