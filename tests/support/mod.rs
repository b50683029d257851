#![allow(dead_code)]

use std::{
    num::{NonZeroU32, NonZeroUsize},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use vestige::application::repos::{InsertedBundle, RepoError, TraceRepo};
use vestige::config::{CacheSettings, WindowSettings};
use vestige::domain::entities::{GameObjectRecord, MessageRecord, PhantomFrame, PhantomRecord};
use vestige::domain::traces::{
    NewGameObject, NewMessage, NewPhantom, NewTraceBundle, TraceBundleDraft,
};

#[derive(Default)]
struct Tables {
    objects: Vec<GameObjectRecord>,
    messages: Vec<MessageRecord>,
    phantoms: Vec<PhantomRecord>,
}

/// Trace store kept in memory, with switches for injecting failures and
/// slowing reads down.
#[derive(Default)]
pub struct MemoryTraceRepo {
    tables: Mutex<Tables>,
    window_reads: AtomicUsize,
    read_delay_ms: AtomicU64,
    fail_reads: AtomicBool,
    fail_phantom_insert: AtomicBool,
    fail_ping: AtomicBool,
    pool_exhausted: AtomicBool,
}

impl MemoryTraceRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of window assemblies served (one per `latest_objects` call).
    pub fn window_reads(&self) -> usize {
        self.window_reads.load(Ordering::SeqCst)
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_phantom_insert(&self, fail: bool) {
        self.fail_phantom_insert.store(fail, Ordering::SeqCst);
    }

    pub fn exhaust_pool(&self, exhausted: bool) {
        self.pool_exhausted.store(exhausted, Ordering::SeqCst);
    }

    pub fn fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub async fn counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.lock().await;
        (
            tables.objects.len(),
            tables.messages.len(),
            tables.phantoms.len(),
        )
    }

    async fn before_read(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection reset by peer"));
        }
        Ok(())
    }

    async fn after_read(&self) {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

fn newest_first<T: Clone>(rows: &[T], limit: u32) -> Vec<T> {
    rows.iter().rev().take(limit as usize).cloned().collect()
}

#[async_trait]
impl TraceRepo for MemoryTraceRepo {
    async fn insert_bundle(&self, bundle: &NewTraceBundle) -> Result<InsertedBundle, RepoError> {
        if self.pool_exhausted.load(Ordering::SeqCst) {
            return Err(RepoError::PoolExhausted);
        }
        let mut tables = self.tables.lock().await;

        // Stage everything, publish only if every insert succeeds.
        let object = bundle.object.as_ref().map(|object| GameObjectRecord {
            id: tables.objects.len() as i64 + 1,
            u_uuid: object.u_uuid.clone(),
            o_type: object.o_type,
            o_pos: object.o_pos.clone(),
            o_rot: object.o_rot.clone(),
        });
        let message = bundle.message.as_ref().map(|message| MessageRecord {
            id: tables.messages.len() as i64 + 1,
            u_uuid: message.u_uuid.clone(),
            part1: message.part1.clone(),
            part2: message.part2.clone(),
            part3: message.part3.clone(),
        });
        if self.fail_phantom_insert.load(Ordering::SeqCst) {
            return Err(RepoError::Integrity {
                message: "phantoms_data_not_empty violated".into(),
            });
        }
        let phantom = PhantomRecord {
            id: tables.phantoms.len() as i64 + 1,
            u_uuid: bundle.phantom.u_uuid.clone(),
            data: bundle.phantom.data.clone(),
        };

        let inserted = InsertedBundle {
            object_id: object.as_ref().map(|row| row.id),
            message_id: message.as_ref().map(|row| row.id),
            phantom_id: phantom.id,
        };
        tables.objects.extend(object);
        tables.messages.extend(message);
        tables.phantoms.push(phantom);
        Ok(inserted)
    }

    async fn latest_objects(&self, limit: u32) -> Result<Vec<GameObjectRecord>, RepoError> {
        self.window_reads.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        let rows = newest_first(&self.tables.lock().await.objects, limit);
        self.after_read().await;
        Ok(rows)
    }

    async fn latest_messages(&self, limit: u32) -> Result<Vec<MessageRecord>, RepoError> {
        self.before_read().await?;
        let rows = newest_first(&self.tables.lock().await.messages, limit);
        self.after_read().await;
        Ok(rows)
    }

    async fn latest_phantoms(&self, limit: u32) -> Result<Vec<PhantomRecord>, RepoError> {
        self.before_read().await?;
        let rows = newest_first(&self.tables.lock().await.phantoms, limit);
        self.after_read().await;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(RepoError::PoolExhausted);
        }
        Ok(())
    }
}

pub fn cache_settings() -> CacheSettings {
    CacheSettings {
        url: None,
        enabled: true,
        ttl: Duration::from_secs(30),
        memory_capacity: NonZeroUsize::new(8).expect("non-zero"),
        op_timeout: Duration::from_millis(250),
    }
}

pub fn window_settings() -> WindowSettings {
    WindowSettings {
        objects: NonZeroU32::new(200).expect("non-zero"),
        messages: NonZeroU32::new(200).expect("non-zero"),
        phantoms: NonZeroU32::new(20).expect("non-zero"),
        max_phantom_frames: NonZeroUsize::new(4096).expect("non-zero"),
    }
}

pub fn phantom(owner: &str) -> NewPhantom {
    NewPhantom {
        u_uuid: owner.to_string(),
        data: vec![
            PhantomFrame::new("0,0,0", "0,0,0"),
            PhantomFrame::new("1,0,0", "0,15,0"),
        ],
    }
}

pub fn object_bundle(owner: &str, o_type: i32, o_pos: &str) -> TraceBundleDraft {
    TraceBundleDraft {
        object: Some(NewGameObject {
            u_uuid: owner.to_string(),
            o_type,
            o_pos: o_pos.to_string(),
            o_rot: "0,0,0".to_string(),
        }),
        message: None,
        phantom: Some(phantom(owner)),
    }
}

pub fn message_bundle(owner: &str, part1: &str) -> TraceBundleDraft {
    TraceBundleDraft {
        object: None,
        message: Some(NewMessage {
            u_uuid: owner.to_string(),
            part1: part1.to_string(),
            part2: "ahead".to_string(),
            part3: String::new(),
        }),
        phantom: Some(phantom(owner)),
    }
}
