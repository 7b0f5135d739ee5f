//! Local id generation
//!
//! Notification ids are time-seeded and strictly increasing within a process.
//! Upload queue entries get a UUIDv7 since they never leave the process.

use std::sync::atomic::{AtomicU64, Ordering};

static LAST_NOTIFICATION_ID: AtomicU64 = AtomicU64::new(0);

/// Next notification id: current unix millis, bumped past the previous id
pub fn next_notification_id() -> u64 {
    let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut prev = LAST_NOTIFICATION_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_NOTIFICATION_ID.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Id for an entry in the local upload queue
pub fn queue_entry_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
