//! SlotStore - durable key-value slots with a byte quota
//!
//! A slot is a named string value. All slots of a store share one byte
//! quota, counted as key length plus value length, the way browser local
//! storage accounts for its entries. A write that would push the store past
//! its quota fails with [`SlotError::QuotaExceeded`] and leaves the previous
//! value untouched, so callers can decide how to degrade.
//!
//! # Backends
//!
//! - [`FileSlots`] - one file per slot under a directory, guarded by an
//!   exclusive lock file and written atomically via rename
//! - [`MemorySlots`] - in-process map, for tests and ephemeral sessions
//!
//! # Example
//!
//! ```ignore
//! use slotstore::{FileSlots, SlotStorage};
//!
//! let slots = FileSlots::open("/tmp/slots", 5 * 1024 * 1024)?;
//! slots.set("app-state", r#"{"credits":1}"#)?;
//! assert!(slots.get("app-state")?.is_some());
//! ```

mod error;
mod file;
mod memory;

pub use error::SlotError;
pub use file::FileSlots;
pub use memory::MemorySlots;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Default quota (5 MiB), matching the common local storage allowance
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Storage backend for named string slots
pub trait SlotStorage: Send + Sync {
    /// Read a slot, `None` when it was never written or has been removed
    fn get(&self, key: &str) -> Result<Option<String>, SlotError>;

    /// Write a slot, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), SlotError>;

    /// Remove a slot; removing a missing slot is not an error
    fn remove(&self, key: &str) -> Result<(), SlotError>;

    /// Bytes currently charged against the quota
    fn usage(&self) -> Result<u64, SlotError>;

    /// Total byte quota shared by all slots
    fn quota(&self) -> u64;
}

/// Read a slot and parse it as JSON
///
/// A missing slot yields `Ok(None)`; malformed JSON yields `SlotError::Json`.
pub fn read_json<T: DeserializeOwned>(storage: &dyn SlotStorage, key: &str) -> Result<Option<T>, SlotError> {
    match storage.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize a value as JSON and write it to a slot
pub fn write_json<T: Serialize>(storage: &dyn SlotStorage, key: &str, value: &T) -> Result<(), SlotError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

/// Charge for one slot: key bytes plus value bytes
pub(crate) fn entry_cost(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Reject keys that cannot be mapped to a plain file name
pub(crate) fn validate_key(key: &str) -> Result<(), SlotError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(SlotError::InvalidKey(key.to_string()))
    }
}
