//! In-memory slot backend

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::{SlotError, SlotStorage, entry_cost, validate_key};

/// Slots held in a process-local map
///
/// Applies the same quota accounting as [`crate::FileSlots`]; nothing
/// survives the process.
#[derive(Debug)]
pub struct MemorySlots {
    entries: Mutex<HashMap<String, String>>,
    quota: u64,
}

impl MemorySlots {
    /// Create an empty store with the given byte quota
    pub fn new(quota: u64) -> Self {
        debug!(quota, "MemorySlots::new: called");
        Self {
            entries: Mutex::new(HashMap::new()),
            quota,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still structurally valid
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemorySlots {
    fn default() -> Self {
        Self::new(crate::DEFAULT_QUOTA_BYTES)
    }
}

impl SlotStorage for MemorySlots {
    fn get(&self, key: &str) -> Result<Option<String>, SlotError> {
        validate_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        let mut entries = self.lock();
        let others: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_cost(k, v))
            .sum();
        let needed = others + entry_cost(key, value);
        if needed > self.quota {
            debug!(key, needed, quota = self.quota, "MemorySlots::set: quota exceeded");
            return Err(SlotError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        self.lock().remove(key);
        Ok(())
    }

    fn usage(&self) -> Result<u64, SlotError> {
        Ok(self.lock().iter().map(|(k, v)| entry_cost(k, v)).sum())
    }

    fn quota(&self) -> u64 {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_get_remove() {
        let slots = MemorySlots::new(100);
        slots.set("k", "value").unwrap();
        assert_eq!(slots.get("k").unwrap().as_deref(), Some("value"));
        assert_eq!(slots.usage().unwrap(), 6);

        slots.remove("k").unwrap();
        assert!(slots.get("k").unwrap().is_none());
        assert_eq!(slots.usage().unwrap(), 0);
    }

    #[test]
    fn test_quota_rejects_and_keeps_previous_value() {
        let slots = MemorySlots::new(10);
        slots.set("k", "small").unwrap();

        let result = slots.set("k", "much too large for the quota");
        assert!(matches!(result, Err(SlotError::QuotaExceeded { .. })));
        assert_eq!(slots.get("k").unwrap().as_deref(), Some("small"));
    }

    #[test]
    fn test_overwrite_does_not_double_charge() {
        let slots = MemorySlots::new(10);
        slots.set("k", "12345678").unwrap();
        // Same size again fits because the old value is released
        slots.set("k", "87654321").unwrap();
        assert_eq!(slots.usage().unwrap(), 9);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let slots = MemorySlots::default();
        assert!(slots.remove("never-written").is_ok());
    }

    proptest! {
        #[test]
        fn prop_usage_never_exceeds_quota(writes in proptest::collection::vec(("[a-c]", "[a-z]{0,40}"), 0..40)) {
            let slots = MemorySlots::new(64);
            for (key, value) in &writes {
                let _ = slots.set(key, value);
                prop_assert!(slots.usage().unwrap() <= slots.quota());
            }
        }
    }
}
