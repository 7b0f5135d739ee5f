//! File-backed slot backend
//!
//! Layout:
//!
//! ```text
//! {root}/
//! ├── .lock              # exclusive lock held for the duration of each write
//! ├── visionflow-state   # one file per slot, content is the raw value
//! └── visionflow-exports
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::{SlotError, SlotStorage, entry_cost, validate_key};

const LOCK_FILE: &str = ".lock";
const TMP_SUFFIX: &str = ".tmp";

/// Slots stored as files under a directory
#[derive(Debug, Clone)]
pub struct FileSlots {
    root: PathBuf,
    quota: u64,
}

impl FileSlots {
    /// Open (creating if needed) a slot directory with the given byte quota
    pub fn open(root: impl AsRef<Path>, quota: u64) -> Result<Self, SlotError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), quota, "Opened slot store");
        Ok(Self { root, quota })
    }

    /// Directory holding the slot files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn lock(&self) -> Result<fs::File, SlotError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Sum of entry costs for every slot except `skip`
    fn usage_excluding(&self, skip: Option<&str>) -> Result<u64, SlotError> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || name.ends_with(TMP_SUFFIX) || Some(name) == skip {
                continue;
            }
            let len = entry.metadata()?.len();
            total += name.len() as u64 + len;
        }
        Ok(total)
    }
}

impl SlotStorage for FileSlots {
    fn get(&self, key: &str) -> Result<Option<String>, SlotError> {
        validate_key(key)?;
        match fs::read_to_string(self.slot_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        let lock = self.lock()?;

        let needed = self.usage_excluding(Some(key))? + entry_cost(key, value);
        if needed > self.quota {
            debug!(key, needed, quota = self.quota, "FileSlots::set: quota exceeded");
            FileExt::unlock(&lock)?;
            return Err(SlotError::QuotaExceeded {
                needed,
                quota: self.quota,
            });
        }

        let tmp = self.root.join(format!("{key}{TMP_SUFFIX}"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.slot_path(key))?;
        FileExt::unlock(&lock)?;
        debug!(key, bytes = value.len(), "FileSlots::set: written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        validate_key(key)?;
        let lock = self.lock()?;
        let result = match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        FileExt::unlock(&lock)?;
        result
    }

    fn usage(&self) -> Result<u64, SlotError> {
        self.usage_excluding(None)
    }

    fn quota(&self) -> u64 {
        self.quota
    }
}
