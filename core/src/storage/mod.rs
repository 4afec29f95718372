//! Persistent Storage Abstraction
//!
//! Characteristic values flagged for persistence and the configuration
//! signature survive power cycles through a small key-value blob store.
//! Hosts implement [`Storage`] over their backend (flash partition, file, ...).

use core::fmt::Write;
use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    rc::Rc,
};

use crate::constants::{
    CONFIG_DIGEST_LEN, CONFIG_RECORD_KEY, MAX_CONFIG_NUMBER, PERSIST_IID_MASK, PERSIST_KEY_LEN,
};

pub type PersistKey = heapless::String<PERSIST_KEY_LEN>;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        StorageError::Corrupt(message.into())
    }
}

/// Trait for persistent storage operations
pub trait Storage {
    /// Get the blob stored under `key`
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a blob under `key`; may be buffered until [`Storage::commit`]
    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Flush buffered writes to the backing medium
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Derives the fixed-width key of a persisted characteristic:
/// four hex digits of type, eight of accessory id, three of instance id.
/// Returns `None` when the type id is not a short hex type.
pub fn persist_key(type_id: &str, aid: u32, iid: u32) -> Option<PersistKey> {
    let short_type = u16::from_str_radix(type_id, 16).ok()?;
    let mut key = PersistKey::new();
    // 4 + 8 + 3 digits always fit the key
    let _ = write!(
        key,
        "{:04X}{:08X}{:03X}",
        short_type,
        aid,
        iid & PERSIST_IID_MASK
    );
    Some(key)
}

/// Configuration number plus SHA-384 digest of the accessory database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSignature {
    pub number: u32,
    pub digest: [u8; CONFIG_DIGEST_LEN],
}

impl Default for ConfigSignature {
    fn default() -> Self {
        Self {
            number: 0,
            digest: [0; CONFIG_DIGEST_LEN],
        }
    }
}

impl ConfigSignature {
    const ENCODED_LEN: usize = 4 + CONFIG_DIGEST_LEN;

    pub fn load(storage: &dyn Storage) -> Result<Option<Self>, StorageError> {
        let Some(blob) = storage.get_blob(CONFIG_RECORD_KEY)? else {
            return Ok(None);
        };
        if blob.len() != Self::ENCODED_LEN {
            return Err(StorageError::corrupt(format!(
                "configuration record is {} bytes",
                blob.len()
            )));
        }
        let (number, digest) = blob.split_at(4);
        let mut signature = Self {
            number: u32::from_le_bytes([number[0], number[1], number[2], number[3]]),
            ..Default::default()
        };
        signature.digest.copy_from_slice(digest);
        Ok(Some(signature))
    }

    pub fn save(&self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        let mut blob = Vec::with_capacity(Self::ENCODED_LEN);
        blob.extend_from_slice(&self.number.to_le_bytes());
        blob.extend_from_slice(&self.digest);
        storage.set_blob(CONFIG_RECORD_KEY, &blob)?;
        storage.commit()
    }

    /// Next configuration number; wraps from 65535 back to 1.
    pub fn next_number(&self) -> u32 {
        if self.number >= MAX_CONFIG_NUMBER {
            1
        } else {
            self.number + 1
        }
    }
}

/// In-memory store. Clones share the same contents, so handing a clone to a
/// second database simulates a restart over the same flash.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    commits: Rc<RefCell<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }

    /// Number of commits seen so far.
    pub fn commits(&self) -> usize {
        *self.commits.borrow()
    }
}

impl Storage for MemoryStorage {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        *self.commits.borrow_mut() += 1;
        Ok(())
    }
}

/// Blobs kept hex encoded in a JSON object on disk. Writes are buffered and
/// the file is rewritten on commit.
pub struct JsonFileStorage {
    path: PathBuf,
    blobs: BTreeMap<String, String>,
    dirty: bool,
}

impl JsonFileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let blobs = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            blobs,
            dirty: false,
        })
    }
}

impl Storage for JsonFileStorage {
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.blobs
            .get(key)
            .map(|text| {
                hex::decode(text)
                    .map_err(|e| StorageError::corrupt(format!("blob {key}: {e}")))
            })
            .transpose()
    }

    fn set_blob(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.blobs.insert(key.to_string(), hex::encode(value));
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer(file, &self.blobs)?;
        self.dirty = false;
        Ok(())
    }
}
