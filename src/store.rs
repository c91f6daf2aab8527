use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error as ThisError;

/// The Store holds every key-value pair known to the server.
///
/// It has a single owner and does no locking of its own: on the network path that owner is the
/// coordinator loop, in the interactive shell it is the shell itself. Callers that want to share
/// a Store across tasks must route access through one of those owners instead of cloning it.
#[derive(Debug, Default)]
pub struct Store {
    keys: HashMap<Key, Bytes>,
    max_keys: Option<usize>,
}

type Key = Bytes;

#[derive(Debug, ThisError, PartialEq)]
pub enum WriteError {
    #[error("max number of keys ({limit}) reached")]
    CapacityExceeded { limit: usize },
}

impl Store {
    pub fn new() -> Store {
        Self::default()
    }

    /// A store that refuses to create more than `max_keys` distinct keys. Overwrites of existing
    /// keys are always accepted.
    pub fn with_max_keys(max_keys: usize) -> Store {
        Store {
            keys: HashMap::new(),
            max_keys: Some(max_keys),
        }
    }

    pub fn set(&mut self, key: Key, value: Bytes) -> Result<(), WriteError> {
        if let Some(limit) = self.max_keys {
            if self.keys.len() >= limit && !self.keys.contains_key(&key) {
                return Err(WriteError::CapacityExceeded { limit });
            }
        }

        self.keys.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.keys.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
