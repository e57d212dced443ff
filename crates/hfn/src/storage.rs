//! External key/value storage used to persist the client id and cookie
//! jar across reconnects and restarts.

use std::collections::HashMap;
use std::sync::Mutex;

/// Persistent string storage. Implementations are expected to be cheap
/// and local (a file, a keychain, browser-style local storage); both
/// operations are synchronous.
pub trait Storage: Send + Sync + 'static {
    /// Returns the stored value, or `None` if absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

/// In-memory [`Storage`], for tests and ephemeral clients. Nothing
/// survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_owned(), value.to_owned());
        }
    }
}
