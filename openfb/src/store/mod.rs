pub mod file;

pub use file::FileTokenStore;

use std::collections::HashMap;
use std::sync::Mutex;

/// Key under which the access token is persisted.
pub const TOKEN_KEY: &str = "fbtoken";

/// Key-value persistence for the access token.
///
/// Implementations swallow their own I/O failures (logging them); a token
/// that cannot be read is treated as absent.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-process store that lives as long as the session. The default.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
    }
}

/// Read the token, treating empty values and the literal `"undefined"`
/// (left behind by older web stores) as absent and scrubbing them.
pub(crate) fn read_token(store: &dyn TokenStore) -> Option<String> {
    match store.get(TOKEN_KEY) {
        Some(token) if !token.is_empty() && token != "undefined" => Some(token),
        Some(_) => {
            store.remove(TOKEN_KEY);
            None
        }
        None => None,
    }
}
