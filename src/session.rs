//! Simulated session storage

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::Value;

/// A simulated session store shared between the test client and the screens
/// under test.
///
/// The client side injects a whole payload before each request; the screen
/// side reads and writes values through the same handle during request
/// handling. The previous-URL slot is kept separate from the payload so that
/// payload injection never clobbers redirect-back state.
///
/// Cloning a `SessionStore` produces another handle to the same underlying
/// state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionInner>>,
}

#[derive(Default)]
struct SessionInner {
    values: IndexMap<String, Value>,
    previous_url: Option<String>,
}

impl std::fmt::Debug for SessionStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore(...)").finish()
    }
}

impl SessionStore {
    /// Creates a new, empty session store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .read()
            .expect("poisoned session lock")
            .values
            .get(key)
            .cloned()
    }

    /// Stores `value` under `key`
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .write()
            .expect("poisoned session lock")
            .values
            .insert(key.into(), value.into());
    }

    /// Replaces the whole session payload.
    ///
    /// The previous-URL slot is not part of the payload and survives the
    /// replacement.
    pub fn replace(&self, values: IndexMap<String, Value>) {
        self.inner
            .write()
            .expect("poisoned session lock")
            .values = values;
    }

    /// Returns a copy of the current session payload
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.inner
            .read()
            .expect("poisoned session lock")
            .values
            .clone()
    }

    /// Returns the simulated "previous URL" value
    pub fn previous_url(&self) -> Option<String> {
        self.inner
            .read()
            .expect("poisoned session lock")
            .previous_url
            .clone()
    }

    /// Sets the simulated "previous URL" value
    pub fn set_previous_url(&self, url: impl Into<String>) {
        self.inner
            .write()
            .expect("poisoned session lock")
            .previous_url = Some(url.into());
    }

    /// Returns `true` if the session payload holds no values
    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .expect("poisoned session lock")
            .values
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use indexmap::IndexMap;
    use serde_json::{json, Value};

    #[test]
    fn it_reads_back_inserted_values() {
        let session = SessionStore::new();

        session.insert("user", "kate");

        assert_eq!(session.get("user"), Some(Value::from("kate")));
        assert_eq!(session.get("missing"), None);
    }

    #[test]
    fn it_replaces_payload_wholesale() {
        let session = SessionStore::new();
        session.insert("old", 1);

        let mut payload = IndexMap::new();
        payload.insert("new".to_owned(), json!(2));
        session.replace(payload);

        assert_eq!(session.get("old"), None);
        assert_eq!(session.get("new"), Some(json!(2)));
    }

    #[test]
    fn it_keeps_previous_url_across_replacement() {
        let session = SessionStore::new();
        session.set_previous_url("/came-from");

        session.replace(IndexMap::new());

        assert_eq!(session.previous_url().as_deref(), Some("/came-from"));
    }

    #[test]
    fn it_shares_state_across_handles() {
        let session = SessionStore::new();
        let other = session.clone();

        other.insert("count", 3);

        assert_eq!(session.get("count"), Some(json!(3)));
    }
}
