//! Session state and its persistent storage.
//!
//! [`Session`] is the single owner of the bearer token. It is read from a
//! [`SessionStore`] once when restored and written through on every change.
//! Views and the HTTP client share it behind an `Arc`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::Result;

/// Fixed storage key for the bearer token.
pub const TOKEN_KEY: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated,
}

/// Persistent string key-value storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Drop every stored value.
    fn clear(&self) -> Result<()>;
}

/// JSON object on disk, one file per user.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .expect("MemorySessionStore poisoned")
            .insert(TOKEN_KEY.to_string(), token.to_string());
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .expect("MemorySessionStore poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .expect("MemorySessionStore poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values
            .lock()
            .expect("MemorySessionStore poisoned")
            .clear();
        Ok(())
    }
}

pub struct Session {
    store: Box<dyn SessionStore>,
    token: RwLock<Option<String>>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Read the persisted token once and build the session around it.
    ///
    /// An unreadable store starts the session signed out and is cleared, so a
    /// damaged file never locks the user out of logging in again.
    pub fn restore(store: impl SessionStore + 'static) -> Self {
        let token = match store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "persisted session is unreadable, starting signed out");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to clear persisted session");
                }
                None
            }
        };
        let state = state_for(&token);
        debug!(?state, "session restored");
        Self {
            store: Box::new(store),
            token: RwLock::new(token),
            state: watch::Sender::new(state),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().expect("session lock poisoned").clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Persist a freshly issued token and mark the session authenticated.
    pub fn sign_in(&self, token: &str) -> Result<()> {
        self.store.set(TOKEN_KEY, token)?;
        *self.token.write().expect("session lock poisoned") = Some(token.to_string());
        self.state.send_replace(SessionState::Authenticated);
        Ok(())
    }

    /// Forget the token. The in-memory state is cleared even if the store fails.
    pub fn sign_out(&self) -> Result<()> {
        *self.token.write().expect("session lock poisoned") = None;
        self.state.send_replace(SessionState::Unauthenticated);
        self.store.clear().inspect_err(|e| {
            warn!(error = %e, "failed to clear persisted session");
        })
    }
}

fn state_for(token: &Option<String>) -> SessionState {
    match token {
        Some(_) => SessionState::Authenticated,
        None => SessionState::Unauthenticated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_reads_initial_state_from_store() {
        let anon = Session::restore(MemorySessionStore::default());
        assert_eq!(anon.state(), SessionState::Unauthenticated);
        assert!(anon.token().is_none());

        let signed = Session::restore(MemorySessionStore::with_token("tok"));
        assert_eq!(signed.state(), SessionState::Authenticated);
        assert_eq!(signed.token().as_deref(), Some("tok"));
    }

    #[test]
    fn sign_in_and_out_notify_subscribers() {
        let session = Session::restore(MemorySessionStore::default());
        let mut rx = session.subscribe();

        session.sign_in("abc").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Authenticated);

        session.sign_out().unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
    }

    #[test]
    fn file_store_persists_across_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let session = Session::restore(FileSessionStore::new(&path));
        session.sign_in("persisted").unwrap();

        let again = Session::restore(FileSessionStore::new(&path));
        assert_eq!(again.token().as_deref(), Some("persisted"));

        again.sign_out().unwrap();
        assert!(!path.exists());
        assert!(FileSessionStore::new(&path).get(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn corrupt_session_file_starts_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let session = Session::restore(FileSessionStore::new(&path));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.token().is_none());
        assert!(!path.exists());

        session.sign_in("fresh").unwrap();
        let again = Session::restore(FileSessionStore::new(&path));
        assert_eq!(again.token().as_deref(), Some("fresh"));
    }

    #[test]
    fn clearing_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        store.clear().unwrap();
    }
}
