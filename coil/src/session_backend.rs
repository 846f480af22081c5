//! Pluggable session storage backends.
//!
//! The [`SessionBackend`] trait abstracts over *where* the session and cache
//! blobs live; the byte formats themselves are defined by
//! [`SessionState`](crate::session::SessionState), so every backend stores
//! byte-identical artifacts for the same state.  Only the medium and the key
//! naming differ.
//!
//! Two built-in backends are provided:
//! * [`FileBackend`] — `<name>.session` / `<name>.cache` files on disk.
//! * [`KvBackend`] — base64 values in any string [`KvStore`]
//!   (e.g. a browser's local storage; [`MemoryKv`] for tests and
//!   always-fresh bots).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::errors::StorageError;
use crate::session::SessionState;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// An abstraction over where and how session data is persisted.
pub trait SessionBackend: Send + Sync {
    /// Load any persisted artifacts into `state`.
    ///
    /// Absence of a stored session or cache is not an error; the state is
    /// simply left as it was.
    fn load(&self, state: &mut SessionState) -> Result<(), StorageError>;

    /// Persist the given state.
    ///
    /// The session blob holds write-once login material and is only written
    /// when none is stored yet; the cache blob is always rewritten.
    fn save(&self, state: &SessionState) -> Result<(), StorageError>;

    /// Remove all stored artifacts (e.g. on sign-out).
    fn delete(&self) -> Result<(), StorageError>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

fn trim_dot(ext: &str) -> &str {
    ext.strip_prefix('.').unwrap_or(ext)
}

// ─── FileBackend ─────────────────────────────────────────────────────────────

/// Filesystem-backed session storage.
pub struct FileBackend {
    name:        String,
    session_dir: PathBuf,
    session_ext: String,
    cache_dir:   PathBuf,
    cache_ext:   String,
}

impl FileBackend {
    pub fn new(
        name:        impl Into<String>,
        session_dir: impl Into<PathBuf>,
        session_ext: impl Into<String>,
        cache_dir:   impl Into<PathBuf>,
        cache_ext:   impl Into<String>,
    ) -> Self {
        Self {
            name:        name.into(),
            session_dir: session_dir.into(),
            session_ext: session_ext.into(),
            cache_dir:   cache_dir.into(),
            cache_ext:   cache_ext.into(),
        }
    }

    /// Both artifacts in `dir` with the default `.session` / `.cache`
    /// extensions.
    pub fn in_dir(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::new(name, dir.clone(), "session", dir, "cache")
    }

    /// The first of `base`, `base1`, `base2`, … that collides with neither
    /// an existing session file nor an existing cache file.
    pub fn generate_name(
        base:        &str,
        session_dir: &Path,
        session_ext: &str,
        cache_dir:   &Path,
        cache_ext:   &str,
    ) -> String {
        let mut i = 0u32;
        loop {
            let name = if i == 0 { base.to_string() } else { format!("{base}{i}") };
            let session = session_dir.join(format!("{name}.{}", trim_dot(session_ext)));
            let cache = cache_dir.join(format!("{name}.{}", trim_dot(cache_ext)));
            if !session.exists() && !cache.exists() {
                return name;
            }
            i += 1;
        }
    }

    fn session_path(&self) -> PathBuf {
        self.session_dir
            .join(format!("{}.{}", self.name, trim_dot(&self.session_ext)))
    }

    fn cache_path(&self) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", self.name, trim_dot(&self.cache_ext)))
    }
}

impl SessionBackend for FileBackend {
    fn load(&self, state: &mut SessionState) -> Result<(), StorageError> {
        let session_path = self.session_path();
        if session_path.exists() {
            let bytes = fs::read(&session_path)?;
            log::debug!("session blob is {} bytes", bytes.len());
            state.apply_session_blob(&bytes)?;
        }
        let cache_path = self.cache_path();
        if cache_path.exists() {
            state.apply_cache_blob(&fs::read(&cache_path)?)?;
        }
        Ok(())
    }

    fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        let session_path = self.session_path();
        if !session_path.exists() {
            fs::write(&session_path, state.session_blob())?;
            log::info!("session saved to {:?}", session_path);
        }
        let cache_path = self.cache_path();
        fs::write(&cache_path, state.cache_blob())?;
        log::info!("cache saved to {:?}", cache_path);
        Ok(())
    }

    fn delete(&self) -> Result<(), StorageError> {
        for path in [self.session_path(), self.cache_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

// ─── KvStore ─────────────────────────────────────────────────────────────────

/// A string key-value store, the shape of a browser's local storage.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// In-memory [`KvStore`].  Useful for tests and for bots that should always
/// start fresh.
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

// ─── KvBackend ───────────────────────────────────────────────────────────────

/// Session storage over any [`KvStore`], values base64-encoded.
///
/// Keys are `"<name>.session"` and `"<name>.cache"`.
pub struct KvBackend<S> {
    name:  String,
    store: S,
}

impl<S: KvStore> KvBackend<S> {
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self { name: name.into(), store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn session_key(&self) -> String {
        format!("{}.session", self.name)
    }

    fn cache_key(&self) -> String {
        format!("{}.cache", self.name)
    }

    fn decode(key: &str, value: &str) -> Result<Vec<u8>, StorageError> {
        BASE64
            .decode(value)
            .map_err(|e| StorageError::corrupt(format!("invalid base64 under {key:?}: {e}")))
    }
}

impl<S: KvStore> SessionBackend for KvBackend<S> {
    fn load(&self, state: &mut SessionState) -> Result<(), StorageError> {
        let session_key = self.session_key();
        if let Some(value) = self.store.get(&session_key) {
            state.apply_session_blob(&Self::decode(&session_key, &value)?)?;
        }
        let cache_key = self.cache_key();
        if let Some(value) = self.store.get(&cache_key) {
            state.apply_cache_blob(&Self::decode(&cache_key, &value)?)?;
        }
        Ok(())
    }

    fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        let session_key = self.session_key();
        if self.store.get(&session_key).is_none() {
            self.store.set(&session_key, BASE64.encode(state.session_blob()));
            log::info!("session saved under {session_key:?}");
        }
        self.store.set(&self.cache_key(), BASE64.encode(state.cache_blob()));
        Ok(())
    }

    fn delete(&self) -> Result<(), StorageError> {
        self.store.remove(&self.session_key());
        self.store.remove(&self.cache_key());
        Ok(())
    }

    fn name(&self) -> &str {
        "key-value"
    }
}
