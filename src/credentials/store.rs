//! The credential store: cache, lock, and the load/modify/save protocol.
//!
//! `CredentialStore` owns one exclusive section that guards the cached
//! `CredentialSet` and the credential file together.  Every read and
//! every modification runs inside it, from load-on-miss through to the
//! final write, so concurrent callers are strictly serialized and can
//! never observe a torn file or lose an update.
//!
//! Writes follow a fixed order: the closure mutates a private copy,
//! the copy is encoded, the bytes are written, and only then does the
//! copy replace the cache.  Any failure along the way leaves both the
//! cache and the file exactly as they were.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use super::codec::CredentialCodec;
use super::storage::{FsStorage, Storage};
use super::user::CredentialSet;
use crate::crypto::keys::KeySource;
use crate::errors::{CredVaultError, Result};

/// Cached state, only ever touched while the section is held.
struct Inner {
    cache: Option<CredentialSet>,
    codec: CredentialCodec,
}

/// A single-writer, cached, encrypted credential store.
///
/// Share it between threads with `Arc<CredentialStore>`.  Independent
/// stores (even on the same path) each have their own lock and cache.
pub struct CredentialStore {
    path: PathBuf,
    storage: Box<dyn Storage>,
    inner: Mutex<Inner>,
}

impl CredentialStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a store for the credential file at `path`, sealed with
    /// keys from `keys`.  Nothing is read until the first access.
    pub fn new(path: impl Into<PathBuf>, keys: Arc<dyn KeySource>) -> Self {
        Self::with_storage(path, keys, FsStorage)
    }

    /// Like `new`, but with a custom I/O layer.
    pub fn with_storage(
        path: impl Into<PathBuf>,
        keys: Arc<dyn KeySource>,
        storage: impl Storage + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            storage: Box::new(storage),
            inner: Mutex::new(Inner {
                cache: None,
                codec: CredentialCodec::new(keys),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Return a snapshot of the current credential set.
    pub fn read(&self) -> Result<CredentialSet> {
        self.view(CredentialSet::clone)
    }

    /// Run `f` against the current credential set without cloning it.
    ///
    /// The same re-entrancy rules as [`modify`](Self::modify) apply.
    pub fn view<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CredentialSet) -> R,
    {
        let (_section, mut inner) = self.enter()?;
        let set = self.ensure_loaded(&mut inner)?;
        Ok(f(set))
    }

    /// Apply `f` to the credential set and persist the result.
    ///
    /// `f` works on a private copy.  If it returns `Err` (or panics)
    /// nothing is written and the cache is untouched.  On `Ok` the copy
    /// is encoded and written, and only after the write succeeds does
    /// it become the cached value.
    ///
    /// `f` must not use this store.  A call from the same thread returns
    /// `ReentrantAccess`.  The check is per thread, so a call made from a
    /// thread that `f` spawns and waits on (e.g. `std::thread::scope`)
    /// blocks on the lock `f` is holding and never returns.  Other
    /// stores are free to use from any thread.
    pub fn modify<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut CredentialSet) -> Result<R>,
    {
        let (_section, mut inner) = self.enter()?;
        let mut working = self.ensure_loaded(&mut inner)?.clone();

        let output = f(&mut working)?;

        self.persist(&inner.codec, &working)?;
        inner.cache = Some(working);
        Ok(output)
    }

    /// Re-encrypt the credential file under a new key source.
    ///
    /// The store switches to `new_keys` only once the file sealed with
    /// them has been written.  On failure the old key stays in use.
    pub fn rotate_key(&self, new_keys: Arc<dyn KeySource>) -> Result<()> {
        let (_section, mut inner) = self.enter()?;
        let new_codec = CredentialCodec::new(new_keys);

        let current = self.ensure_loaded(&mut inner)?;
        self.persist(&new_codec, current)?;

        info!(
            path = %self.path.display(),
            keys = %new_codec.key_description(),
            "credential file re-encrypted under new key"
        );
        inner.codec = new_codec;
        Ok(())
    }

    /// Whether the cache has been populated yet.
    pub fn is_loaded(&self) -> Result<bool> {
        let (_section, inner) = self.enter()?;
        Ok(inner.cache.is_some())
    }

    /// Path to the credential file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Enter the exclusive section.
    ///
    /// Calling back into the same store from inside a `view`/`modify`
    /// closure would deadlock on the mutex, so it is refused up front.
    fn enter(&self) -> Result<(Section, MutexGuard<'_, Inner>)> {
        let section = Section::enter(self.id())?;
        let guard = self.inner.lock().unwrap_or_else(|poisoned| {
            // The cache is replaced whole after a successful write, so a
            // panic inside a closure cannot have left it half-updated.
            warn!(path = %self.path.display(), "recovering credential store lock after a panic");
            poisoned.into_inner()
        });
        Ok((section, guard))
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Return the cached set, loading it on a miss.
    fn ensure_loaded<'a>(&self, inner: &'a mut Inner) -> Result<&'a CredentialSet> {
        match inner.cache {
            Some(ref set) => {
                debug!(users = set.len(), "credential cache hit");
                Ok(set)
            }
            None => {
                let loaded = self.load(&inner.codec)?;
                Ok(&*inner.cache.insert(loaded))
            }
        }
    }

    /// Read and decode the credential file, or bootstrap an empty set
    /// when there is no file yet.
    fn load(&self, codec: &CredentialCodec) -> Result<CredentialSet> {
        if !self.storage.exists(&self.path)? {
            info!(
                path = %self.path.display(),
                "no credential file found, starting with an empty user list"
            );
            return Ok(CredentialSet::new());
        }

        let bytes = self.storage.read(&self.path)?;
        let set = codec.decode(&bytes).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "credential file could not be loaded");
            e
        })?;

        debug!(path = %self.path.display(), users = set.len(), "credential file loaded");
        Ok(set)
    }

    /// Encode `set` and write it out.  Does not touch the cache.
    fn persist(&self, codec: &CredentialCodec, set: &CredentialSet) -> Result<()> {
        let bytes = codec.encode(set)?;

        self.storage.write(&self.path, &bytes).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "credential file write failed");
            CredVaultError::Io(e)
        })?;

        info!(path = %self.path.display(), users = set.len(), "credential file saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Re-entrancy guard
// ---------------------------------------------------------------------------

thread_local! {
    /// Stores whose section the current thread is inside.  Threads
    /// spawned from inside a section start with an empty list.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as inside a store's section until dropped.
struct Section {
    id: usize,
}

impl Section {
    fn enter(id: usize) -> Result<Self> {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if held.contains(&id) {
                return Err(CredVaultError::ReentrantAccess);
            }
            held.push(id);
            Ok(Self { id })
        })
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|&id| id == self.id) {
                held.remove(pos);
            }
        });
    }
}
