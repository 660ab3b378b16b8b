//! Versioned document store
//!
//! Documents are JSON values addressed by slash-separated paths
//! (`tournaments/{id}/participants/{uid}`). Every committed write bumps the
//! document's version. Transactions record the version of each document they
//! read and commit only if none of those versions moved; otherwise the whole
//! transaction body runs again against fresh reads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Attempts before a contended transaction is abandoned
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a document changed while the transaction was running")]
    Conflict,

    #[error("transaction abandoned after {0} conflicting attempts")]
    Contention(u32),

    #[error("document `{0}` already exists")]
    AlreadyExists(String),

    #[error("read of `{0}` after a write in the same transaction")]
    ReadAfterWrite(String),

    #[error("document `{path}` could not be decoded: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("document could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A stored document and the version it was written at
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub data: Value,
}

/// Commit guard: the document at `path` must still be at `version`
/// (`None` = must still be absent)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Precondition {
    pub path: String,
    pub version: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Set { path: String, data: Value },
    Delete { path: String },
}

/// Storage seam
///
/// `commit` must apply every write or none, and must fail with
/// [`StoreError::Conflict`] when any precondition no longer holds.
pub trait Backend: Send + Sync {
    fn read(&self, path: &str) -> Result<Option<Versioned>, StoreError>;

    /// Direct children of `collection` (not nested subcollections), ordered by path
    fn list(&self, collection: &str) -> Result<Vec<(String, Versioned)>, StoreError>;

    fn commit(&self, preconditions: &[Precondition], writes: Vec<Write>) -> Result<(), StoreError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read(&self, path: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).read(path)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Versioned)>, StoreError> {
        (**self).list(collection)
    }

    fn commit(&self, preconditions: &[Precondition], writes: Vec<Write>) -> Result<(), StoreError> {
        (**self).commit(preconditions, writes)
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn read(&self, path: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).read(path)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Versioned)>, StoreError> {
        (**self).list(collection)
    }

    fn commit(&self, preconditions: &[Precondition], writes: Vec<Write>) -> Result<(), StoreError> {
        (**self).commit(preconditions, writes)
    }
}

#[derive(Default)]
struct MemoryState {
    docs: BTreeMap<String, Versioned>,
    /// Last version handed out; shared by all documents
    clock: u64,
}

/// In-process backend
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory backend lock poisoned".to_string()))
    }
}

impl Backend for MemoryBackend {
    fn read(&self, path: &str) -> Result<Option<Versioned>, StoreError> {
        Ok(self.lock()?.docs.get(path).cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Versioned)>, StoreError> {
        let prefix = format!("{collection}/");
        let state = self.lock()?;
        Ok(state
            .docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect())
    }

    fn commit(&self, preconditions: &[Precondition], writes: Vec<Write>) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        for pre in preconditions {
            let current = state.docs.get(&pre.path).map(|d| d.version);
            if current != pre.version {
                return Err(StoreError::Conflict);
            }
        }

        if writes.is_empty() {
            return Ok(());
        }
        state.clock += 1;
        let version = state.clock;
        for write in writes {
            match write {
                Write::Set { path, data } => {
                    state.docs.insert(path, Versioned { version, data });
                }
                Write::Delete { path } => {
                    state.docs.remove(&path);
                }
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(path: &str, data: Value) -> Result<T, StoreError> {
    serde_json::from_value(data).map_err(|source| StoreError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Typed access to a [`Backend`]
pub struct Store<B = MemoryBackend> {
    backend: B,
    max_attempts: u32,
}

impl Store<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: Backend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        self.backend
            .read(path)?
            .map(|doc| decode(path, doc.data))
            .transpose()
    }

    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        self.backend
            .list(collection)?
            .into_iter()
            .map(|(path, doc)| decode(&path, doc.data))
            .collect()
    }

    /// Unconditional overwrite
    pub fn set<T: Serialize>(&self, path: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value)?;
        self.backend.commit(
            &[],
            vec![Write::Set {
                path: path.to_string(),
                data,
            }],
        )
    }

    /// Write only if nothing exists at `path`
    pub fn create<T: Serialize>(&self, path: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value)?;
        let guard = Precondition {
            path: path.to_string(),
            version: None,
        };
        let write = Write::Set {
            path: path.to_string(),
            data,
        };
        match self.backend.commit(&[guard], vec![write]) {
            Err(StoreError::Conflict) => Err(StoreError::AlreadyExists(path.to_string())),
            other => other,
        }
    }

    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.backend.commit(
            &[],
            vec![Write::Delete {
                path: path.to_string(),
            }],
        )
    }

    /// Run `body` as one atomic unit
    ///
    /// An `Err` from `body` aborts with nothing written. A commit conflict
    /// discards the buffered writes and runs `body` again, up to the attempt
    /// limit, after which [`StoreError::Contention`] is returned.
    pub fn run_transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut Transaction<'_, B>) -> Result<T, E>,
        E: From<StoreError>,
    {
        for attempt in 1..=self.max_attempts {
            let mut tx = Transaction::new(&self.backend);
            let value = body(&mut tx)?;
            match tx.commit() {
                Ok(()) => return Ok(value),
                Err(StoreError::Conflict) => {
                    tracing::debug!(attempt, "transaction conflict, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::warn!(attempts = self.max_attempts, "transaction abandoned under contention");
        Err(StoreError::Contention(self.max_attempts).into())
    }
}

/// Reads and buffered writes of one transaction attempt
pub struct Transaction<'a, B> {
    backend: &'a B,
    reads: BTreeMap<String, Option<u64>>,
    writes: BTreeMap<String, Value>,
}

impl<'a, B: Backend> Transaction<'a, B> {
    fn new(backend: &'a B) -> Self {
        Self {
            backend,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Read a document and pin its version for commit
    pub fn get<T: DeserializeOwned>(&mut self, path: &str) -> Result<Option<T>, StoreError> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite(path.to_string()));
        }
        let doc = self.backend.read(path)?;
        self.reads
            .entry(path.to_string())
            .or_insert(doc.as_ref().map(|d| d.version));
        doc.map(|d| decode(path, d.data)).transpose()
    }

    pub fn exists(&mut self, path: &str) -> Result<bool, StoreError> {
        Ok(self.get::<Value>(path)?.is_some())
    }

    pub fn set<T: Serialize>(&mut self, path: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value)?;
        self.writes.insert(path.to_string(), data);
        Ok(())
    }

    /// Apply buffered writes; a read-only attempt still validates its reads
    fn commit(self) -> Result<(), StoreError> {
        if self.reads.is_empty() && self.writes.is_empty() {
            return Ok(());
        }
        let preconditions: Vec<Precondition> = self
            .reads
            .into_iter()
            .map(|(path, version)| Precondition { path, version })
            .collect();
        let writes = self
            .writes
            .into_iter()
            .map(|(path, data)| Write::Set { path, data })
            .collect();
        self.backend.commit(&preconditions, writes)
    }
}
