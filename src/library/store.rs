//! File-backed persistence for the unit registry and topic index.
//!
//! Both files are read in full and written in full. Mutations run inside
//! [`LibraryStore::transaction`], which holds an exclusive lock on a
//! sidecar lock file for the whole load -> mutate -> save cycle. Files are
//! only written when the mutation succeeds, each through a temp file that is
//! persisted over the existing file.
//!
//! Every load records a SHA-256 digest of the bytes read. Saving a snapshot
//! outside a transaction re-checks the digests and refuses to overwrite
//! files that changed in between.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::core::{TopicIndex, UnitRegistry};
use crate::domain::UnitRecord;
use crate::error::{DeckError, DeckResult};

const LOCK_FILE: &str = ".notedeck.lock";

/// In-memory copy of both persisted collections
#[derive(Debug, Clone)]
pub struct LibrarySnapshot {
    pub registry: UnitRegistry,
    pub topics: TopicIndex,
    units_digest: Option<String>,
    topics_digest: Option<String>,
}

/// Exclusive advisory lock, released on drop
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read a file, returning `None` when it does not exist
async fn read_optional(path: &Path) -> DeckResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pretty JSON written through a temp file in the target directory
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> DeckResult<Vec<u8>> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(bytes)
}

/// Registry + topic index persisted as two JSON files
#[derive(Debug, Clone)]
pub struct LibraryStore {
    units_path: PathBuf,
    topics_path: PathBuf,
    lock_path: PathBuf,
}

impl LibraryStore {
    pub fn new(units_path: impl Into<PathBuf>, topics_path: impl Into<PathBuf>) -> Self {
        let units_path = units_path.into();
        let lock_path = units_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(LOCK_FILE);

        Self {
            units_path,
            topics_path: topics_path.into(),
            lock_path,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.units_path(), config.topics_path())
    }

    pub fn units_path(&self) -> &Path {
        &self.units_path
    }

    pub fn topics_path(&self) -> &Path {
        &self.topics_path
    }

    /// Load both collections. Missing or empty files load as empty.
    ///
    /// Records stored without an opaque identifier are given one, and the
    /// registry is written back under the store lock, so every later load
    /// sees the same identifiers.
    pub async fn load(&self) -> DeckResult<LibrarySnapshot> {
        let snapshot = self.read_snapshot().await?;
        if snapshot.registry.units().iter().all(|u| u.uid.is_assigned()) {
            return Ok(snapshot);
        }

        let _lock = self.acquire_lock().await?;
        let mut snapshot = self.read_snapshot().await?;
        if snapshot.registry.assign_missing_uids() > 0 {
            self.write_locked(&mut snapshot)?;
        }
        Ok(snapshot)
    }

    async fn read_snapshot(&self) -> DeckResult<LibrarySnapshot> {
        let units_bytes = read_optional(&self.units_path).await?;
        let topics_bytes = read_optional(&self.topics_path).await?;

        let units: Vec<UnitRecord> = match &units_bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                serde_json::from_slice(bytes)?
            }
            _ => Vec::new(),
        };
        let topics: TopicIndex = match &topics_bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                serde_json::from_slice(bytes)?
            }
            _ => TopicIndex::new(),
        };

        debug!(
            path = %self.units_path.display(),
            units = units.len(),
            "Loaded library"
        );

        Ok(LibrarySnapshot {
            registry: UnitRegistry::from_units(units),
            topics,
            units_digest: units_bytes.as_deref().map(digest),
            topics_digest: topics_bytes.as_deref().map(digest),
        })
    }

    async fn acquire_lock(&self) -> DeckResult<StoreLock> {
        if let Some(dir) = self.lock_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let lock_path = self.lock_path.clone();
        let lock = tokio::task::spawn_blocking(move || StoreLock::acquire(&lock_path))
            .await
            .map_err(std::io::Error::other)??;
        Ok(lock)
    }

    /// Fail if either file changed since `snapshot` was loaded
    async fn check_unchanged(&self, snapshot: &LibrarySnapshot) -> DeckResult<()> {
        for (path, expected) in [
            (&self.units_path, &snapshot.units_digest),
            (&self.topics_path, &snapshot.topics_digest),
        ] {
            let current = read_optional(path).await?.as_deref().map(digest);
            if &current != expected {
                return Err(DeckError::ConcurrentModification(path.clone()));
            }
        }
        Ok(())
    }

    fn write_locked(&self, snapshot: &mut LibrarySnapshot) -> DeckResult<()> {
        let units = write_atomic(&self.units_path, &snapshot.registry)?;
        let topics = write_atomic(&self.topics_path, &snapshot.topics)?;
        snapshot.units_digest = Some(digest(&units));
        snapshot.topics_digest = Some(digest(&topics));

        info!(
            path = %self.units_path.display(),
            units = snapshot.registry.len(),
            "Saved library"
        );
        Ok(())
    }

    /// Save a snapshot obtained from [`load`](Self::load). Fails with
    /// `ConcurrentModification` if the files changed on disk since.
    pub async fn save(&self, snapshot: &mut LibrarySnapshot) -> DeckResult<()> {
        let _lock = self.acquire_lock().await?;
        self.check_unchanged(snapshot).await?;
        self.write_locked(snapshot)
    }

    /// Run `mutate` against a freshly loaded snapshot while holding the
    /// store lock. Nothing is written if `mutate` fails.
    pub async fn transaction<T, F>(&self, mutate: F) -> DeckResult<T>
    where
        F: FnOnce(&mut LibrarySnapshot) -> DeckResult<T>,
    {
        let _lock = self.acquire_lock().await?;
        let mut snapshot = self.read_snapshot().await?;
        snapshot.registry.assign_missing_uids();
        let result = mutate(&mut snapshot)?;
        self.write_locked(&mut snapshot)?;
        Ok(result)
    }
}
