//! FileFrameStore: filesystem-backed, content-addressed frame storage.
//!
//! Implements the FrameStore trait over a single flat directory.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── cf_2cf24dba5fb0.frame   # gzip of the frame text
//! └── cf_e3b0c44298fc.frame
//! ```
//!
//! Files are write-once. `create` on content that is already stored is a
//! no-op that returns the existing id.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::codec::{Codec, CodecError};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::id::FrameId;
use crate::staging::{self, StagedFrame};

/// File name of a stored frame, relative to the base path.
pub fn frame_file_name(id: &FrameId) -> String {
    format!("cf_{}.frame", id)
}

/// Trait for frame storage backends.
///
/// The HTTP layer holds one of these behind an `Arc` and calls it from every
/// request handler concurrently.
pub trait FrameStore: Send + Sync {
    /// Persist frame content, returning its id.
    ///
    /// If the content already exists, returns the id without writing.
    fn create(&self, content: &str) -> Result<FrameId>;

    /// Retrieve frame content by id.
    fn get(&self, id: &FrameId) -> Result<String>;

    /// Check if a frame exists without reading it.
    fn contains(&self, id: &FrameId) -> bool;

    /// Retrieve frame content by a caller-supplied id string.
    ///
    /// A malformed id can never name a stored frame, so it is reported as
    /// `NotFound` rather than as a separate error.
    fn get_str(&self, id: &str) -> Result<String> {
        let id: FrameId = id.parse().map_err(|_| StoreError::not_found(id))?;
        self.get(&id)
    }
}

impl<S: FrameStore + ?Sized> FrameStore for Arc<S> {
    fn create(&self, content: &str) -> Result<FrameId> {
        (**self).create(content)
    }

    fn get(&self, id: &FrameId) -> Result<String> {
        (**self).get(id)
    }

    fn contains(&self, id: &FrameId) -> bool {
        (**self).contains(id)
    }
}

/// Filesystem-based frame store.
#[derive(Debug)]
pub struct FileFrameStore {
    config: StoreConfig,
    codec: Codec,
    /// Per-id writer locks. Entries only live while a write is in flight.
    writers: DashMap<FrameId, Arc<Mutex<()>>>,
}

impl FileFrameStore {
    /// Open a store with the given configuration, initializing its directory.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self {
            codec: Codec::new(config.compression_level),
            config,
            writers: DashMap::new(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open a store at a specific path with default settings.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::with_base_path(path))
    }

    /// Open a read-only store at a specific path.
    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::read_only(path))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Ensure the base directory exists and is writable.
    ///
    /// Idempotent. Read-only stores only check that the directory exists.
    pub fn initialize(&self) -> Result<()> {
        let base = &self.config.base_path;
        let init_err = |source: io::Error| StoreError::Init {
            path: base.clone(),
            source,
        };

        if self.config.read_only {
            let meta = fs::metadata(base).map_err(init_err)?;
            if !meta.is_dir() {
                return Err(init_err(io::Error::other("not a directory")));
            }
            info!(path = %base.display(), "frame store opened read-only");
            return Ok(());
        }

        fs::create_dir_all(base).map_err(init_err)?;

        // Prove we can create files here, not just that the directory exists.
        let probe = base.join(format!(".probe-{}", uuid::Uuid::new_v4().simple()));
        File::create(&probe).map_err(init_err)?;
        fs::remove_file(&probe).map_err(init_err)?;

        let swept =
            staging::sweep_stale(base, staging::STALE_STAGING_AGE).map_err(init_err)?;
        if swept > 0 {
            info!(path = %base.display(), swept, "removed stale staging files");
        }

        info!(path = %base.display(), "frame store ready");
        Ok(())
    }

    /// Get the path where a frame is (or would be) stored.
    pub fn frame_path(&self, id: &FrameId) -> PathBuf {
        self.config.base_path.join(frame_file_name(id))
    }

    /// Whether a readable file is present at `path`.
    ///
    /// Any I/O error counts as absent. This only short-circuits writes; it is
    /// not an authoritative existence report.
    pub fn exists(path: &Path) -> bool {
        File::open(path)
            .and_then(|f| f.metadata())
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn writer_lock(&self, id: &FrameId) -> Arc<Mutex<()>> {
        self.writers.entry(id.clone()).or_default().clone()
    }

    fn release_writer_lock(&self, id: &FrameId, lock: Arc<Mutex<()>>) {
        drop(lock);
        // The map holds the last reference once no writer is waiting on it.
        self.writers.remove_if(id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Compress and atomically persist `content` at `path`.
    fn write_frame(&self, id: &FrameId, content: &str, path: &Path) -> Result<()> {
        let write_err = |source: io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let bytes = self.codec.compress(content.as_bytes()).map_err(|e| match e {
            CodecError::Compress(source) => write_err(source),
            other => write_err(io::Error::other(other)),
        })?;

        let mut staged = StagedFrame::create(&self.config.base_path, id).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound && !self.config.base_path.is_dir() {
                StoreError::Init {
                    path: self.config.base_path.clone(),
                    source: e,
                }
            } else {
                write_err(e)
            }
        })?;
        staged.write_all(&bytes).map_err(write_err)?;
        staged.commit(path).map_err(write_err)?;

        debug!(%id, bytes = bytes.len(), raw = content.len(), "frame written");
        Ok(())
    }
}

impl FrameStore for FileFrameStore {
    fn create(&self, content: &str) -> Result<FrameId> {
        let id = FrameId::from_content(content);
        let path = self.frame_path(&id);

        if Self::exists(&path) {
            debug!(%id, "frame already stored");
            return Ok(id);
        }

        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }

        let lock = self.writer_lock(&id);
        let result = {
            let _guard = lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Another writer may have finished while we waited.
            if Self::exists(&path) {
                debug!(%id, "frame stored by concurrent writer");
                Ok(())
            } else {
                self.write_frame(&id, content, &path)
            }
        };
        self.release_writer_lock(&id, lock);

        result.map(|()| id)
    }

    fn get(&self, id: &FrameId) -> Result<String> {
        let path = self.frame_path(id);

        let data = fs::read(&path).map_err(|e| {
            debug!(%id, error = %e, "frame read failed");
            StoreError::not_found(id.as_str())
        })?;

        self.codec
            .decompress(&data)
            .map_err(|source| StoreError::CorruptData {
                id: id.clone(),
                source,
            })
    }

    fn contains(&self, id: &FrameId) -> bool {
        Self::exists(&self.frame_path(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::thread;
    use tempfile::TempDir;

    fn frame_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_create_and_get() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let content = "<h1>Hello, World!</h1>";
        let id = store.create(content)?;

        assert_eq!(id.as_str().len(), FrameId::LEN);
        assert_eq!(store.get(&id)?, content);
        Ok(())
    }

    #[test]
    fn test_hello_scenario() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = store.create("hello")?;
        assert_eq!(id.as_str(), "2cf24dba5fb0");
        assert_eq!(store.get_str("2cf24dba5fb0")?, "hello");
        assert_eq!(frame_files(temp_dir.path()), vec!["cf_2cf24dba5fb0.frame"]);
        Ok(())
    }

    #[test]
    fn test_roundtrip_empty_and_multibyte() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        for content in ["", "héllo wörld", "日本語のテキスト", "emoji 🎉🚀\n\ttabs"] {
            let id = store.create(content)?;
            assert_eq!(store.get(&id)?, content);
        }
        Ok(())
    }

    #[test]
    fn test_file_is_compressed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let content = "<li>item</li>\n".repeat(200);
        let id = store.create(&content)?;

        let raw = fs::read(store.frame_path(&id))?;
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert!(raw.len() < content.len());
        Ok(())
    }

    #[test]
    fn test_create_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id1 = store.create("Duplicate Me")?;
        let modified = fs::metadata(store.frame_path(&id1))?.modified()?;
        let id2 = store.create("Duplicate Me")?;

        assert_eq!(id1, id2);
        assert_eq!(frame_files(temp_dir.path()).len(), 1);
        assert_eq!(fs::metadata(store.frame_path(&id2))?.modified()?, modified);
        Ok(())
    }

    #[test]
    fn test_existing_file_is_never_overwritten() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = store.create("original")?;
        let before = fs::read(store.frame_path(&id))?;

        let other = FileFrameStore::open(StoreConfig {
            compression_level: 0,
            ..StoreConfig::with_base_path(temp_dir.path())
        })?;
        other.create("original")?;

        assert_eq!(fs::read(store.frame_path(&id))?, before);
        Ok(())
    }

    #[test]
    fn test_unknown_id_not_found() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let err = store.get_str("ffffffffffff").unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[test]
    fn test_malformed_id_not_found() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        for bad in ["", "xyz", "../../etc/passwd", "2cf24dba5fb0a"] {
            let err = store.get_str(bad).unwrap_err();
            assert!(err.is_not_found(), "{:?} should be not found", bad);
        }
        Ok(())
    }

    #[test]
    fn test_corrupt_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = store.create("soon to be corrupted")?;
        fs::write(store.frame_path(&id), b"definitely not a gzip stream")?;

        let err = store.get(&id).unwrap_err();
        assert!(matches!(err, StoreError::CorruptData { .. }));
        Ok(())
    }

    #[test]
    fn test_corrupt_file_trailing_bytes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = store.create("hello")?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(store.frame_path(&id))?;
        io::Write::write_all(&mut file, b"bytes appended by a damaged disk")?;
        drop(file);

        let err = store.get(&id).unwrap_err();
        assert!(matches!(
            err,
            StoreError::CorruptData {
                source: CodecError::TrailingData(_),
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_contains_and_exists() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = store.create("existence test")?;
        assert!(store.contains(&id));

        let missing: FrameId = "000000000000".parse()?;
        assert!(!store.contains(&missing));

        // A directory at the frame path is not a readable frame.
        assert!(!FileFrameStore::exists(temp_dir.path()));
        Ok(())
    }

    #[test]
    fn test_frame_path_naming() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::at_path(temp_dir.path())?;

        let id = FrameId::from_content("hello");
        assert_eq!(
            store.frame_path(&id),
            temp_dir.path().join("cf_2cf24dba5fb0.frame")
        );
        Ok(())
    }

    #[test]
    fn test_initialize_creates_nested_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("a").join("b").join("frames");
        let store = FileFrameStore::at_path(&base)?;

        assert!(base.is_dir());
        store.initialize()?;
        assert!(frame_files(&base).is_empty());
        Ok(())
    }

    #[test]
    fn test_open_sweeps_abandoned_staging_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let id = FrameId::from_content("writer crashed mid-write");
        let abandoned = temp_dir.path().join(staging::staging_name(&id));
        fs::write(&abandoned, b"partial gzip")?;
        File::options()
            .write(true)
            .open(&abandoned)?
            .set_modified(std::time::SystemTime::now() - staging::STALE_STAGING_AGE * 2)?;

        let store = FileFrameStore::at_path(temp_dir.path())?;
        assert!(!abandoned.exists());
        assert!(frame_files(store.base_path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_initialize_fails_on_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "")?;

        let err = FileFrameStore::at_path(&blocker).unwrap_err();
        assert!(matches!(err, StoreError::Init { .. }));
        Ok(())
    }

    #[test]
    fn test_create_after_dir_removed_is_init_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("frames");
        let store = FileFrameStore::at_path(&base)?;
        fs::remove_dir(&base)?;

        let err = store.create("orphan").unwrap_err();
        assert!(matches!(err, StoreError::Init { .. }));
        Ok(())
    }

    #[test]
    fn test_read_only_prevents_writes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileFrameStore::read_only_at(temp_dir.path())?;

        let err = store.create("should fail").unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly));
        assert!(frame_files(temp_dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_read_only_allows_reads_and_dedup() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let writable = FileFrameStore::at_path(temp_dir.path())?;
        let id = writable.create("readable content")?;

        let readonly = FileFrameStore::read_only_at(temp_dir.path())?;
        assert_eq!(readonly.get(&id)?, "readable content");
        assert_eq!(readonly.create("readable content")?, id);
        Ok(())
    }

    #[test]
    fn test_read_only_requires_existing_dir() {
        let err = FileFrameStore::read_only_at("/definitely/not/a/frame/dir").unwrap_err();
        assert!(matches!(err, StoreError::Init { .. }));
    }

    #[test]
    fn test_concurrent_writes() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FileFrameStore::at_path(temp_dir.path())?);

        let content = "Concurrent Data";
        let expected = FrameId::from_content(content);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.create(content).expect("write failed"))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }

        assert_eq!(store.get(&expected)?, content);
        assert_eq!(frame_files(temp_dir.path()).len(), 1);
        assert!(store.writers.is_empty());
        Ok(())
    }

    #[test]
    fn test_arc_store_is_a_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store: Arc<dyn FrameStore> = Arc::new(FileFrameStore::at_path(temp_dir.path())?);

        let id = store.create("through the arc")?;
        assert_eq!(store.get(&id)?, "through the arc");
        Ok(())
    }
}
