//! Staging: temp files that are renamed into place once fully written.
//!
//! A frame is never written at its final path. The compressed bytes go to a
//! uniquely named temp file in the same directory, are synced, and then the
//! temp file is renamed over the final name. Readers see either no file or a
//! complete one.
//!
//! ```text
//! {base_path}/
//! ├── cf_2cf24dba5fb0.frame                 # committed frame
//! └── .cf_2cf24dba5fb0.<uuid>.tmp           # in-flight write
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::id::FrameId;

/// Suffix shared by every in-flight temp file.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Temp files untouched for this long belong to a writer that died.
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// Temp file name for an in-flight write of `id`.
///
/// The uuid keeps concurrent writers (including other processes sharing the
/// directory) from ever opening the same temp file.
pub fn staging_name(id: &FrameId) -> String {
    format!(".cf_{}.{}{}", id, Uuid::new_v4().simple(), STAGING_SUFFIX)
}

/// An in-flight frame write.
///
/// Dropping a `StagedFrame` that was never committed removes its temp file,
/// so every early return on the write path cleans up after itself.
#[derive(Debug)]
pub struct StagedFrame {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl StagedFrame {
    /// Create a new temp file for `id` inside `dir`.
    pub fn create(dir: &Path, id: &FrameId) -> io::Result<Self> {
        let path = dir.join(staging_name(id));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: Some(file),
            committed: false,
        })
    }

    /// Write the full payload and fsync it.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("staging file already closed"))?;
        file.write_all(data)?;
        file.sync_all()
    }

    /// Atomically move the temp file to `dest`.
    pub fn commit(mut self, dest: &Path) -> io::Result<()> {
        // Close before rename; some platforms refuse to rename open files.
        self.file = None;
        fs::rename(&self.path, dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFrame {
    fn drop(&mut self) {
        if !self.committed {
            self.file = None;
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to remove staging file"
                    );
                }
            }
        }
    }
}

/// Whether a directory entry name looks like an in-flight temp file.
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(".cf_") && name.ends_with(STAGING_SUFFIX)
}

/// Remove temp files in `dir` last modified more than `max_age` ago.
///
/// Returns how many were removed. Young temp files are left alone since
/// another process sharing the directory may still be writing them.
pub fn sweep_stale(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !is_staging_name(&name.to_string_lossy()) {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age < max_age {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            // Raced with another sweeper or the writer's own cleanup.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    Ok(removed)
}
