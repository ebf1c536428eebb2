use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::SnapshotError;

pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Directory of alert snapshots, `unknown_<timestamp>.jpg`.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the frame under a name derived from the current second. The
    /// directory is created on first use.
    pub fn save(&self, frame: &RgbImage) -> Result<PathBuf, SnapshotError> {
        let stamp = chrono::Local::now().format(FILE_TIMESTAMP_FORMAT).to_string();
        self.save_as(frame, &stamp)
    }

    /// Write the frame as `unknown_<stamp>.jpg`, adding `_1`, `_2`, ... when
    /// a snapshot with that stamp already exists.
    pub fn save_as(&self, frame: &RgbImage, stamp: &str) -> Result<PathBuf, SnapshotError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.unused_path(stamp);
        frame.save(&path).map_err(|source| SnapshotError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!("saved snapshot {}", path.display());
        Ok(path)
    }

    fn unused_path(&self, stamp: &str) -> PathBuf {
        let first = self.dir.join(format!("unknown_{}.jpg", stamp));
        if !first.exists() {
            return first;
        }
        (1..)
            .map(|n| self.dir.join(format!("unknown_{}_{}.jpg", stamp, n)))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}
