//! Failure kinds of the monitoring loop, one per stage.

use std::path::PathBuf;

use thiserror::Error;

/// The capture device produced no frame. Ends the loop.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no frame from capture device: {0:#}")]
    Read(anyhow::Error),
    #[error("capture device closed")]
    Closed,
}

/// Face analysis failed for a whole frame. The frame is still displayed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("face analysis failed: {0:#}")]
    Model(anyhow::Error),
}

/// Identity lookup failed. Always resolved to "Unknown".
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("face region is empty")]
    EmptyCrop,
    #[error("identity matching failed: {0:#}")]
    Model(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification credentials are not configured")]
    NotConfigured,
    #[error("cannot attach {path}: {source}")]
    Attach {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot create snapshot directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("session log i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("session log csv: {0}")]
    Csv(#[from] csv::Error),
}

/// The display window failed. Ends the loop.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display window: {0}")]
    Window(String),
}
