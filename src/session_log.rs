use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::LogError;

pub const HEADER: [&str; 5] = ["Timestamp", "Name", "Age", "Gender", "Emotion"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub emotion: String,
}

impl LogEntry {
    /// Entry stamped with the current local time.
    pub fn now(name: &str, age: i32, gender: &str, emotion: &str) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            name: name.to_string(),
            age,
            gender: gender.to_string(),
            emotion: emotion.to_string(),
        }
    }
}

/// Append-only CSV record of every analyzed face.
pub struct SessionLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl SessionLog {
    /// Open `path` for appending. A new file gets the header row; an existing
    /// one is never rewritten.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let fresh = !path.exists();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
            log::info!("created session log {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> LogEntry {
        LogEntry {
            timestamp: "2024-01-02 03:04:05".to_string(),
            name: name.to_string(),
            age: 30,
            gender: "Man".to_string(),
            emotion: "happy".to_string(),
        }
    }

    #[test]
    fn test_new_log_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = SessionLog::open(&path).unwrap();
        log.append(&entry("alice")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Timestamp,Name,Age,Gender,Emotion\n2024-01-02 03:04:05,alice,30,Man,happy\n"
        );
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        SessionLog::open(&path).unwrap().append(&entry("alice")).unwrap();
        SessionLog::open(&path).unwrap().append(&entry("Unknown")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp,Name,Age,Gender,Emotion");
        assert!(lines[2].contains(",Unknown,"));
    }

    #[test]
    fn test_existing_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "earlier,row\n").unwrap();
        SessionLog::open(&path).unwrap().append(&entry("bob")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("earlier,row\n"));
        assert!(!text.contains("Timestamp"));
    }

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = SessionLog::open(&path).unwrap();
        log.append(&entry("smith, john")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"smith, john\""));
    }

    #[test]
    fn test_entry_now_timestamp_format() {
        let e = LogEntry::now("alice", 30, "Woman", "sad");
        assert!(chrono::NaiveDateTime::parse_from_str(&e.timestamp, TIMESTAMP_FORMAT).is_ok());
    }
}
