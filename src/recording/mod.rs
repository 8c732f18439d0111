//! Optional CSV recording of every dispatch tick
//!
//! One header row per variant, then one row per tick. Missing values are written as empty
//! fields. The first column is the local timestamp in ISO-8601 with microseconds. All file I/O
//! goes through `tokio::fs` so a slow disk never stalls the dispatch task's worker thread.

use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Failed to create log file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One CSV row without the timestamp column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRow(pub Vec<Option<f32>>);

impl LogRow {
    pub fn render(&self, timestamp: &str) -> String {
        let mut line = String::from(timestamp);
        for field in &self.0 {
            line.push(',');
            if let Some(value) = field {
                line.push_str(&format!("{:?}", value));
            }
        }
        line
    }
}

pub struct CsvRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: usize,
}

impl CsvRecorder {
    /// Creates (truncates) the file and writes the header.
    pub async fn create(path: impl AsRef<Path>, header: &str) -> Result<Self, RecordingError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|source| RecordingError::Create {
                path: path.clone(),
                source,
            })?;
        let mut recorder = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };
        recorder.write_line(header).await?;
        info!("Recording enabled, writing to '{}'", recorder.path.display());
        Ok(recorder)
    }

    pub async fn append(&mut self, row: &LogRow) -> Result<(), RecordingError> {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        self.write_line(&row.render(&timestamp)).await?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the file.
    pub async fn close(mut self) -> Result<PathBuf, RecordingError> {
        self.writer
            .shutdown()
            .await
            .map_err(|source| RecordingError::Write {
                path: self.path.clone(),
                source,
            })?;
        info!(
            "Log file '{}' saved ({} rows)",
            self.path.display(),
            self.rows
        );
        Ok(self.path)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), RecordingError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.writer
            .write_all(&bytes)
            .await
            .map_err(|source| RecordingError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_render_as_empty_fields() {
        let row = LogRow(vec![Some(1.0), None, None, Some(-15.0)]);
        assert_eq!(row.render("t"), "t,1.0,,,-15.0");
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut recorder = CsvRecorder::create(&path, "timestamp,a,b").await.unwrap();
        recorder.append(&LogRow(vec![Some(0.5), None])).await.unwrap();
        recorder.append(&LogRow(vec![Some(0.75), Some(0.0)])).await.unwrap();
        assert_eq!(recorder.rows(), 2);
        assert_eq!(recorder.path(), path.as_path());
        let saved = recorder.close().await.unwrap();

        let content = tokio::fs::read_to_string(saved).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,a,b");
        assert!(lines[1].ends_with(",0.5,"));
        assert!(lines[2].ends_with(",0.75,0.0"));
    }

    #[tokio::test]
    async fn unwritable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.csv");
        assert!(matches!(
            CsvRecorder::create(&path, "h").await,
            Err(RecordingError::Create { .. })
        ));
    }

    #[tokio::test]
    async fn rows_written_before_close_are_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.csv");

        let mut recorder = CsvRecorder::create(&path, "timestamp,eyes_closed").await.unwrap();
        for _ in 0..250 {
            recorder.append(&LogRow(vec![Some(1.0)])).await.unwrap();
        }
        recorder.close().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 251);
        assert!(content.lines().skip(1).all(|line| line.ends_with(",1.0")));
    }
}
