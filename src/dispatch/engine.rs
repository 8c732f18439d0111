//! Fixed-cadence dispatch loop
//!
//! Every tick snapshots the gaze store, lets the schema build a frame, fires the messages at
//! the sink and appends the log row. The loop sleeps a fixed interval between ticks without
//! correcting for the time a tick took, so it drifts slowly against wall-clock time.

use super::schema::{OutputFrame, OutputSchema};
use crate::gaze::GazeStore;
use crate::recording::{CsvRecorder, RecordingError};
use crate::sink::{MessageSink, SinkError};
use chrono::Local;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Send socket failed, stopping dispatch: {0}")]
    SinkFatal(#[source] SinkError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),
}

#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub interval: Duration,
    /// Refresh a one-line status on stderr every tick
    pub status_line: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(20),
            status_line: true,
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub failed: usize,
    /// Discarded because the socket buffer was full
    pub dropped: usize,
}

/// Totals after the loop stopped
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub ticks: u64,
    pub send_failures: u64,
    pub dropped: u64,
    pub log_path: Option<PathBuf>,
}

pub struct DispatchLoop {
    store: GazeStore,
    schema: Box<dyn OutputSchema>,
    sink: Arc<dyn MessageSink>,
    recorder: Option<CsvRecorder>,
    settings: DispatchSettings,
    ticks: u64,
    send_failures: u64,
    dropped: u64,
}

impl DispatchLoop {
    pub fn new(
        store: GazeStore,
        schema: Box<dyn OutputSchema>,
        sink: Arc<dyn MessageSink>,
        recorder: Option<CsvRecorder>,
        settings: DispatchSettings,
    ) -> Self {
        info!(
            "Creating {} dispatch loop with {:?} interval",
            schema.variant(),
            settings.interval
        );
        Self {
            store,
            schema,
            sink,
            recorder,
            settings,
            ticks: 0,
            send_failures: 0,
            dropped: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one iteration. Only a fatal sink error is returned; anything else is logged.
    pub async fn tick(&mut self) -> Result<TickReport, DispatchError> {
        let (left, right) = self.store.snapshot();
        let frame = self.schema.frame(&left, &right);
        self.ticks += 1;

        let report = self.send_frame(&frame)?;
        self.record(&frame).await;

        if self.settings.status_line {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "\r{}    ", frame.status);
            let _ = stderr.flush();
        }
        trace!("Tick {}: {}", self.ticks, frame.status);
        Ok(report)
    }

    fn send_frame(&mut self, frame: &OutputFrame) -> Result<TickReport, DispatchError> {
        let mut report = TickReport::default();
        for message in &frame.messages {
            match self.sink.send(message) {
                Ok(()) => report.sent += 1,
                Err(e) if e.is_fatal() => {
                    error!("Fatal send error on {}: {}", message.address, e);
                    return Err(DispatchError::SinkFatal(e));
                }
                Err(e) if e.is_dropped() => {
                    debug!("{} not sent: {}", message.address, e);
                    report.dropped += 1;
                    self.dropped += 1;
                }
                Err(e) => {
                    warn!("Failed to send {}: {}", message.address, e);
                    report.failed += 1;
                    self.send_failures += 1;
                }
            }
        }
        Ok(report)
    }

    async fn record(&mut self, frame: &OutputFrame) {
        if let Some(recorder) = &mut self.recorder {
            if let Err(e) = recorder.append(&frame.log_row).await {
                warn!("Failed to append log row: {}", e);
            }
        }
    }

    /// Ticks every interval until `cancel` fires or the sink fails fatally.
    ///
    /// The log file is closed on both exits.
    pub async fn run_until_cancelled(
        mut self,
        cancel: CancellationToken,
    ) -> Result<DispatchSummary, DispatchError> {
        info!("Starting dispatch loop");

        let stats_interval = chrono::Duration::seconds(10);
        let mut last_stats_time = Local::now();
        let mut ticks_since_stats = 0u64;

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancellation received, stopping dispatch loop");
                    break Ok(());
                }

                _ = tokio::time::sleep(self.settings.interval) => {
                    if let Err(e) = self.tick().await {
                        break Err(e);
                    }
                    ticks_since_stats += 1;
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                debug!(
                    "Dispatch stats: {} ticks in last {} seconds, {} send failures and {} dropped total",
                    ticks_since_stats,
                    stats_interval.num_seconds(),
                    self.send_failures,
                    self.dropped
                );
                ticks_since_stats = 0;
                last_stats_time = now;
            }
        };

        if self.settings.status_line {
            eprintln!();
        }

        let log_path = match self.recorder.take() {
            Some(recorder) => match recorder.close().await {
                Ok(path) => Some(path),
                Err(e) => {
                    error!("Failed to close log file: {}", e);
                    None
                }
            },
            None => None,
        };

        outcome?;
        info!(
            "Dispatch loop stopped after {} ticks ({} send failures, {} dropped)",
            self.ticks, self.send_failures, self.dropped
        );
        Ok(DispatchSummary {
            ticks: self.ticks,
            send_failures: self.send_failures,
            dropped: self.dropped,
            log_path,
        })
    }
}
