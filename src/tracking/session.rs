//! Tracking session with statum state machine over the native lifecycle
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──► Initialized ──► Started ──► Tracking
//!       │                │              │           │
//!       └────────────────┴──────┬───────┴───────────┘
//!                               ▼
//!              teardown: stop_tracking → stop → release
//! ```
//!
//! A failed transition tears the session down before the error is returned. The native handle
//! sits in a drop guard, so a session that is dropped without [`TrackingSession::shutdown`]
//! (panic, cancelled task, early return) is torn down as well.

use super::native::NativeTracker;
use super::status::StatusCode;
use crate::gaze::{Eye, GazeStore};
use crate::handshake::CalibrationBlob;
use statum::{machine, state};
use std::fmt::{self, Display};
use tracing::{debug, error, info, warn};

/// Native lifecycle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Init,
    Start,
    StartTracking,
    StopTracking,
    Stop,
    Release,
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Init => "aGlass_init",
            Step::Start => "aGlass_start",
            Step::StartTracking => "aGlass_start_tracking",
            Step::StopTracking => "aGlass_stop_tracking",
            Step::Stop => "aGlass_stop",
            Step::Release => "aGlass_release",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{step} failed with code {code}: {label}")]
    NativeCall {
        step: Step,
        code: i32,
        label: &'static str,
    },
}

impl SessionError {
    fn from_status(step: Step, status: StatusCode) -> Self {
        SessionError::NativeCall {
            step,
            code: status.code(),
            label: status.label(),
        }
    }
}

/// Outcome of every teardown step, in call order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub steps: Vec<(Step, StatusCode)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|(_, status)| status.is_ok())
    }
}

/// Owns the native tracker and guarantees a single teardown
struct NativeGuard {
    tracker: Box<dyn NativeTracker>,
    torn_down: bool,
}

impl NativeGuard {
    fn check(&self, step: Step, code: i32) -> Result<(), SessionError> {
        let status = StatusCode::from(code);
        if status.is_ok() {
            debug!("{} returned {}", step, status);
            Ok(())
        } else {
            error!("{} failed: {}", step, status);
            Err(SessionError::from_status(step, status))
        }
    }

    /// Best effort: every step runs even if an earlier one failed.
    fn teardown(&mut self) -> TeardownReport {
        if self.torn_down {
            return TeardownReport::default();
        }
        self.torn_down = true;
        info!("Stopping and releasing tracking resources");

        let mut report = TeardownReport::default();
        for step in [Step::StopTracking, Step::Stop, Step::Release] {
            let code = match step {
                Step::StopTracking => self.tracker.stop_tracking(),
                Step::Stop => self.tracker.stop(),
                _ => self.tracker.release(),
            };
            let status = StatusCode::from(code);
            if !status.is_ok() {
                warn!("{} during teardown returned {}", step, status);
            }
            report.steps.push((step, status));
        }

        info!("Tracking resources released");
        report
    }
}

impl Drop for NativeGuard {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!("Tracking session dropped without shutdown, tearing down");
            self.teardown();
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Uninitialized, // Library loaded, nothing called yet
    Initialized,   // Calibration accepted
    Started,       // Module running
    Tracking,      // Callbacks registered
}

#[machine]
pub struct TrackingSession<S: SessionState> {
    guard: NativeGuard,
    store: GazeStore,
}

impl<S: SessionState> TrackingSession<S> {
    pub fn store(&self) -> &GazeStore {
        &self.store
    }

    /// Tears the session down from whatever state it is in.
    pub fn shutdown(mut self) -> TeardownReport {
        self.guard.teardown()
    }

    fn fail<T>(mut self, err: SessionError) -> Result<T, SessionError> {
        self.guard.teardown();
        Err(err)
    }
}

impl TrackingSession<Uninitialized> {
    pub fn create(tracker: Box<dyn NativeTracker>, store: GazeStore) -> Self {
        Self::new(
            NativeGuard {
                tracker,
                torn_down: false,
            },
            store,
        )
    }

    pub fn initialize(
        mut self,
        blob: &CalibrationBlob,
    ) -> Result<TrackingSession<Initialized>, SessionError> {
        info!("Initializing tracker");
        let code = self.guard.tracker.init(blob);
        match self.guard.check(Step::Init, code) {
            Ok(()) => {
                info!("Tracker initialized");
                Ok(self.transition())
            }
            Err(e) => self.fail(e),
        }
    }
}

impl TrackingSession<Initialized> {
    pub fn start(mut self) -> Result<TrackingSession<Started>, SessionError> {
        info!("Starting eye tracking module");
        let code = self.guard.tracker.start();
        match self.guard.check(Step::Start, code) {
            Ok(()) => {
                info!("Module started");
                Ok(self.transition())
            }
            Err(e) => self.fail(e),
        }
    }
}

impl TrackingSession<Started> {
    /// Registers one closure per eye, each writing only its own slot of the store.
    pub fn start_tracking(mut self) -> Result<TrackingSession<Tracking>, SessionError> {
        info!("Starting gaze tracking");
        let left = self.store.slot(Eye::Left).callback();
        let right = self.store.slot(Eye::Right).callback();
        let code = self.guard.tracker.start_tracking(left, right);
        match self.guard.check(Step::StartTracking, code) {
            Ok(()) => {
                info!("Gaze tracking running");
                Ok(self.transition())
            }
            Err(e) => self.fail(e),
        }
    }
}

/// Loads nothing itself: runs init → start → start_tracking on an already loaded tracker.
pub fn open_session(
    tracker: Box<dyn NativeTracker>,
    store: GazeStore,
    blob: &CalibrationBlob,
) -> Result<TrackingSession<Tracking>, SessionError> {
    TrackingSession::create(tracker, store)
        .initialize(blob)?
        .start()?
        .start_tracking()
}
