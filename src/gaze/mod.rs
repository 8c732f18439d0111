//! Gaze state store shared between the native callback thread and the dispatch loop
//!
//! ```text
//! native thread ──► left callback ──► GazeSlot (Left)  ──┐
//!               ──► right callback ─► GazeSlot (Right) ──┴──► DispatchLoop::tick (snapshot)
//! ```
//!
//! Each eye owns an independent slot with its own lock, so the two callbacks never serialize
//! each other. A write holds the lock only for the copy of three fields; the dispatch loop reads
//! the same way and never holds a slot lock across a network send.

use crate::transform::Transform;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, MutexGuard};

/// Eye side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eye::Left => write!(f, "left"),
            Eye::Right => write!(f, "right"),
        }
    }
}

/// One per-eye reading as delivered by the tracker
///
/// `pupil_radius` and `pupil_center` are carried along but not used by any output schema.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeSample {
    pub timestamp: i64,
    pub valid: bool,
    pub gaze_point: (f32, f32),
    pub pupil_radius: f32,
    pub pupil_center: (f32, f32),
}

impl GazeSample {
    pub fn valid_at(x: f32, y: f32) -> Self {
        Self {
            valid: true,
            gaze_point: (x, y),
            ..Default::default()
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Latest transformed state of one eye
///
/// `value_a`/`value_b` are `(pitch, yaw)` or `(x', y')` depending on the active transform.
/// When `valid` is false they hold the last valid values and must be ignored by readers
/// that gate on validity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeState {
    pub valid: bool,
    pub value_a: f32,
    pub value_b: f32,
}

/// Callback handed to the native layer for one eye
pub type GazeCallback = Arc<dyn Fn(&GazeSample) + Send + Sync>;

/// Lock-protected state of a single eye
#[derive(Debug)]
pub struct GazeSlot {
    eye: Eye,
    transform: Transform,
    state: Mutex<GazeState>,
}

impl GazeSlot {
    fn new(eye: Eye, transform: Transform) -> Self {
        Self {
            eye,
            transform,
            state: Mutex::new(GazeState::default()),
        }
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    /// Applies a sample: valid samples overwrite the values, invalid ones only clear the flag.
    pub fn update(&self, sample: &GazeSample) {
        // Transform outside the lock
        let values = sample
            .valid
            .then(|| self.transform.apply(sample.gaze_point.0, sample.gaze_point.1));

        let mut state = self.lock();
        state.valid = sample.valid;
        if let Some((a, b)) = values {
            state.value_a = a;
            state.value_b = b;
        }
    }

    pub fn get(&self) -> GazeState {
        *self.lock()
    }

    /// Builds the closure registered with the native layer for this eye.
    pub fn callback(self: &Arc<Self>) -> GazeCallback {
        let slot = Arc::clone(self);
        Arc::new(move |sample: &GazeSample| slot.update(sample))
    }

    // A poisoned slot still holds plain copyable data, keep using it
    fn lock(&self) -> MutexGuard<'_, GazeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Both eye slots, sharing one transform
#[derive(Debug, Clone)]
pub struct GazeStore {
    left: Arc<GazeSlot>,
    right: Arc<GazeSlot>,
}

impl GazeStore {
    pub fn new(transform: Transform) -> Self {
        Self {
            left: Arc::new(GazeSlot::new(Eye::Left, transform)),
            right: Arc::new(GazeSlot::new(Eye::Right, transform)),
        }
    }

    pub fn slot(&self, eye: Eye) -> &Arc<GazeSlot> {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }

    pub fn update(&self, eye: Eye, sample: &GazeSample) {
        self.slot(eye).update(sample);
    }

    /// Reads both eyes, one lock at a time. Returns `(left, right)`.
    pub fn snapshot(&self) -> (GazeState, GazeState) {
        (self.left.get(), self.right.get())
    }
}
