//! Dispatch of gaze data to the motion-capture receiver
//!
//! # Architecture
//!
//! ```text
//! GazeStore ──► snapshot ──► [OutputSchema] ──► OutputFrame ──► MessageSink
//!                                                   │
//!                                                   └──► CsvRecorder (optional)
//! ```
//!
//! The schema is picked from the configured [`OutputVariant`](crate::transform::OutputVariant)
//! and matches the transform the gaze store applies.

pub mod engine;
pub mod schema;

pub use engine::{DispatchError, DispatchLoop, DispatchSettings, DispatchSummary, TickReport};
pub use schema::{schema_for, AngularSchema, BipolarSchema, OutputFrame, OutputSchema};
