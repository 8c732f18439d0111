//! Bridge from an eye tracking runtime to an OSC motion-capture receiver
//!
//! ```text
//! Runtime ──UDP handshake──► CalibrationBlob ──► TrackingSession ──► native callbacks
//!                                                                        │
//!                                  OSC receiver ◄── DispatchLoop ◄── GazeStore
//! ```

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gaze;
pub mod handshake;
pub mod recording;
pub mod sink;
pub mod tracking;
pub mod transform;

pub use error::BridgeError;
