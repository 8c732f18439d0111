//! Tracking subsystem around the native eye tracking library
//!
//! 1. [`ffi`] - Fixed-layout structures and callback trampolines
//! 2. [`native`] - The [`NativeTracker`] seam and its DLL-backed implementation
//! 3. [`status`] - Status code table
//! 4. [`session`] - Lifecycle state machine with unconditional teardown
//!
//! # Architecture
//!
//! ```text
//! CalibrationBlob ──► TrackingSession ──► NativeTracker ──► vendor DLL
//!                          │                                   │
//!                      GazeStore ◄──── per-eye closures ◄──────┘ (native thread)
//! ```

pub mod ffi;
pub mod native;
pub mod session;
pub mod status;

pub use native::{AGlassLibrary, NativeLoadError, NativeTracker};
pub use session::{open_session, SessionError, Step, TeardownReport, TrackingSession};
pub use status::StatusCode;
