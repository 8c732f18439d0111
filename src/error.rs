//! Top-level error taxonomy of a bridge run

use crate::dispatch::DispatchError;
use crate::handshake::HandshakeError;
use crate::recording::RecordingError;
use crate::sink::SinkError;
use crate::tracking::{NativeLoadError, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Runtime service did not complete the handshake; `Timeout` is the common case
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Message sink could not be set up, nothing was started
    #[error("Transport init error: {0}")]
    TransportInit(#[source] SinkError),

    #[error("Native load error: {0}")]
    NativeLoad(#[from] NativeLoadError),

    /// Non-zero status from a lifecycle transition
    #[error("Native call error: {0}")]
    NativeCall(#[from] SessionError),

    #[error("Runtime loop error: {0}")]
    RuntimeLoop(#[from] DispatchError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Cancelled before tracking started")]
    Cancelled,
}

impl BridgeError {
    pub fn is_handshake_timeout(&self) -> bool {
        matches!(self, BridgeError::Handshake(e) if e.is_timeout())
    }
}
