//! UDP handshake with the tracker runtime service
//!
//! Obtains the device path and the calibration coefficients the native library needs before
//! tracking can start. Two fixed round-trips, no retries:
//!
//! ```text
//! client (send socket)                        runtime                 client (recv socket)
//!   │ ── "path" + zeros (1024 B) ──────────────► │                            │
//!   │                                            │ ── UTF-16LE path ────────► │
//!   │ ── "request" + zeros (1024 B) ───────────► │                            │
//!   │                                            │ ── calibration bytes ────► │
//! ```
//!
//! Both sockets are owned by [`HandshakeClient::perform`] and dropped on every exit path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

/// Size of every handshake datagram and of the calibration buffer
pub const DATAGRAM_SIZE: usize = 1024;

/// Path size field handed to the native init call.
///
/// The runtime protocol expects this fixed value regardless of the actual path length.
pub const PATH_SIZE: i32 = 512;

const PATH_REQUEST: &[u8] = b"path";
const CALIBRATION_REQUEST: &[u8] = b"request";

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Handshake timed out after {timeout:?} waiting for {stage}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("Failed to bind {role} socket on {addr}: {source}")]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket error during {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl HandshakeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HandshakeError::Timeout { .. })
    }
}

/// Per-device initialization data returned by the runtime
#[derive(Clone, PartialEq, Eq)]
pub struct CalibrationBlob {
    /// Calibration coefficients; bytes past `received_len` stay zero
    pub coefficients: [u8; DATAGRAM_SIZE],
    /// Device path reported by the runtime, trailing NULs removed
    pub path: String,
    /// Always [`PATH_SIZE`]
    pub path_len: i32,
    /// Number of calibration bytes actually received
    pub received_len: usize,
}

impl CalibrationBlob {
    /// Path as NUL-terminated UTF-16, truncated to [`PATH_SIZE`] code units.
    pub fn wide_path(&self) -> Vec<u16> {
        let mut wide: Vec<u16> = self
            .path
            .encode_utf16()
            .take(PATH_SIZE as usize - 1)
            .collect();
        wide.push(0);
        wide
    }
}

impl std::fmt::Debug for CalibrationBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationBlob")
            .field("path", &self.path)
            .field("path_len", &self.path_len)
            .field("received_len", &self.received_len)
            .finish_non_exhaustive()
    }
}

/// Endpoints and timeout for one handshake
#[derive(Clone, Debug)]
pub struct HandshakeSettings {
    /// Where the requests are sent
    pub runtime_addr: SocketAddr,
    /// Local address the replies arrive on
    pub recv_addr: SocketAddr,
    /// Per-receive timeout
    pub timeout: Duration,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            runtime_addr: SocketAddr::new(localhost, 2000),
            recv_addr: SocketAddr::new(localhost, 2001),
            timeout: Duration::from_secs(5),
        }
    }
}

pub struct HandshakeClient {
    settings: HandshakeSettings,
}

impl HandshakeClient {
    pub fn new(settings: HandshakeSettings) -> Self {
        Self { settings }
    }

    /// Runs both round-trips and assembles the calibration blob.
    pub async fn perform(&self) -> Result<CalibrationBlob, HandshakeError> {
        info!(
            "Starting handshake with runtime at {} (replies on {})",
            self.settings.runtime_addr, self.settings.recv_addr
        );

        let receiver = UdpSocket::bind(self.settings.recv_addr)
            .await
            .map_err(|source| HandshakeError::Bind {
                role: "receive",
                addr: self.settings.recv_addr,
                source,
            })?;
        let unspecified = unspecified_for(self.settings.runtime_addr);
        let sender = UdpSocket::bind(unspecified)
            .await
            .map_err(|source| HandshakeError::Bind {
                role: "send",
                addr: unspecified,
                source,
            })?;

        let result = self.exchange(&sender, &receiver).await;
        if let Err(e) = &result {
            error!("Handshake failed: {}", e);
        }
        // sender and receiver are closed here on every path
        result
    }

    async fn exchange(
        &self,
        sender: &UdpSocket,
        receiver: &UdpSocket,
    ) -> Result<CalibrationBlob, HandshakeError> {
        let mut buf = [0u8; DATAGRAM_SIZE];

        debug!("-> 'path' request ({} bytes)", DATAGRAM_SIZE);
        self.send_request(sender, PATH_REQUEST, "path request").await?;
        let len = self.receive(receiver, &mut buf, "path reply").await?;
        let path = decode_path(&buf[..len]);
        info!("<- Runtime reported path: {}", path);

        debug!("-> 'request' request ({} bytes)", DATAGRAM_SIZE);
        self.send_request(sender, CALIBRATION_REQUEST, "calibration request")
            .await?;
        buf.fill(0);
        let received_len = self.receive(receiver, &mut buf, "calibration reply").await?;
        info!("<- Runtime sent calibration data ({} bytes)", received_len);

        let mut coefficients = [0u8; DATAGRAM_SIZE];
        coefficients[..received_len].copy_from_slice(&buf[..received_len]);

        Ok(CalibrationBlob {
            coefficients,
            path,
            path_len: PATH_SIZE,
            received_len,
        })
    }

    async fn send_request(
        &self,
        sender: &UdpSocket,
        request: &[u8],
        stage: &'static str,
    ) -> Result<(), HandshakeError> {
        let datagram = padded_request(request);
        sender
            .send_to(&datagram, self.settings.runtime_addr)
            .await
            .map(|_| ())
            .map_err(|source| HandshakeError::Io { stage, source })
    }

    async fn receive(
        &self,
        receiver: &UdpSocket,
        buf: &mut [u8],
        stage: &'static str,
    ) -> Result<usize, HandshakeError> {
        match tokio::time::timeout(self.settings.timeout, receiver.recv_from(buf)).await {
            Ok(Ok((len, from))) => {
                debug!("Received {} bytes from {} for {}", len, from, stage);
                Ok(len)
            }
            Ok(Err(source)) => Err(HandshakeError::Io { stage, source }),
            Err(_) => Err(HandshakeError::Timeout {
                stage,
                timeout: self.settings.timeout,
            }),
        }
    }
}

/// Runs the handshake against `runtime_address`, receiving replies on `local_recv_port`
/// of the runtime's interface.
pub async fn perform_handshake(
    runtime_address: SocketAddr,
    local_recv_port: u16,
    timeout: Duration,
) -> Result<CalibrationBlob, HandshakeError> {
    let settings = HandshakeSettings {
        runtime_addr: runtime_address,
        recv_addr: SocketAddr::new(runtime_address.ip(), local_recv_port),
        timeout,
    };
    HandshakeClient::new(settings).perform().await
}

/// ASCII request left-aligned in a zeroed 1024-byte datagram.
pub fn padded_request(request: &[u8]) -> [u8; DATAGRAM_SIZE] {
    let mut datagram = [0u8; DATAGRAM_SIZE];
    let len = request.len().min(DATAGRAM_SIZE);
    datagram[..len].copy_from_slice(&request[..len]);
    datagram
}

/// Decodes a UTF-16LE payload and strips trailing NULs. A dangling odd byte is ignored.
pub fn decode_path(payload: &[u8]) -> String {
    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>()
        .trim_end_matches('\0')
        .to_string()
}

fn unspecified_for(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_zero_padded() {
        let datagram = padded_request(b"request");
        assert_eq!(datagram.len(), DATAGRAM_SIZE);
        assert_eq!(&datagram[..7], b"request");
        assert!(datagram[7..].iter().all(|b| *b == 0));
    }

    #[test]
    fn path_is_decoded_and_trimmed() {
        let mut payload = [0u8; DATAGRAM_SIZE];
        for (i, unit) in "D:\\aGlass\\".encode_utf16().enumerate() {
            payload[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_path(&payload), "D:\\aGlass\\");
        assert_eq!(decode_path(&[]), "");
        assert_eq!(decode_path(&[b'a', 0, b'b']), "a");
    }

    #[test]
    fn wide_path_is_nul_terminated_and_bounded() {
        let blob = CalibrationBlob {
            coefficients: [0; DATAGRAM_SIZE],
            path: "x".repeat(600),
            path_len: PATH_SIZE,
            received_len: 0,
        };
        let wide = blob.wide_path();
        assert_eq!(wide.len(), PATH_SIZE as usize);
        assert_eq!(wide.last(), Some(&0));
    }
}
