//! Outbound message sink
//!
//! Messages are addressed by an OSC path and carry either one float or an ordered list of
//! floats. [`OscSink`] encodes them as OSC 1.0 packets and fires them at the receiver over UDP
//! without waiting. A full socket buffer drops that single message ([`SinkError::Dropped`]) and
//! an unreachable receiver surfaces as a send error; neither blocks the caller.

use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar(f32),
    List(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub address: &'static str,
    pub payload: Payload,
}

impl OutboundMessage {
    pub fn scalar(address: &'static str, value: f32) -> Self {
        Self {
            address,
            payload: Payload::Scalar(value),
        }
    }

    pub fn list(address: &'static str, values: Vec<f32>) -> Self {
        Self {
            address,
            payload: Payload::List(values),
        }
    }

    /// Encodes the message as an OSC packet.
    pub fn encode(&self) -> Result<Vec<u8>, SinkError> {
        let args = match &self.payload {
            Payload::Scalar(value) => vec![OscType::Float(*value)],
            Payload::List(values) => values.iter().copied().map(OscType::Float).collect(),
        };
        let packet = OscPacket::Message(OscMessage {
            addr: self.address.to_string(),
            args,
        });
        encoder::encode(&packet).map_err(|e| SinkError::Encode(format!("{:?}", e)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to set up message transport for {addr}: {source}")]
    Init {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to send to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Socket not writable right now, the message was discarded
    #[error("Send buffer full, message to {addr} dropped")]
    Dropped { addr: SocketAddr },

    #[error("Transport socket unusable: {0}")]
    Fatal(#[source] io::Error),
}

impl SinkError {
    /// Fatal errors end the dispatch loop; everything else only drops the message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::Fatal(_))
    }

    /// Back-pressure, not a transport failure.
    pub fn is_dropped(&self) -> bool {
        matches!(self, SinkError::Dropped { .. })
    }
}

/// Send-only message transport
pub trait MessageSink: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), SinkError>;
}

/// OSC over UDP, fire-and-forget
#[derive(Debug)]
pub struct OscSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscSink {
    pub async fn connect(target: SocketAddr) -> Result<Self, SinkError> {
        let local = match target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| SinkError::Init { addr: target, source })?;
        // try_send_to only succeeds once the reactor has seen the socket writable
        socket
            .writable()
            .await
            .map_err(|source| SinkError::Init { addr: target, source })?;
        info!("OSC sink ready, sending to {}", target);
        Ok(Self { socket, target })
    }
}

impl MessageSink for OscSink {
    fn send(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        let bytes = message.encode()?;
        match self.socket.try_send_to(&bytes, self.target) {
            Ok(_) => {
                debug!("OSC {} -> {:?}", message.address, message.payload);
                Ok(())
            }
            Err(source) => Err(classify(self.target, source)),
        }
    }
}

fn classify(addr: SocketAddr, source: io::Error) -> SinkError {
    match source.kind() {
        io::ErrorKind::WouldBlock => SinkError::Dropped { addr },
        io::ErrorKind::NotConnected
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::Unsupported => SinkError::Fatal(source),
        _ => SinkError::Send { addr, source },
    }
}
