#![allow(dead_code)]

use gaze_bridge::gaze::GazeCallback;
use gaze_bridge::handshake::{CalibrationBlob, DATAGRAM_SIZE};
use gaze_bridge::sink::{MessageSink, OutboundMessage, SinkError};
use gaze_bridge::tracking::{NativeTracker, Step};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Port that was free a moment ago
pub fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind ephemeral port");
    socket.local_addr().expect("local addr").port()
}

/// UTF-16LE encoded, NUL-padded to one datagram
pub fn utf16_datagram(text: &str) -> Vec<u8> {
    let mut datagram = vec![0u8; DATAGRAM_SIZE];
    for (i, unit) in text.encode_utf16().enumerate() {
        datagram[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    datagram
}

/// Fake runtime service answering the two handshake requests.
///
/// Returns the address requests must go to and a handle yielding the received requests.
pub async fn spawn_runtime(
    reply_port: u16,
    path: &str,
    calibration: Vec<u8>,
) -> (SocketAddr, JoinHandle<Vec<Vec<u8>>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind runtime");
    let addr = socket.local_addr().expect("runtime addr");
    let reply_to: SocketAddr = ([127, 0, 0, 1], reply_port).into();
    let replies = vec![utf16_datagram(path), calibration];

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for reply in replies {
            let mut buf = vec![0u8; 2048];
            let (len, _) = socket.recv_from(&mut buf).await.expect("runtime recv");
            requests.push(buf[..len].to_vec());
            socket.send_to(&reply, reply_to).await.expect("runtime send");
        }
        requests
    });

    (addr, handle)
}

/// Captures every message instead of sending it
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: &OutboundMessage) -> Result<(), SinkError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Shared view into a [`ScriptedTracker`]
#[derive(Clone, Default)]
pub struct TrackerProbe {
    pub calls: Arc<Mutex<Vec<Step>>>,
    pub callbacks: Arc<Mutex<Option<(GazeCallback, GazeCallback)>>>,
    pub init_path: Arc<Mutex<Option<String>>>,
}

impl TrackerProbe {
    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    pub fn callbacks(&self) -> (GazeCallback, GazeCallback) {
        self.callbacks
            .lock()
            .unwrap()
            .clone()
            .expect("callbacks registered")
    }
}

/// Native tracker double returning scripted status codes
pub struct ScriptedTracker {
    probe: TrackerProbe,
    failing: Option<(Step, i32)>,
}

impl ScriptedTracker {
    pub fn new(probe: TrackerProbe) -> Self {
        Self {
            probe,
            failing: None,
        }
    }

    pub fn failing_at(probe: TrackerProbe, step: Step, code: i32) -> Self {
        Self {
            probe,
            failing: Some((step, code)),
        }
    }

    fn record(&mut self, step: Step) -> i32 {
        self.probe.calls.lock().unwrap().push(step);
        match self.failing {
            Some((failing, code)) if failing == step => code,
            _ => 0,
        }
    }
}

impl NativeTracker for ScriptedTracker {
    fn init(&mut self, blob: &CalibrationBlob) -> i32 {
        *self.probe.init_path.lock().unwrap() = Some(blob.path.clone());
        self.record(Step::Init)
    }

    fn start(&mut self) -> i32 {
        self.record(Step::Start)
    }

    fn start_tracking(&mut self, left: GazeCallback, right: GazeCallback) -> i32 {
        *self.probe.callbacks.lock().unwrap() = Some((left, right));
        self.record(Step::StartTracking)
    }

    fn stop_tracking(&mut self) -> i32 {
        self.record(Step::StopTracking)
    }

    fn stop(&mut self) -> i32 {
        self.record(Step::Stop)
    }

    fn release(&mut self) -> i32 {
        self.record(Step::Release)
    }
}
