//! Wires handshake, tracking session and dispatch loop into one run
//!
//! ```text
//! sink ──► recorder ──► handshake ──► load library ──► init/start/start_tracking
//!                                                              │
//!                           teardown ◄── dispatch loop ◄───────┘
//! ```

use crate::config::BridgeConfig;
use crate::dispatch::{schema_for, DispatchLoop, DispatchSummary};
use crate::error::BridgeError;
use crate::gaze::GazeStore;
use crate::handshake::HandshakeClient;
use crate::recording::CsvRecorder;
use crate::sink::{MessageSink, OscSink};
use crate::tracking::{open_session, AGlassLibrary, NativeLoadError, NativeTracker};
use crate::transform::Transform;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the bridge against the configured OSC receiver and vendor library.
pub async fn run(
    config: BridgeConfig,
    cancel: CancellationToken,
) -> Result<DispatchSummary, BridgeError> {
    let sink = OscSink::connect(config.sink_addr())
        .await
        .map_err(BridgeError::TransportInit)?;
    run_with(config, cancel, Arc::new(sink), |path| {
        AGlassLibrary::load(path).map(|lib| Box::new(lib) as Box<dyn NativeTracker>)
    })
    .await
}

/// Same as [`run`] with an injected sink and tracker loader.
pub async fn run_with<L>(
    config: BridgeConfig,
    cancel: CancellationToken,
    sink: Arc<dyn MessageSink>,
    load_tracker: L,
) -> Result<DispatchSummary, BridgeError>
where
    L: FnOnce(&Path) -> Result<Box<dyn NativeTracker>, NativeLoadError>,
{
    let variant = config.output.variant;
    info!("Starting gaze bridge with {} output", variant);

    let schema = schema_for(variant);
    let recorder = match config.log_path() {
        Some(path) => Some(CsvRecorder::create(path, schema.csv_header()).await?),
        None => None,
    };

    let client = HandshakeClient::new(config.handshake_settings());
    let blob = tokio::select! {
        result = client.perform() => result?,
        _ = cancel.cancelled() => {
            warn!("Cancelled during handshake");
            return Err(BridgeError::Cancelled);
        }
    };
    info!("Handshake complete, init parameters ready");

    let tracker = load_tracker(&config.native.library_path)?;
    let store = GazeStore::new(Transform::for_variant(variant, config.angular));
    let session = open_session(tracker, store.clone(), &blob)?;
    info!("Eye tracking running, press Ctrl+C to exit");

    let dispatch = DispatchLoop::new(
        store,
        schema,
        sink,
        recorder,
        config.dispatch_settings(),
    );
    let outcome = dispatch.run_until_cancelled(cancel).await;

    let report = session.shutdown();
    if !report.is_clean() {
        warn!("Teardown finished with errors: {:?}", report.steps);
    }

    Ok(outcome?)
}
