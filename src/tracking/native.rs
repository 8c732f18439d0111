//! Native tracking capability
//!
//! [`NativeTracker`] is the seam between the session state machine and the vendor library.
//! [`AGlassLibrary`] implements it over the dynamically loaded DLL; tests implement it with
//! scripted status codes.

use super::ffi::{
    self, GazeCallbackFn, InitFn, LifecycleFn, OwnedInitParam, StartTrackingFn,
};
use crate::gaze::GazeCallback;
use crate::handshake::CalibrationBlob;
use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lifecycle calls of the tracking library, each returning a raw status code
pub trait NativeTracker: Send {
    fn init(&mut self, blob: &CalibrationBlob) -> i32;

    fn start(&mut self) -> i32;

    /// Registers the per-eye callbacks. They are invoked on a thread owned by the library.
    fn start_tracking(&mut self, left: GazeCallback, right: GazeCallback) -> i32;

    fn stop_tracking(&mut self) -> i32;

    fn stop(&mut self) -> i32;

    fn release(&mut self) -> i32;
}

#[derive(Debug, thiserror::Error)]
pub enum NativeLoadError {
    #[error("Failed to load tracking library {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Symbol {symbol} missing in {path}: {source}")]
    Symbol {
        symbol: &'static str,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// The vendor DLL with its six exported lifecycle functions
pub struct AGlassLibrary {
    init_fn: InitFn,
    start_fn: LifecycleFn,
    start_tracking_fn: StartTrackingFn,
    stop_tracking_fn: LifecycleFn,
    stop_fn: LifecycleFn,
    release_fn: LifecycleFn,
    init_param: Option<Box<OwnedInitParam>>,
    callbacks_installed: bool,
    // Declared last so the function pointers above never outlive the mapping
    _library: Library,
}

impl AGlassLibrary {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NativeLoadError> {
        let path = path.as_ref();
        info!("Loading tracking library from {}", path.display());

        // SAFETY: loading runs the library's initializers; the vendor DLL has none with
        // preconditions on our side
        let library = unsafe { Library::new(path) }.map_err(|source| NativeLoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        let init_fn = symbol::<InitFn>(&library, path, "aGlass_init")?;
        let start_fn = symbol::<LifecycleFn>(&library, path, "aGlass_start")?;
        let start_tracking_fn = symbol::<StartTrackingFn>(&library, path, "aGlass_start_tracking")?;
        let stop_tracking_fn = symbol::<LifecycleFn>(&library, path, "aGlass_stop_tracking")?;
        let stop_fn = symbol::<LifecycleFn>(&library, path, "aGlass_stop")?;
        let release_fn = symbol::<LifecycleFn>(&library, path, "aGlass_release")?;

        info!("Tracking library loaded");
        Ok(Self {
            init_fn,
            start_fn,
            start_tracking_fn,
            stop_tracking_fn,
            stop_fn,
            release_fn,
            init_param: None,
            callbacks_installed: false,
            _library: library,
        })
    }
}

fn symbol<T: Copy>(
    library: &Library,
    path: &Path,
    name: &'static str,
) -> Result<T, NativeLoadError> {
    let mut raw = Vec::with_capacity(name.len() + 1);
    raw.extend_from_slice(name.as_bytes());
    raw.push(0);

    // SAFETY: T is the documented signature of the exported symbol
    unsafe { library.get::<T>(&raw) }
        .map(|sym| *sym)
        .map_err(|source| NativeLoadError::Symbol {
            symbol: name,
            path: path.to_path_buf(),
            source,
        })
}

impl NativeTracker for AGlassLibrary {
    fn init(&mut self, blob: &CalibrationBlob) -> i32 {
        let param = OwnedInitParam::from_blob(blob);
        debug!("aGlass_init with path {:?}", blob.path);
        // SAFETY: param stays alive in self until the library is dropped
        let code = unsafe { (self.init_fn)(param.as_ptr()) };
        self.init_param = Some(param);
        code
    }

    fn start(&mut self) -> i32 {
        // SAFETY: no arguments
        unsafe { (self.start_fn)() }
    }

    fn start_tracking(&mut self, left: GazeCallback, right: GazeCallback) -> i32 {
        ffi::install_callbacks(left, right);
        self.callbacks_installed = true;
        let left_fn: GazeCallbackFn = ffi::left_eye_trampoline;
        let right_fn: GazeCallbackFn = ffi::right_eye_trampoline;
        // SAFETY: trampolines are plain functions valid for the whole process
        unsafe { (self.start_tracking_fn)(left_fn, right_fn) }
    }

    fn stop_tracking(&mut self) -> i32 {
        // SAFETY: no arguments
        let code = unsafe { (self.stop_tracking_fn)() };
        if self.callbacks_installed {
            ffi::clear_callbacks();
            self.callbacks_installed = false;
        }
        code
    }

    fn stop(&mut self) -> i32 {
        // SAFETY: no arguments
        unsafe { (self.stop_fn)() }
    }

    fn release(&mut self) -> i32 {
        // SAFETY: no arguments
        unsafe { (self.release_fn)() }
    }
}
