//! Fixed-layout structures and callback trampolines of the native tracking library
//!
//! The native callback signature carries no user-data pointer, so the per-eye closures are
//! parked in two process-wide slots and the exported trampolines forward to them. A slot is
//! filled before `aGlass_start_tracking` and cleared only after `aGlass_stop_tracking` has
//! returned, which keeps every closure alive for as long as the library may call it.

use crate::gaze::{Eye, GazeCallback, GazeSample};
use crate::handshake::{CalibrationBlob, DATAGRAM_SIZE};
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::sync::RwLock;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AGlassPoint {
    pub x: f32,
    pub y: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AGlassCalibCoe {
    pub coe: [u8; DATAGRAM_SIZE],
}

/// Argument of `aGlass_init`. `path` points at NUL-terminated UTF-16.
#[repr(C)]
#[derive(Debug)]
pub struct AGlassInitParam {
    pub calib_coe: AGlassCalibCoe,
    pub path_size: c_int,
    pub path: *const u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AGlassGazeData {
    pub timestamp: i64,
    pub valid: c_int,
    pub gaze_point: AGlassPoint,
    pub pupil_radius: f32,
    pub pupil_center: AGlassPoint,
    pub ex_data: [f32; 16],
}

impl From<&AGlassGazeData> for GazeSample {
    fn from(data: &AGlassGazeData) -> Self {
        GazeSample {
            timestamp: data.timestamp,
            valid: data.valid == 1,
            gaze_point: (data.gaze_point.x, data.gaze_point.y),
            pupil_radius: data.pupil_radius,
            pupil_center: (data.pupil_center.x, data.pupil_center.y),
        }
    }
}

pub type GazeCallbackFn = unsafe extern "system" fn(*const AGlassGazeData);

pub type InitFn = unsafe extern "system" fn(*const AGlassInitParam) -> c_int;
pub type LifecycleFn = unsafe extern "system" fn() -> c_int;
pub type StartTrackingFn = unsafe extern "system" fn(GazeCallbackFn, GazeCallbackFn) -> c_int;

/// Init parameter together with the wide path buffer it points into
///
/// Kept boxed for the whole session so the pointer handed to the library stays valid.
pub struct OwnedInitParam {
    param: AGlassInitParam,
    _wide_path: Vec<u16>,
}

impl OwnedInitParam {
    pub fn from_blob(blob: &CalibrationBlob) -> Box<Self> {
        let wide_path = blob.wide_path();
        let param = AGlassInitParam {
            calib_coe: AGlassCalibCoe {
                coe: blob.coefficients,
            },
            path_size: blob.path_len,
            path: wide_path.as_ptr(),
        };
        // Moving the Vec into the box does not move its heap buffer
        Box::new(Self {
            param,
            _wide_path: wide_path,
        })
    }

    pub fn as_ptr(&self) -> *const AGlassInitParam {
        &self.param
    }
}

// SAFETY: the raw path pointer only refers to the owned `_wide_path` buffer
unsafe impl Send for OwnedInitParam {}

static LEFT_CALLBACK: RwLock<Option<GazeCallback>> = RwLock::new(None);
static RIGHT_CALLBACK: RwLock<Option<GazeCallback>> = RwLock::new(None);

fn slot_for(eye: Eye) -> &'static RwLock<Option<GazeCallback>> {
    match eye {
        Eye::Left => &LEFT_CALLBACK,
        Eye::Right => &RIGHT_CALLBACK,
    }
}

/// Parks the closures the trampolines forward to.
pub fn install_callbacks(left: GazeCallback, right: GazeCallback) {
    for (eye, callback) in [(Eye::Left, left), (Eye::Right, right)] {
        let mut slot = slot_for(eye)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(callback);
    }
}

/// Drops the parked closures. Only call once the library no longer invokes the trampolines.
pub fn clear_callbacks() {
    for eye in [Eye::Left, Eye::Right] {
        let mut slot = slot_for(eye)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

fn forward(eye: Eye, data: *const AGlassGazeData) {
    if data.is_null() {
        return;
    }
    // SAFETY: the library passes a pointer to a sample that is valid for the callback duration
    let sample = GazeSample::from(unsafe { &*data });

    let guard = slot_for(eye)
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(callback) = guard.as_ref() {
        // Unwinding into foreign frames is undefined, swallow panics here
        let _ = panic::catch_unwind(AssertUnwindSafe(|| callback(&sample)));
    }
}

pub unsafe extern "system" fn left_eye_trampoline(data: *const AGlassGazeData) {
    forward(Eye::Left, data);
}

pub unsafe extern "system" fn right_eye_trampoline(data: *const AGlassGazeData) {
    forward(Eye::Right, data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::PATH_SIZE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn native_sample_converts_validity_flag() {
        let mut data = AGlassGazeData {
            timestamp: 42,
            valid: 1,
            gaze_point: AGlassPoint { x: 0.25, y: 0.75 },
            ..Default::default()
        };
        let sample = GazeSample::from(&data);
        assert!(sample.valid);
        assert_eq!(sample.timestamp, 42);
        assert_eq!(sample.gaze_point, (0.25, 0.75));

        data.valid = 2;
        assert!(!GazeSample::from(&data).valid);
    }

    #[test]
    fn init_param_points_at_wide_path() {
        let blob = CalibrationBlob {
            coefficients: [7; DATAGRAM_SIZE],
            path: "C:\\calib\\".to_string(),
            path_len: PATH_SIZE,
            received_len: DATAGRAM_SIZE,
        };
        let owned = OwnedInitParam::from_blob(&blob);
        // SAFETY: pointer derived from the live box above
        let param = unsafe { &*owned.as_ptr() };
        assert_eq!(param.path_size, 512);
        assert_eq!(param.calib_coe.coe, [7; DATAGRAM_SIZE]);
        let expected = blob.wide_path();
        // SAFETY: the buffer holds expected.len() code units
        let path = unsafe { std::slice::from_raw_parts(param.path, expected.len()) };
        assert_eq!(path, expected.as_slice());
    }

    #[test]
    fn trampolines_forward_to_parked_closures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let left_hits = Arc::clone(&hits);
        let left: GazeCallback = Arc::new(move |sample: &GazeSample| {
            assert!(sample.valid);
            left_hits.fetch_add(1, Ordering::SeqCst);
        });
        let right: GazeCallback = Arc::new(|_: &GazeSample| {});
        install_callbacks(left, right);

        let data = AGlassGazeData {
            valid: 1,
            ..Default::default()
        };
        unsafe {
            left_eye_trampoline(&data);
            left_eye_trampoline(std::ptr::null());
        }
        clear_callbacks();
        unsafe { left_eye_trampoline(&data) };

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
