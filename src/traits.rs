//! Core data model and the camera session abstraction.
//!
//! Verification routines consume already-acquired frames, device properties
//! and sensor-event streams; the [`CameraSession`] trait is the seam through
//! which a backend (real hardware or a mock) supplies them.

use thiserror::Error;

/// Pixel format representation (e.g., YUYV, RGGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed), used for burst captures.
    pub const YUYV: Self = Self::new(b"YUYV");
    /// 8-bit Bayer RGGB format, used for raw sensitivity captures.
    pub const RGGB: Self = Self::new(b"RGGB");
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Metadata attached to a captured frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureMetadata {
    /// Sensor timestamp in nanoseconds, monotonically increasing within a
    /// capture session.
    pub timestamp_ns: i64,
    /// Sensitivity (ISO-equivalent gain) the frame was captured at, if known.
    pub sensitivity: Option<i64>,
    /// Exposure duration in nanoseconds, if known.
    pub exposure_ns: Option<i64>,
}

/// A captured video frame: packed pixel buffer plus metadata.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Raw pixel data (packed YUYV for burst captures).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of `data`.
    pub fourcc: FourCC,
    /// Capture metadata.
    pub metadata: CaptureMetadata,
}

impl CaptureFrame {
    /// Get RGB values for a pixel at the specified coordinates.
    ///
    /// Returns `Some((r, g, b))` if the coordinates are valid, `None`
    /// otherwise. Assumes YUYV layout (2 bytes per pixel); for odd x
    /// coordinates the Y value of the second pixel in the pair is used with
    /// the shared U/V values.
    #[must_use]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        // YUYV format: [Y0 U Y1 V] repeats, each pair of pixels shares U/V.
        let pair_x = x & !1;
        let offset = ((y * self.width + pair_x) * 2) as usize;

        if offset + 3 >= self.data.len() {
            return None;
        }

        let y_val = if x % 2 == 0 {
            *self.data.get(offset)? // Y0
        } else {
            *self.data.get(offset + 2)? // Y1
        };
        let u = *self.data.get(offset + 1)?;
        let v = *self.data.get(offset + 3)?;

        Some(yuv_to_rgb(y_val, u, v))
    }
}

/// Convert YUV values to RGB using the ITU-R BT.601 formula.
///
/// RGB values are clamped to the 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    let clamp = |val: f32| -> u8 {
        if val < 0.0 {
            0
        } else if val > 255.0 {
            255
        } else {
            #[allow(clippy::cast_possible_truncation)]
            #[allow(clippy::cast_sign_loss)]
            {
                val as u8
            }
        }
    };

    (clamp(r), clamp(g), clamp(b))
}

/// A single color plane of a raw capture, samples normalized to 0-1.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Normalized samples in row-major order.
    pub data: Vec<f32>,
    /// Plane width in samples.
    pub width: u32,
    /// Plane height in samples.
    pub height: u32,
}

/// A planar raw capture produced by a manual capture request.
#[derive(Debug, Clone)]
pub struct RawCapture {
    /// Color planes in sensor order (for Bayer data: R, Gr, Gb, B).
    pub planes: Vec<Plane>,
    /// Capture metadata.
    pub metadata: CaptureMetadata,
}

/// One entry of the device's stream configuration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfiguration {
    /// Pixel format of the stream.
    pub format: FourCC,
    /// Whether this is an input (reprocessing) stream.
    pub input: bool,
    /// Stream width in pixels.
    pub width: u32,
    /// Stream height in pixels.
    pub height: u32,
    /// Minimum supported frame duration in nanoseconds.
    pub min_frame_duration_ns: i64,
}

/// Device identity and capability data, fetched once per test run.
#[derive(Debug, Clone, Default)]
pub struct DeviceProperties {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Supported sensitivity range as a half-open interval `[min, max)`.
    /// `(0, 0)` when the device exposes no manual sensitivity control.
    pub sensitivity_range: (i64, i64),
    /// Supported output stream configurations.
    pub stream_configurations: Vec<StreamConfiguration>,
}

/// A single motion-sensor sample.
#[derive(Debug, Clone, Copy)]
pub struct SensorEvent {
    /// Event timestamp in nanoseconds, same time domain as image timestamps
    /// on a compliant device.
    pub time_ns: i64,
    /// Sample values (x, y, z axes).
    pub values: [f64; 3],
}

/// Motion-sensor event streams captured over one sensing window.
///
/// Each stream is ordered by insertion; insertion order is temporal order.
#[derive(Debug, Clone, Default)]
pub struct SensorEvents {
    /// Gyroscope samples.
    pub gyro: Vec<SensorEvent>,
    /// Accelerometer samples.
    pub accel: Vec<SensorEvent>,
    /// Magnetometer samples.
    pub mag: Vec<SensorEvent>,
}

/// Result of an auto-exposure convergence pass.
#[derive(Debug, Clone, Copy)]
pub struct AutoExposure {
    /// Converged sensitivity (ISO-equivalent gain).
    pub sensitivity: i64,
    /// Converged exposure duration in nanoseconds.
    pub exposure_ns: i64,
}

/// Settings for a capture request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureRequest {
    /// Manual sensitivity; `None` leaves auto-exposure in control.
    pub sensitivity: Option<i64>,
    /// Manual exposure duration in nanoseconds; `None` for auto.
    pub exposure_ns: Option<i64>,
    /// Lock auto-exposure at its converged state.
    pub ae_lock: bool,
    /// Lock auto-white-balance at its converged state.
    pub awb_lock: bool,
}

impl CaptureRequest {
    /// Auto request with AE and AWB locked, as used for burst captures.
    #[must_use]
    pub const fn auto_locked() -> Self {
        Self {
            sensitivity: None,
            exposure_ns: None,
            ae_lock: true,
            awb_lock: true,
        }
    }

    /// Fully manual request at the given sensitivity and exposure.
    #[must_use]
    pub const fn manual(sensitivity: i64, exposure_ns: i64) -> Self {
        Self {
            sensitivity: Some(sensitivity),
            exposure_ns: Some(exposure_ns),
            ae_lock: false,
            awb_lock: false,
        }
    }
}

/// Error type for session and verification operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Device with given index was not found.
    #[error("device {0} not found")]
    DeviceNotFound(u32),
    /// Failed to open device.
    #[error("failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// The device lacks a capability the operation requires.
    #[error("device lacks required capability: {0}")]
    CapabilityUnsupported(String),
    /// A required input was absent or empty.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Device-reported capability data is internally inconsistent.
    #[error("device configuration mismatch: {0}")]
    ConfigurationMismatch(String),
    /// A computed statistic fell outside its allowed threshold or range.
    #[error("tolerance violated: {0}")]
    ToleranceViolation(String),
    /// Error during streaming operation.
    #[error("stream error: {0}")]
    Stream(String),
    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session and verification operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over a device control/capture session.
///
/// All operations are blocking and strictly sequential; a failed call
/// propagates immediately with no retry.
pub trait CameraSession {
    /// Device properties, fetched once when the session was opened.
    fn properties(&self) -> &DeviceProperties;

    /// Run auto-exposure/auto-white-balance convergence, optionally locking
    /// the converged state for subsequent captures.
    fn do_3a(&mut self, lock_ae: bool, lock_awb: bool) -> Result<AutoExposure>;

    /// Capture `count` frames back-to-back under the given request.
    fn capture_burst(&mut self, request: &CaptureRequest, count: usize) -> Result<Vec<CaptureFrame>>;

    /// Capture a single frame under the given request.
    fn capture(&mut self, request: &CaptureRequest) -> Result<CaptureFrame> {
        self.capture_burst(request, 1)?
            .pop()
            .ok_or_else(|| CameraError::Stream("capture returned no frame".to_owned()))
    }

    /// Capture a planar raw frame under the given (manual) request.
    fn capture_raw(&mut self, request: &CaptureRequest) -> Result<RawCapture>;

    /// Start recording motion-sensor events.
    fn start_sensor_events(&mut self) -> Result<()>;

    /// Stop recording and return the motion-sensor events observed since
    /// [`start_sensor_events`](Self::start_sensor_events).
    fn get_sensor_events(&mut self) -> Result<SensorEvents>;
}
