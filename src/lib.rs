//! Cam-Verify: a camera compliance verification toolkit.
//!
//! Drives a camera through a control/capture session and checks captured
//! imagery and sensor telemetry against statistical and temporal correctness
//! properties: locked-burst consistency (patch-mean stability and frame-rate
//! adherence), noise-versus-gain profiling, and cross-domain timestamp
//! alignment between image and motion-sensor streams.
//!
//! Trait-based session abstractions enable both production use with real
//! hardware and testing with mock sessions.

pub mod device;
pub mod image;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use device::V4l2Session;
pub use image::PatchRegion;
pub use traits::{
    AutoExposure, CameraError, CameraSession, CaptureFrame, CaptureMetadata, CaptureRequest,
    DeviceProperties, FourCC, Plane, RawCapture, Result, SensorEvent, SensorEvents,
    StreamConfiguration,
};
pub use validation::{
    profile_raw_sensitivity, run_locked_burst_check, run_unified_timestamp_check,
    verify_locked_burst, verify_unified_timestamps, BurstCheckConfig, BurstReport,
    SensitivitySweepConfig, SweepSample, TimestampReport,
};
