//! Compliance verification procedures.
//!
//! Three independent pipelines, each reducing acquired captures to scalar
//! statistics and comparing them against thresholds:
//!
//! - [`verify_locked_burst`]: patch-mean stability and frame-rate adherence
//!   of a burst captured under locked AE/AWB.
//! - [`profile_raw_sensitivity`]: noise (variance) versus gain sweep at
//!   constant exposure-gain product; a diagnostic profile, not a verdict.
//! - [`verify_unified_timestamps`]: image and motion-sensor timestamps share
//!   one time domain.
//!
//! A failing check reports the offending computed quantity and the threshold
//! it violated, never a bare failure.

use std::time::Duration;

use tracing::debug;

use crate::image::{patch_means, plane_patch_variance, PatchRegion};
use crate::traits::{
    AutoExposure, CameraError, CameraSession, CaptureFrame, CaptureRequest, DeviceProperties,
    Result, SensorEvent, SensorEvents,
};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Configuration for the locked-burst consistency check.
#[derive(Debug, Clone)]
pub struct BurstCheckConfig {
    /// Number of frames captured back-to-back.
    pub burst_len: usize,
    /// Maximum allowed per-channel patch-mean spread (normalized 0-1 scale).
    pub spread_threshold: f64,
    /// Allowed shortfall of measured FPS below the advertised maximum.
    pub fps_tolerance: f64,
    /// Patch over which per-frame means are computed.
    pub patch: PatchRegion,
}

impl Default for BurstCheckConfig {
    fn default() -> Self {
        Self {
            burst_len: 10,
            spread_threshold: 0.005,
            fps_tolerance: 2.0,
            patch: PatchRegion::CENTER,
        }
    }
}

/// Diagnostics from a burst consistency check.
#[derive(Debug, Clone, Copy)]
pub struct BurstReport {
    /// Per-channel (R, G, B) patch-mean spreads.
    pub spreads: [f64; 3],
    /// Measured frame rate, derived from the worst inter-frame gap.
    pub actual_fps: f64,
    /// Maximum frame rate advertised for the captured stream configuration.
    pub max_fps: f64,
}

/// Verify patch-mean stability and frame-rate adherence of a locked burst.
///
/// Per-channel means must stay within `spread_threshold` across the burst,
/// and the burst must have sustained the advertised maximum frame rate for
/// the captured resolution/format within `fps_tolerance`. The frame rate is
/// derived from the largest inter-frame timestamp gap: the slowest interval
/// determines sustained throughput.
pub fn verify_locked_burst(
    frames: &[CaptureFrame],
    props: &DeviceProperties,
    config: &BurstCheckConfig,
) -> Result<BurstReport> {
    let first = frames
        .first()
        .ok_or_else(|| CameraError::Precondition("capture burst is empty".to_owned()))?;
    if frames.len() < 2 {
        return Err(CameraError::Precondition(
            "capture burst needs at least two frames to derive a frame rate".to_owned(),
        ));
    }

    // Per-channel mean sequences over the burst.
    let mut r_means = Vec::with_capacity(frames.len());
    let mut g_means = Vec::with_capacity(frames.len());
    let mut b_means = Vec::with_capacity(frames.len());
    for frame in frames {
        let (r, g, b) = patch_means(frame, &config.patch)?;
        r_means.push(r);
        g_means.push(g);
        b_means.push(b);
    }

    let mut spreads = [0.0f64; 3];
    let channels = [("R", &r_means), ("G", &g_means), ("B", &b_means)];
    for (slot, (channel, means)) in spreads.iter_mut().zip(channels) {
        let spread = sequence_spread(means);
        debug!(channel, spread, "patch mean spread");
        if spread >= config.spread_threshold {
            return Err(CameraError::ToleranceViolation(format!(
                "channel {channel} patch mean spread {spread:.6} >= threshold {:.6}, \
                 AE/AWB lock is not holding",
                config.spread_threshold
            )));
        }
        *slot = spread;
    }

    let max_fps = advertised_max_fps(props, first)?;
    let actual_fps = measured_fps(frames)?;
    debug!(actual_fps, max_fps, "burst frame rate");

    if actual_fps > max_fps {
        return Err(CameraError::ToleranceViolation(format!(
            "measured {actual_fps:.1} fps exceeds advertised maximum {max_fps:.1} fps"
        )));
    }
    if actual_fps < max_fps - config.fps_tolerance {
        return Err(CameraError::ToleranceViolation(format!(
            "measured {actual_fps:.1} fps is more than {:.1} fps below advertised \
             maximum {max_fps:.1} fps",
            config.fps_tolerance
        )));
    }

    Ok(BurstReport {
        spreads,
        actual_fps,
        max_fps,
    })
}

/// Run 3A with AE/AWB locks, capture a locked burst and verify it.
pub fn run_locked_burst_check<S: CameraSession>(
    session: &mut S,
    config: &BurstCheckConfig,
) -> Result<BurstReport> {
    // Converge 3A prior to capture, then hold the locks for the burst.
    session.do_3a(true, true)?;
    let request = CaptureRequest::auto_locked();
    let frames = session.capture_burst(&request, config.burst_len)?;
    verify_locked_burst(&frames, session.properties(), config)
}

fn sequence_spread(values: &[f64]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
    }
    max - min
}

/// Find the advertised maximum frame rate for the captured stream.
///
/// The stream configuration table is matched exactly on format, output
/// direction and dimensions; a missing entry means the device cannot be
/// evaluated at this configuration.
fn advertised_max_fps(props: &DeviceProperties, frame: &CaptureFrame) -> Result<f64> {
    let entry = props
        .stream_configurations
        .iter()
        .find(|cfg| {
            cfg.format == frame.fourcc
                && !cfg.input
                && cfg.width == frame.width
                && cfg.height == frame.height
        })
        .ok_or_else(|| {
            CameraError::ConfigurationMismatch(format!(
                "no output stream configuration for {:?} {}x{}",
                frame.fourcc, frame.width, frame.height
            ))
        })?;

    if entry.min_frame_duration_ns <= 0 {
        return Err(CameraError::ConfigurationMismatch(format!(
            "stream configuration advertises non-positive frame duration {} ns",
            entry.min_frame_duration_ns
        )));
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(NANOS_PER_SEC / entry.min_frame_duration_ns as f64)
}

/// Derive the sustained frame rate from the worst inter-frame gap.
fn measured_fps(frames: &[CaptureFrame]) -> Result<f64> {
    let mut max_delta = 0i64;
    for pair in frames.windows(2) {
        let (prev, next) = match pair {
            [prev, next] => (prev, next),
            _ => continue,
        };
        let delta = next.metadata.timestamp_ns - prev.metadata.timestamp_ns;
        if delta <= 0 {
            return Err(CameraError::Precondition(format!(
                "burst timestamps are not monotonically increasing: {} -> {}",
                prev.metadata.timestamp_ns, next.metadata.timestamp_ns
            )));
        }
        max_delta = max_delta.max(delta);
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(NANOS_PER_SEC / max_delta as f64)
}

/// Configuration for the raw sensitivity sweep.
#[derive(Debug, Clone)]
pub struct SensitivitySweepConfig {
    /// Sensitivity increment between sweep steps.
    pub step: i64,
    /// Patch over which variance is measured.
    pub patch: PatchRegion,
    /// Index of the raw plane to measure (1 = Gr for Bayer data).
    pub plane_index: usize,
}

impl Default for SensitivitySweepConfig {
    fn default() -> Self {
        Self {
            step: 1000,
            patch: PatchRegion::CENTER,
            plane_index: 1,
        }
    }
}

/// One step of the sensitivity sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepSample {
    /// Requested sensitivity for this step.
    pub sensitivity: i64,
    /// Derived exposure duration in nanoseconds.
    pub exposure_ns: i64,
    /// Measured patch variance of the raw plane.
    pub variance: f64,
}

/// Sweep sensitivity across the device's supported range and measure noise.
///
/// Exposure is derived per step as `round(s_ref * e_ref / s)` so that the
/// total exposure-gain product stays at the reference AE result. Produces an
/// ordered profile of (sensitivity, exposure, variance); noise is expected to
/// grow with gain, but this routine records the profile rather than judging
/// it.
pub fn profile_raw_sensitivity<S: CameraSession>(
    session: &mut S,
    reference: AutoExposure,
    config: &SensitivitySweepConfig,
) -> Result<Vec<SweepSample>> {
    let (sens_min, sens_max) = session.properties().sensitivity_range;
    if sens_min <= 0 || sens_max <= sens_min {
        return Err(CameraError::Precondition(format!(
            "device sensitivity range [{sens_min}, {sens_max}) is not sweepable"
        )));
    }
    if config.step <= 0 {
        return Err(CameraError::Precondition(format!(
            "sweep step must be positive, got {}",
            config.step
        )));
    }
    if reference.sensitivity <= 0 || reference.exposure_ns <= 0 {
        return Err(CameraError::Precondition(format!(
            "reference AE result (s={}, e={} ns) is not positive",
            reference.sensitivity, reference.exposure_ns
        )));
    }

    let product = reference.sensitivity * reference.exposure_ns;

    let mut samples = Vec::new();
    let mut sensitivity = sens_min;
    while sensitivity < sens_max {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let exposure_ns = (product as f64 / sensitivity as f64).round() as i64;
        if exposure_ns <= 0 {
            return Err(CameraError::Precondition(format!(
                "derived exposure rounds to zero at sensitivity {sensitivity}"
            )));
        }

        let request = CaptureRequest::manual(sensitivity, exposure_ns);
        let raw = session.capture_raw(&request)?;
        let plane = raw.planes.get(config.plane_index).ok_or_else(|| {
            CameraError::Precondition(format!(
                "raw capture has {} planes, plane {} requested",
                raw.planes.len(),
                config.plane_index
            ))
        })?;
        let variance = plane_patch_variance(plane, &config.patch)?;

        debug!(sensitivity, exposure_ns, variance, "sensitivity sweep sample");
        samples.push(SweepSample {
            sensitivity,
            exposure_ns,
            variance,
        });

        sensitivity += config.step;
    }

    Ok(samples)
}

/// First/last event timestamps observed per sensor stream, in nanoseconds.
#[derive(Debug, Clone, Copy)]
pub struct TimestampReport {
    /// Gyroscope (first, last) event timestamps.
    pub gyro: (i64, i64),
    /// Accelerometer (first, last) event timestamps.
    pub accel: (i64, i64),
    /// Magnetometer (first, last) event timestamps.
    pub mag: (i64, i64),
}

/// Verify that motion-sensor and image timestamps share one time domain.
///
/// The entire observed motion-event window must nest strictly between the
/// two bracketing image timestamps: both the earliest first-event time and
/// the latest last-event time across all three streams lie strictly inside
/// `(ts_image0, ts_image1)`.
pub fn verify_unified_timestamps(
    ts_image0: i64,
    ts_image1: i64,
    events: &SensorEvents,
) -> Result<TimestampReport> {
    if ts_image0 >= ts_image1 {
        return Err(CameraError::Precondition(format!(
            "image bracket is not ordered: {ts_image0} >= {ts_image1}"
        )));
    }

    let gyro = stream_bounds("gyro", &events.gyro)?;
    let accel = stream_bounds("accel", &events.accel)?;
    let mag = stream_bounds("mag", &events.mag)?;
    debug!(
        ts_image0,
        ts_image1,
        gyro_first = gyro.0,
        gyro_last = gyro.1,
        accel_first = accel.0,
        accel_last = accel.1,
        mag_first = mag.0,
        mag_last = mag.1,
        "timestamp alignment"
    );

    let earliest = gyro.0.min(accel.0).min(mag.0);
    let latest = gyro.1.max(accel.1).max(mag.1);

    if !(ts_image0 < earliest && earliest < ts_image1) {
        return Err(CameraError::ToleranceViolation(format!(
            "earliest motion event at {earliest} ns falls outside image bracket \
             ({ts_image0}, {ts_image1})"
        )));
    }
    if !(ts_image0 < latest && latest < ts_image1) {
        return Err(CameraError::ToleranceViolation(format!(
            "latest motion event at {latest} ns falls outside image bracket \
             ({ts_image0}, {ts_image1})"
        )));
    }

    Ok(TimestampReport { gyro, accel, mag })
}

/// Capture an image bracket around a motion-sensing window and verify that
/// both timestamp domains are comparable.
///
/// The dwell is a wall-clock wait between starting and collecting sensor
/// events; it must be long enough for each stream to produce at least one
/// event, otherwise the check fails deterministically.
pub fn run_unified_timestamp_check<S: CameraSession>(
    session: &mut S,
    dwell: Duration,
) -> Result<TimestampReport> {
    let request = CaptureRequest::default();

    let ts_image0 = session.capture(&request)?.metadata.timestamp_ns;

    session.start_sensor_events()?;
    std::thread::sleep(dwell);
    let events = session.get_sensor_events()?;

    let ts_image1 = session.capture(&request)?.metadata.timestamp_ns;

    verify_unified_timestamps(ts_image0, ts_image1, &events)
}

fn stream_bounds(name: &str, stream: &[SensorEvent]) -> Result<(i64, i64)> {
    let first = stream.first().ok_or_else(|| {
        CameraError::Precondition(format!("{name} stream produced no events"))
    })?;
    let last = stream.last().ok_or_else(|| {
        CameraError::Precondition(format!("{name} stream produced no events"))
    })?;
    Ok((first.time_ns, last.time_ns))
}
