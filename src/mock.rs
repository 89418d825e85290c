//! Mock session implementation for testing without hardware.
//!
//! Produces deterministic synthetic data: solid gray YUYV bursts on a fixed
//! timestamp schedule, raw planes whose noise amplitude grows with requested
//! sensitivity, and sensor-event streams nested between captures.

use crate::traits::{
    AutoExposure, CameraError, CameraSession, CaptureFrame, CaptureMetadata, CaptureRequest,
    DeviceProperties, FourCC, Plane, RawCapture, Result, SensorEvent, SensorEvents,
    StreamConfiguration,
};

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;
const FRAME_INTERVAL_NS: i64 = 33_333_333;
const SENSOR_EVENT_SPACING_NS: i64 = 1_000_000;

/// Mock session for testing without hardware.
pub struct MockSession {
    properties: DeviceProperties,
    clock_ns: i64,
    sensor_window_start_ns: Option<i64>,
    sensor_event_count: usize,
    frame_yuv: (u8, u8, u8),
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Create a mock session with default settings: a 640x480 YUYV stream
    /// advertised at 30 fps and a sweepable sensitivity range.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: DeviceProperties {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                sensitivity_range: (100, 10_000),
                stream_configurations: vec![StreamConfiguration {
                    format: FourCC::YUYV,
                    input: false,
                    width: FRAME_WIDTH,
                    height: FRAME_HEIGHT,
                    min_frame_duration_ns: FRAME_INTERVAL_NS,
                }],
            },
            clock_ns: 1_000_000,
            sensor_window_start_ns: None,
            sensor_event_count: 5,
            frame_yuv: (128, 128, 128),
        }
    }

    /// Override the advertised sensitivity range.
    #[must_use]
    pub fn with_sensitivity_range(mut self, min: i64, max: i64) -> Self {
        self.properties.sensitivity_range = (min, max);
        self
    }

    /// Override how many events each sensor stream produces per window.
    #[must_use]
    pub const fn with_sensor_event_count(mut self, count: usize) -> Self {
        self.sensor_event_count = count;
        self
    }

    /// Override the solid YUV color of generated frames.
    #[must_use]
    pub const fn with_frame_yuv(mut self, yuv: (u8, u8, u8)) -> Self {
        self.frame_yuv = yuv;
        self
    }

    fn solid_frame(&self, timestamp_ns: i64) -> CaptureFrame {
        let (y, u, v) = self.frame_yuv;
        let mut data = vec![0u8; (FRAME_WIDTH * FRAME_HEIGHT * 2) as usize];
        for chunk in data.chunks_exact_mut(4) {
            chunk[0] = y;
            chunk[1] = u;
            chunk[2] = y;
            chunk[3] = v;
        }
        CaptureFrame {
            data,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            fourcc: FourCC::YUYV,
            metadata: CaptureMetadata {
                timestamp_ns,
                sensitivity: None,
                exposure_ns: None,
            },
        }
    }

    fn event_stream(&self, start_ns: i64) -> Vec<SensorEvent> {
        (0..self.sensor_event_count)
            .map(|i| SensorEvent {
                time_ns: start_ns + i as i64 * SENSOR_EVENT_SPACING_NS,
                values: [0.0; 3],
            })
            .collect()
    }
}

impl CameraSession for MockSession {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn do_3a(&mut self, _lock_ae: bool, _lock_awb: bool) -> Result<AutoExposure> {
        Ok(AutoExposure {
            sensitivity: 100,
            exposure_ns: 10_000_000,
        })
    }

    fn capture_burst(&mut self, _request: &CaptureRequest, count: usize) -> Result<Vec<CaptureFrame>> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            self.clock_ns += FRAME_INTERVAL_NS;
            frames.push(self.solid_frame(self.clock_ns));
        }
        Ok(frames)
    }

    fn capture_raw(&mut self, request: &CaptureRequest) -> Result<RawCapture> {
        let sensitivity = request.sensitivity.ok_or_else(|| {
            CameraError::Precondition("raw capture requires a manual request".to_owned())
        })?;

        self.clock_ns += FRAME_INTERVAL_NS;

        // Noise amplitude scales linearly with gain, so patch variance
        // (amplitude squared) is strictly increasing across a sweep.
        #[allow(clippy::cast_precision_loss)]
        let amplitude = sensitivity as f32 * 1e-6;
        let width = FRAME_WIDTH / 2;
        let height = FRAME_HEIGHT / 2;
        let plane = Plane {
            data: (0..width * height)
                .map(|i| {
                    if i % 2 == 0 {
                        0.5 + amplitude
                    } else {
                        0.5 - amplitude
                    }
                })
                .collect(),
            width,
            height,
        };

        Ok(RawCapture {
            planes: vec![plane.clone(), plane.clone(), plane.clone(), plane],
            metadata: CaptureMetadata {
                timestamp_ns: self.clock_ns,
                sensitivity: Some(sensitivity),
                exposure_ns: request.exposure_ns,
            },
        })
    }

    fn start_sensor_events(&mut self) -> Result<()> {
        self.sensor_window_start_ns = Some(self.clock_ns + 1_000);
        Ok(())
    }

    fn get_sensor_events(&mut self) -> Result<SensorEvents> {
        let start_ns = self.sensor_window_start_ns.take().ok_or_else(|| {
            CameraError::Precondition("sensor events were not started".to_owned())
        })?;

        let events = SensorEvents {
            gyro: self.event_stream(start_ns),
            accel: self.event_stream(start_ns),
            mag: self.event_stream(start_ns),
        };

        // Advance the clock past the window so the bracketing capture that
        // follows lands after the last event.
        if let Some(last) = events.gyro.last() {
            self.clock_ns = self.clock_ns.max(last.time_ns + 1_000);
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_session_properties() {
        let session = MockSession::new();
        assert_eq!(session.properties().driver, "mock");
        assert_eq!(session.properties().stream_configurations.len(), 1);
    }

    #[test]
    fn test_mock_burst_timestamps_advance() {
        let mut session = MockSession::new();
        let frames = session
            .capture_burst(&CaptureRequest::auto_locked(), 3)
            .expect("burst failed");
        assert_eq!(frames.len(), 3);
        assert!(frames[0].metadata.timestamp_ns < frames[1].metadata.timestamp_ns);
        assert!(frames[1].metadata.timestamp_ns < frames[2].metadata.timestamp_ns);
    }

    #[test]
    fn test_mock_frame_color_override() {
        let mut session = MockSession::new().with_frame_yuv((200, 128, 128));
        let frame = session
            .capture(&CaptureRequest::default())
            .expect("capture failed");
        // Neutral chroma converts Y straight to R=G=B.
        assert_eq!(frame.pixel_at(10, 10), Some((200, 200, 200)));
    }

    #[test]
    fn test_mock_raw_capture_requires_manual_request() {
        let mut session = MockSession::new();
        let result = session.capture_raw(&CaptureRequest::auto_locked());
        assert!(matches!(result, Err(CameraError::Precondition(_))));
    }

    #[test]
    fn test_mock_raw_noise_scales_with_gain() {
        let mut session = MockSession::new();
        let low = session
            .capture_raw(&CaptureRequest::manual(100, 1_000_000))
            .expect("raw capture failed");
        let high = session
            .capture_raw(&CaptureRequest::manual(1000, 100_000))
            .expect("raw capture failed");
        let spread = |capture: &RawCapture| {
            let plane = &capture.planes[1];
            let max = plane.data.iter().copied().fold(f32::MIN, f32::max);
            let min = plane.data.iter().copied().fold(f32::MAX, f32::min);
            max - min
        };
        assert!(spread(&high) > spread(&low));
    }

    #[test]
    fn test_mock_sensor_events_nest_between_captures() {
        let mut session = MockSession::new();
        let ts0 = session
            .capture(&CaptureRequest::default())
            .expect("capture failed")
            .metadata
            .timestamp_ns;
        session.start_sensor_events().expect("start failed");
        let events = session.get_sensor_events().expect("events failed");
        let ts1 = session
            .capture(&CaptureRequest::default())
            .expect("capture failed")
            .metadata
            .timestamp_ns;

        let first = events.gyro.first().expect("no events").time_ns;
        let last = events.mag.last().expect("no events").time_ns;
        assert!(ts0 < first);
        assert!(last < ts1);
    }

    #[test]
    fn test_mock_events_without_start_fail() {
        let mut session = MockSession::new();
        let result = session.get_sensor_events();
        assert!(matches!(result, Err(CameraError::Precondition(_))));
    }
}
