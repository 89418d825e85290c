//! V4L2-backed camera session using the v4l crate.
//!
//! Supplies frame capture and stream-configuration discovery for local
//! devices. V4L2 exposes no ISO-style sensitivity control, planar raw
//! capture path or motion sensors, so those operations report
//! [`CameraError::CapabilityUnsupported`].

use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::traits::{
    AutoExposure, CameraError, CameraSession, CaptureFrame, CaptureMetadata, CaptureRequest,
    DeviceProperties, FourCC, RawCapture, Result, SensorEvents, StreamConfiguration,
};

/// Camera session backed by a local V4L2 device.
pub struct V4l2Session {
    device: Device,
    properties: DeviceProperties,
}

impl V4l2Session {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0) and enumerate
    /// its output stream configurations.
    pub fn open(index: u32) -> Result<Self> {
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::CapabilityUnsupported(
                "video capture".to_owned(),
            ));
        }

        let stream_configurations = enumerate_stream_configurations(&device)?;

        let properties = DeviceProperties {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            // No ISO-equivalent sensitivity range on V4L2.
            sensitivity_range: (0, 0),
            stream_configurations,
        };

        Ok(Self { device, properties })
    }

    /// Set the capture format. Returns the dimensions and format actually
    /// selected by the driver.
    pub fn set_format(&mut self, width: u32, height: u32, fourcc: FourCC) -> Result<(u32, u32, FourCC)> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::Stream(err.to_string()))?;

        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| CameraError::Stream(err.to_string()))?;

        Ok((fmt.width, fmt.height, FourCC::from(fmt.fourcc)))
    }
}

/// Build the stream configuration table from the device's discrete format,
/// frame-size and frame-interval enumerations.
fn enumerate_stream_configurations(device: &Device) -> Result<Vec<StreamConfiguration>> {
    let mut configs = Vec::new();

    let descriptions = device
        .enum_formats()
        .map_err(|err| CameraError::Stream(err.to_string()))?;
    for description in descriptions {
        let sizes = device
            .enum_framesizes(description.fourcc)
            .map_err(|err| CameraError::Stream(err.to_string()))?;
        for size in sizes {
            let v4l::framesize::FrameSizeEnum::Discrete(discrete) = size.size else {
                continue;
            };

            let intervals = device
                .enum_frameintervals(description.fourcc, discrete.width, discrete.height)
                .map_err(|err| CameraError::Stream(err.to_string()))?;

            let mut min_duration_ns: Option<i64> = None;
            for interval in intervals {
                let duration_ns = match interval.interval {
                    v4l::frameinterval::FrameIntervalEnum::Discrete(fraction) => {
                        fraction_to_ns(&fraction)
                    }
                    v4l::frameinterval::FrameIntervalEnum::Stepwise(stepwise) => {
                        fraction_to_ns(&stepwise.min)
                    }
                };
                if duration_ns <= 0 {
                    continue;
                }
                min_duration_ns =
                    Some(min_duration_ns.map_or(duration_ns, |cur| cur.min(duration_ns)));
            }

            let Some(min_frame_duration_ns) = min_duration_ns else {
                continue;
            };

            configs.push(StreamConfiguration {
                format: FourCC::from(description.fourcc),
                input: false,
                width: discrete.width,
                height: discrete.height,
                min_frame_duration_ns,
            });
        }
    }

    Ok(configs)
}

fn fraction_to_ns(fraction: &v4l::Fraction) -> i64 {
    if fraction.denominator == 0 {
        return 0;
    }
    i64::from(fraction.numerator) * 1_000_000_000 / i64::from(fraction.denominator)
}

impl CameraSession for V4l2Session {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn do_3a(&mut self, _lock_ae: bool, _lock_awb: bool) -> Result<AutoExposure> {
        Err(CameraError::CapabilityUnsupported(
            "manual 3A convergence".to_owned(),
        ))
    }

    fn capture_burst(&mut self, _request: &CaptureRequest, count: usize) -> Result<Vec<CaptureFrame>> {
        let format = self
            .device
            .format()
            .map_err(|err| CameraError::Stream(err.to_string()))?;
        let fourcc = FourCC::from(format.fourcc);

        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, 4)
            .map_err(|err| CameraError::Stream(err.to_string()))?;

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            let (buf, meta) = stream
                .next()
                .map_err(|err| CameraError::Stream(err.to_string()))?;

            // V4L2 timestamps are seconds/microseconds since boot.
            #[allow(clippy::unnecessary_cast)]
            let timestamp_ns = (meta.timestamp.sec as i64)
                .saturating_mul(1_000_000_000)
                .saturating_add((meta.timestamp.usec as i64).saturating_mul(1_000));

            frames.push(CaptureFrame {
                data: buf.to_vec(),
                width: format.width,
                height: format.height,
                fourcc,
                metadata: CaptureMetadata {
                    timestamp_ns,
                    sensitivity: None,
                    exposure_ns: None,
                },
            });
        }

        Ok(frames)
    }

    fn capture_raw(&mut self, _request: &CaptureRequest) -> Result<RawCapture> {
        Err(CameraError::CapabilityUnsupported(
            "planar raw capture".to_owned(),
        ))
    }

    fn start_sensor_events(&mut self) -> Result<()> {
        Err(CameraError::CapabilityUnsupported(
            "motion sensor events".to_owned(),
        ))
    }

    fn get_sensor_events(&mut self) -> Result<SensorEvents> {
        Err(CameraError::CapabilityUnsupported(
            "motion sensor events".to_owned(),
        ))
    }
}
