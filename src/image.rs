//! Patch extraction and pixel statistics over captured imagery.
//!
//! Statistics are computed over a rectangular sub-region of a frame or plane,
//! specified by fractional offsets and size so the same region spec works at
//! any resolution. Mean intensities are reported on a normalized 0-1 scale.

use crate::traits::{CameraError, CaptureFrame, FourCC, Plane, Result};

/// A rectangular image patch specified by fractional offset and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchRegion {
    /// Left edge as a fraction of image width.
    pub x_frac: f64,
    /// Top edge as a fraction of image height.
    pub y_frac: f64,
    /// Width as a fraction of image width.
    pub w_frac: f64,
    /// Height as a fraction of image height.
    pub h_frac: f64,
}

impl PatchRegion {
    /// The center 10% x 10% region used by the stock checks.
    pub const CENTER: Self = Self {
        x_frac: 0.45,
        y_frac: 0.45,
        w_frac: 0.1,
        h_frac: 0.1,
    };

    /// Resolve the fractional spec to pixel bounds `(x0, y0, w, h)`.
    ///
    /// Returns `None` if the spec does not describe a non-empty region
    /// inside the unit square.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn bounds(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let valid = self.x_frac >= 0.0
            && self.y_frac >= 0.0
            && self.w_frac > 0.0
            && self.h_frac > 0.0
            && self.x_frac + self.w_frac <= 1.0
            && self.y_frac + self.h_frac <= 1.0;
        if !valid || width == 0 || height == 0 {
            return None;
        }

        let x0 = (self.x_frac * f64::from(width)) as u32;
        let y0 = (self.y_frac * f64::from(height)) as u32;
        let w = ((self.w_frac * f64::from(width)) as u32).clamp(1, width - x0);
        let h = ((self.h_frac * f64::from(height)) as u32).clamp(1, height - y0);
        Some((x0, y0, w, h))
    }
}

/// Compute per-channel (R, G, B) mean intensity of a patch.
///
/// Means are normalized to the 0-1 scale. The frame must be packed YUYV;
/// pixels are converted to RGB before accumulation.
pub fn patch_means(frame: &CaptureFrame, region: &PatchRegion) -> Result<(f64, f64, f64)> {
    if frame.fourcc != FourCC::YUYV {
        return Err(CameraError::Precondition(format!(
            "patch statistics require YUYV frames, got {:?}",
            frame.fourcc
        )));
    }

    let (x0, y0, w, h) = region.bounds(frame.width, frame.height).ok_or_else(|| {
        CameraError::Precondition(format!(
            "patch region {region:?} is outside {}x{} frame bounds",
            frame.width, frame.height
        ))
    })?;

    let mut r_sum = 0.0f64;
    let mut g_sum = 0.0f64;
    let mut b_sum = 0.0f64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let (r, g, b) = frame.pixel_at(x, y).ok_or_else(|| {
                CameraError::Stream(format!("failed to read pixel at ({x}, {y})"))
            })?;
            r_sum += f64::from(r);
            g_sum += f64::from(g);
            b_sum += f64::from(b);
        }
    }

    let scale = f64::from(w) * f64::from(h) * 255.0;
    Ok((r_sum / scale, g_sum / scale, b_sum / scale))
}

/// Compute the variance of a patch of a raw color plane.
///
/// Plane samples are already normalized to 0-1, so the variance is on the
/// squared normalized scale.
pub fn plane_patch_variance(plane: &Plane, region: &PatchRegion) -> Result<f64> {
    let (x0, y0, w, h) = region.bounds(plane.width, plane.height).ok_or_else(|| {
        CameraError::Precondition(format!(
            "patch region {region:?} is outside {}x{} plane bounds",
            plane.width, plane.height
        ))
    })?;

    let sample = |x: u32, y: u32| -> Result<f64> {
        let index = (y * plane.width + x) as usize;
        plane
            .data
            .get(index)
            .map(|value| f64::from(*value))
            .ok_or_else(|| CameraError::Stream(format!("failed to read sample at ({x}, {y})")))
    };

    let count = f64::from(w) * f64::from(h);
    let mut sum = 0.0f64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            sum += sample(x, y)?;
        }
    }
    let mean = sum / count;

    let mut sq_sum = 0.0f64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let deviation = sample(x, y)? - mean;
            sq_sum += deviation * deviation;
        }
    }

    Ok(sq_sum / count)
}
