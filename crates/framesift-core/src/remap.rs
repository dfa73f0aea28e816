//! Undistort-rectify map construction and bicubic resampling.
//!
//! Rectification follows the standard pinhole recipe: each destination
//! pixel is carried through the inverse rectified projection (the left
//! 3x3 block of P), rotated back through R, pushed through the forward
//! plumb_bob distortion and projected through K. The resulting source
//! coordinates are stored per pixel, and frames are resampled at those
//! coordinates with a bicubic kernel. Samples outside the source image
//! read as black.

use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};

use crate::calibration::CameraIntrinsics;

/// Per-pixel source-coordinate lookup for one image resolution.
///
/// A table is only meaningful for the resolution it was built for;
/// callers keep one per stream and rebuild when the frame size changes.
#[derive(Debug, Clone)]
pub struct RemapTable {
    width: u32,
    height: u32,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl RemapTable {
    /// Build the undistort-rectify map for `width` x `height` frames.
    pub fn build(intrinsics: &CameraIntrinsics, width: u32, height: u32) -> Self {
        // The left 3x3 block of P is the rectified camera matrix.
        let k_new = intrinsics.projection.fixed_view::<3, 3>(0, 0).into_owned();
        let k_new_inv = k_new.try_inverse().unwrap_or_else(Matrix3::identity);
        let r_inv = intrinsics
            .rectification
            .try_inverse()
            .unwrap_or_else(Matrix3::identity);
        let back = r_inv * k_new_inv;

        let fx = intrinsics.camera_matrix[(0, 0)];
        let fy = intrinsics.camera_matrix[(1, 1)];
        let cx = intrinsics.camera_matrix[(0, 2)];
        let cy = intrinsics.camera_matrix[(1, 2)];

        let n = width as usize * height as usize;
        // Out of range, so entries the loop cannot fill read as border.
        let mut map_x = vec![-1.0f32; n];
        let mut map_y = vec![-1.0f32; n];

        for y in 0..height {
            for x in 0..width {
                let ray = back * Vector3::new(x as f64, y as f64, 1.0);
                if ray.z.abs() <= 1e-12 {
                    // Degenerate ray; keep the sentinel.
                    continue;
                }
                let [xd, yd] =
                    intrinsics.distort_normalized([ray.x / ray.z, ray.y / ray.z]);
                let idx = y as usize * width as usize + x as usize;
                map_x[idx] = (fx * xd + cx) as f32;
                map_y[idx] = (fy * yd + cy) as f32;
            }
        }

        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    /// `true` when the table was built for the given resolution.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Resample `src` through the table with a bicubic kernel.
    ///
    /// `src` must have the resolution the table was built for. Pixels
    /// whose source coordinates fall outside the input read as black, so
    /// undistorted borders fade toward zero.
    pub fn remap(&self, src: &RgbImage) -> RgbImage {
        assert!(
            self.matches(src.width(), src.height()),
            "remap table built for {}x{}, frame is {}x{}",
            self.width,
            self.height,
            src.width(),
            src.height()
        );

        let mut dst = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y as usize * self.width as usize + x as usize;
                let px = sample_bicubic(src, self.map_x[idx], self.map_y[idx]);
                dst.put_pixel(x, y, Rgb(px));
            }
        }
        dst
    }
}

/// Undistort one frame in a single step, building a fresh table for its
/// resolution. Prefer [`RemapTable`] directly when processing a stream of
/// same-sized frames.
pub fn rectify(image: &RgbImage, intrinsics: &CameraIntrinsics) -> RgbImage {
    RemapTable::build(intrinsics, image.width(), image.height()).remap(image)
}

/// Bicubic convolution weight with a = -0.75, evaluated at distance `t`
/// from the sample.
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        (((t - 5.0) * t + 8.0) * t - 4.0) * A
    } else {
        0.0
    }
}

/// Sample `src` at fractional coordinates with a 4x4 bicubic kernel;
/// taps outside the image contribute black.
fn sample_bicubic(src: &RgbImage, x: f32, y: f32) -> [u8; 3] {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut acc = [0.0f32; 3];
    for j in -1..=2i64 {
        let wy = cubic_weight(fy - j as f32);
        for i in -1..=2i64 {
            let w = cubic_weight(fx - i as f32) * wy;
            let [r, g, b] = tap(src, x0 + i, y0 + j);
            acc[0] += w * r;
            acc[1] += w * g;
            acc[2] += w * b;
        }
    }
    [quantize(acc[0]), quantize(acc[1]), quantize(acc[2])]
}

fn tap(src: &RgbImage, x: i64, y: i64) -> [f32; 3] {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return [0.0; 3];
    }
    let px = src.get_pixel(x as u32, y as u32);
    [px[0] as f32, px[1] as f32, px[2] as f32]
}

fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
