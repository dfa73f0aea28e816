//! framesift-core — camera frame curation with optional undistortion.
//!
//! Turns directories of raw camera captures into a flat, uniformly
//! sampled dataset. The pipeline stages are:
//!
//! 1. **Calibration** – load a ROS `camera_info` YAML export into a
//!    [`CameraIntrinsics`] pinhole model (K, D, R, P).
//! 2. **Remap** – build a per-pixel undistort-rectify [`RemapTable`] from
//!    the model and resample frames through it with a bicubic kernel.
//! 3. **Select** – walk source directories in sorted order, keep every
//!    Nth eligible frame, and copy or rectify each kept frame into the
//!    destination directory under a running counter name.

pub mod calibration;
pub mod remap;
pub mod select;

pub use calibration::{load_intrinsics, CameraIntrinsics};
pub use remap::{rectify, RemapTable};
pub use select::{curate, CurateConfig, CurateSummary};

use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures of calibration loading and frame curation.
///
/// Per-entry conditions (missing source directory, undecodable frame)
/// are logged and skipped inside [`select::curate`] and never surface
/// here.
#[derive(Debug, Error)]
pub enum Error {
    /// The calibration path does not reference an existing file.
    #[error("calibration file not found: {}", .0.display())]
    MissingCalibration(PathBuf),

    /// The calibration file exists but is not a usable camera model.
    #[error("malformed calibration {}: {reason}", .path.display())]
    MalformedCalibration {
        /// File that failed to parse or validate.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Rejected curation options.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A curated frame could not be encoded or written.
    #[error("failed to write {}: {source}", .path.display())]
    WriteImage {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying encoder/filesystem failure.
        source: image::ImageError,
    },

    /// Filesystem failure outside the per-entry skip paths.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
