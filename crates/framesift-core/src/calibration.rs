//! Pinhole camera model and ROS-style calibration loading.
//!
//! Calibration files are ROS `camera_info` YAML exports: each matrix is a
//! mapping with a flat row-major `data` list, plus a `distortion_model`
//! tag. Sibling keys such as `image_width` or `camera_name` are ignored.

use std::path::Path;

use nalgebra::{Matrix3, Matrix3x4, Vector5};
use serde::Deserialize;

use crate::{Error, Result};

/// Pinhole camera calibration: intrinsics, distortion and the rectified
/// reprojection that undistorted pixels are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    /// Camera matrix K (3x3).
    pub camera_matrix: Matrix3<f64>,
    /// Distortion coefficients D in `[k1, k2, p1, p2, k3]` order.
    pub distortion: Vector5<f64>,
    /// Rectification rotation R (3x3).
    pub rectification: Matrix3<f64>,
    /// Projection matrix P (3x4) of the rectified camera.
    pub projection: Matrix3x4<f64>,
    /// Distortion model tag from the file, e.g. `"plumb_bob"`. Kept for
    /// introspection; the remap stage always applies the plumb_bob model.
    pub distortion_model: String,
}

impl CameraIntrinsics {
    /// Build a model from flat row-major coefficient lists.
    ///
    /// List lengths must be exactly 9 / 5 / 9 / 12.
    pub fn from_flat(
        camera_matrix: &[f64],
        distortion: &[f64],
        rectification: &[f64],
        projection: &[f64],
        distortion_model: impl Into<String>,
    ) -> std::result::Result<Self, String> {
        expect_len("camera_matrix", camera_matrix, 9)?;
        expect_len("distortion_coefficients", distortion, 5)?;
        expect_len("rectification_matrix", rectification, 9)?;
        expect_len("projection_matrix", projection, 12)?;

        Ok(Self {
            camera_matrix: Matrix3::from_row_slice(camera_matrix),
            distortion: Vector5::from_row_slice(distortion),
            rectification: Matrix3::from_row_slice(rectification),
            projection: Matrix3x4::from_row_slice(projection),
            distortion_model: distortion_model.into(),
        })
    }

    /// Model with zero distortion, R = I and P = [K | 0]. Remapping
    /// through it is the identity transform.
    pub fn zero_distortion(camera_matrix: Matrix3<f64>) -> Self {
        let mut projection = Matrix3x4::zeros();
        projection
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&camera_matrix);
        Self {
            camera_matrix,
            distortion: Vector5::zeros(),
            rectification: Matrix3::identity(),
            projection,
            distortion_model: "plumb_bob".to_string(),
        }
    }

    /// Apply the plumb_bob forward distortion model to normalized pinhole
    /// coordinates.
    pub fn distort_normalized(&self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let [k1, k2, p1, p2, k3] = [
            self.distortion[0],
            self.distortion[1],
            self.distortion[2],
            self.distortion[3],
            self.distortion[4],
        ];
        let x = normalized_xy[0];
        let y = normalized_xy[1];
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }
}

/// Raw mirror of the calibration YAML; only the keys the model needs.
#[derive(Debug, Deserialize)]
struct RawCalibration {
    camera_matrix: RawMatrix,
    distortion_coefficients: RawMatrix,
    rectification_matrix: RawMatrix,
    projection_matrix: RawMatrix,
    distortion_model: String,
}

#[derive(Debug, Deserialize)]
struct RawMatrix {
    data: Vec<f64>,
}

fn expect_len(key: &str, data: &[f64], want: usize) -> std::result::Result<(), String> {
    if data.len() == want {
        Ok(())
    } else {
        Err(format!(
            "{key}.data must hold {want} values, got {}",
            data.len()
        ))
    }
}

/// Load a pinhole calibration from a ROS `camera_info` YAML file.
///
/// A path that does not reference an existing file yields
/// [`Error::MissingCalibration`]; unparseable or wrongly shaped content
/// yields [`Error::MalformedCalibration`].
pub fn load_intrinsics(path: &Path) -> Result<CameraIntrinsics> {
    if !path.is_file() {
        return Err(Error::MissingCalibration(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path)?;
    let raw: RawCalibration =
        serde_yaml::from_str(&data).map_err(|err| Error::MalformedCalibration {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let model = CameraIntrinsics::from_flat(
        &raw.camera_matrix.data,
        &raw.distortion_coefficients.data,
        &raw.rectification_matrix.data,
        &raw.projection_matrix.data,
        raw.distortion_model,
    )
    .map_err(|reason| Error::MalformedCalibration {
        path: path.to_path_buf(),
        reason,
    })?;
    tracing::info!(
        "loaded {} calibration from {}",
        model.distortion_model,
        path.display()
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
image_width: 640
image_height: 480
camera_name: front
camera_matrix:
  rows: 3
  cols: 3
  data: [305.57, 0.0, 303.07, 0.0, 308.83, 231.88, 0.0, 0.0, 1.0]
distortion_model: plumb_bob
distortion_coefficients:
  rows: 1
  cols: 5
  data: [-0.2, 0.0305, 0.0005, -0.0002, 0.0]
rectification_matrix:
  rows: 3
  cols: 3
  data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
projection_matrix:
  rows: 3
  cols: 4
  data: [220.2, 0.0, 301.8, 0.0, 0.0, 238.6, 227.2, 0.0, 0.0, 0.0, 1.0, 0.0]
"#;

    fn write_calibration(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("camera.yaml");
        std::fs::write(&path, contents).expect("write calibration fixture");
        path
    }

    #[test]
    fn loads_ros_camera_info_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_calibration(&dir, SAMPLE_YAML);

        let model = load_intrinsics(&path).expect("valid calibration");
        assert_eq!(model.camera_matrix[(0, 0)], 305.57);
        assert_eq!(model.camera_matrix[(1, 2)], 231.88);
        assert_eq!(model.distortion[0], -0.2);
        assert_eq!(model.rectification, Matrix3::identity());
        assert_eq!(model.projection[(1, 2)], 227.2);
        assert_eq!(model.projection[(2, 3)], 0.0);
        assert_eq!(model.distortion_model, "plumb_bob");
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_intrinsics(&dir.path().join("nope.yaml")).expect_err("expected error");
        assert!(matches!(err, Error::MissingCalibration(_)));
    }

    #[test]
    fn short_coefficient_list_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let truncated = SAMPLE_YAML.replace(
            "data: [305.57, 0.0, 303.07, 0.0, 308.83, 231.88, 0.0, 0.0, 1.0]",
            "data: [305.57, 0.0, 303.07, 0.0, 308.83, 231.88, 0.0, 0.0]",
        );
        let path = write_calibration(&dir, &truncated);

        let err = load_intrinsics(&path).expect_err("expected error");
        match err {
            Error::MalformedCalibration { reason, .. } => {
                assert!(reason.contains("camera_matrix"));
                assert!(reason.contains("9"));
            }
            other => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn missing_key_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_calibration(&dir, "camera_matrix:\n  data: [1.0]\n");

        let err = load_intrinsics(&path).expect_err("expected error");
        assert!(matches!(err, Error::MalformedCalibration { .. }));
    }

    #[test]
    fn non_yaml_content_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_calibration(&dir, "{not yaml: [");

        let err = load_intrinsics(&path).expect_err("expected error");
        assert!(matches!(err, Error::MalformedCalibration { .. }));
    }

    #[test]
    fn from_flat_rejects_wrong_shapes() {
        let nine = [0.0; 9];
        let five = [0.0; 5];
        let twelve = [0.0; 12];

        let err = CameraIntrinsics::from_flat(&nine, &five, &nine, &nine, "plumb_bob")
            .expect_err("expected error");
        assert!(err.contains("projection_matrix"));
        assert!(err.contains("12"));

        let err = CameraIntrinsics::from_flat(&nine, &twelve, &nine, &twelve, "plumb_bob")
            .expect_err("expected error");
        assert!(err.contains("distortion_coefficients"));
    }

    #[test]
    fn zero_distortion_passes_coordinates_through() {
        let k = Matrix3::new(200.0, 0.0, 320.0, 0.0, 200.0, 240.0, 0.0, 0.0, 1.0);
        let model = CameraIntrinsics::zero_distortion(k);
        assert_eq!(model.distort_normalized([0.3, -0.7]), [0.3, -0.7]);
        assert_eq!(model.projection[(0, 0)], 200.0);
        assert_eq!(model.projection[(0, 3)], 0.0);
    }

    #[test]
    fn distortion_matches_hand_computed_values() {
        let mut model = CameraIntrinsics::zero_distortion(Matrix3::identity());
        model.distortion = Vector5::new(-0.2, 0.03, 0.001, -0.002, 0.0);

        let [xd, yd] = model.distort_normalized([0.1, -0.2]);
        assert!((xd - 0.098_827_5).abs() < 1e-12);
        assert!((yd - (-0.197_805)).abs() < 1e-12);
    }
}
