// src/core/camera.rs

use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Pinhole intrinsics plus the `[k1, k2, p1, p2]` distortion model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub distortion: [f64; 4],
}

impl Default for CameraCalibration {
    /// Intrinsics of a typical 640x480 webcam.
    fn default() -> Self {
        Self::new(612.84, 612.84, 326.46, 289.42)
    }
}

impl CameraCalibration {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; 4],
        }
    }

    pub fn with_distortion(mut self, distortion: [f64; 4]) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn camera_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|&d| d != 0.0)
    }

    /// Applies radial and tangential distortion to normalized coordinates.
    pub fn distort(&self, p: Vector2<f64>) -> Vector2<f64> {
        let [k1, k2, p1, p2] = self.distortion;
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        Vector2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Projects a point given in camera coordinates to pixels.
    pub fn project(&self, pc: &Vector3<f64>) -> Vector2<f64> {
        let n = self.distort(Vector2::new(pc.x / pc.z, pc.y / pc.z));
        Vector2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Normalized, undistorted coordinates of a pixel. Distortion is removed
    /// by fixed-point iteration.
    pub fn undistort_point(&self, pixel: Vector2<f64>) -> Vector2<f64> {
        let observed = Vector2::new((pixel.x - self.cx) / self.fx, (pixel.y - self.cy) / self.fy);
        if !self.has_distortion() {
            return observed;
        }

        let [k1, k2, p1, p2] = self.distortion;
        let mut p = observed;
        for _ in 0..20 {
            let r2 = p.norm_squared();
            let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
            let dx = 2.0 * p1 * p.x * p.y + p2 * (r2 + 2.0 * p.x * p.x);
            let dy = p1 * (r2 + 2.0 * p.y * p.y) + 2.0 * p2 * p.x * p.y;
            p = Vector2::new((observed.x - dx) / radial, (observed.y - dy) / radial);
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn project_without_distortion_is_pinhole() {
        let cam = CameraCalibration::default();
        let p = cam.project(&Vector3::new(0.1, -0.2, 2.0));
        assert_abs_diff_eq!(p.x, 612.84 * 0.05 + 326.46, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 612.84 * -0.1 + 289.42, epsilon = 1e-9);

        let k = cam.camera_matrix();
        let h = k * Vector3::new(0.05, -0.1, 1.0);
        assert_abs_diff_eq!(h.x, p.x, epsilon = 1e-9);
    }

    #[test]
    fn undistort_inverts_distortion() {
        let cam = CameraCalibration::default().with_distortion([-0.2, 0.05, 0.001, -0.002]);
        let pc = Vector3::new(0.3, 0.2, 1.5);
        let pixel = cam.project(&pc);
        let n = cam.undistort_point(pixel);
        assert_abs_diff_eq!(n.x, 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(n.y, 0.2 / 1.5, epsilon = 1e-6);
    }

    #[test]
    fn json_round_trip_through_file() {
        let cam = CameraCalibration::new(500.0, 510.0, 320.0, 240.0).with_distortion([0.1, 0.0, 0.0, 0.0]);
        let path = std::env::temp_dir().join(format!("camera-{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&cam).unwrap()).unwrap();

        let loaded = CameraCalibration::from_json_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, cam);
    }

    #[test]
    fn missing_distortion_defaults_to_zero() {
        let cam: CameraCalibration =
            serde_json::from_str(r#"{ "fx": 1.0, "fy": 1.0, "cx": 0.0, "cy": 0.0 }"#).unwrap();
        assert_eq!(cam.distortion, [0.0; 4]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CameraCalibration::from_json_file("/nonexistent/camera.json").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
