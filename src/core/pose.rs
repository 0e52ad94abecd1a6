// src/core/pose.rs

use log::warn;
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::camera::CameraCalibration;
use crate::core::pnp::{rodrigues, solve_pnp};
use crate::core::recognizer::Marker;
use crate::Result;

/// Rigid transform `x' = rotation * x + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Builds the transform from a solver's axis-angle and translation vectors.
    pub fn from_rvec_tvec(rvec: &Vector3<f64>, tvec: &Vector3<f64>) -> Self {
        Self::new(rodrigues(rvec), *tvec)
    }

    /// Inverse of a rigid transform: `R' = Rᵀ`, `t' = -Rᵀ t`.
    pub fn inverted(&self) -> Self {
        let rt = self.rotation.transpose();
        Self::new(rt, -(rt * self.translation))
    }

    /// `self ∘ other`: applies `other` first.
    pub fn compose(&self, other: &Transformation) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Column-major 4x4 for graphics upload; translation sits in elements 12..15.
    pub fn to_gl_array(&self) -> [f32; 16] {
        let m = self.to_matrix4();
        let mut out = [0.0f32; 16];
        for (dst, src) in out.iter_mut().zip(m.as_slice()) {
            *dst = *src as f32;
        }
        out
    }
}

/// Solves marker poses against a fixed camera.
///
/// Marker corners are matched, in order, with the unit square
/// `(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)` in the `z = 0` plane.
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    camera: CameraCalibration,
    object_points: [Vector3<f64>; 4],
}

impl PoseEstimator {
    pub fn new(camera: CameraCalibration) -> Self {
        Self {
            camera,
            object_points: [
                Vector3::new(-0.5, -0.5, 0.0),
                Vector3::new(0.5, -0.5, 0.0),
                Vector3::new(0.5, 0.5, 0.0),
                Vector3::new(-0.5, 0.5, 0.0),
            ],
        }
    }

    pub fn camera(&self) -> &CameraCalibration {
        &self.camera
    }

    /// The transform the solver returns for `marker`, before inversion.
    pub fn solve(&self, marker: &Marker) -> Result<Transformation> {
        let image = marker
            .corners
            .map(|p| Vector2::new(p.x as f64, p.y as f64));
        let (rvec, tvec) = solve_pnp(&self.object_points, &image, &self.camera)?;
        Ok(Transformation::from_rvec_tvec(&rvec, &tvec))
    }

    /// Pose handed to the renderer: the inverse of the solver transform.
    pub fn estimate(&self, marker: &Marker) -> Result<Transformation> {
        Ok(self.solve(marker)?.inverted())
    }

    /// Estimates every marker independently. A failure is logged and yields
    /// `None` for that marker only.
    pub fn estimate_all(&self, markers: &[Marker]) -> Vec<Option<Transformation>> {
        markers
            .iter()
            .map(|m| match self.estimate(m) {
                Ok(pose) => Some(pose),
                Err(e) => {
                    warn!("pose estimation failed for marker at {:?}: {e}", m.corners[0]);
                    None
                }
            })
            .collect()
    }
}
