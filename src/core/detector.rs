// src/core/detector.rs

use log::debug;
use serde::Serialize;

use crate::core::camera::CameraCalibration;
use crate::core::candidates::find_candidates;
use crate::core::params::DetectorParams;
use crate::core::pose::{PoseEstimator, Transformation};
use crate::core::recognizer::{recognize_markers, Marker};
use crate::cv::contours::{filter_by_length, find_contours};
use crate::cv::ComputerVision;
use crate::{Error, Frame, ImageBuffer, Quad, Result};

/// A validated marker and, when the solver succeeded, its pose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedMarker {
    pub marker: Marker,
    pub pose: Option<Transformation>,
}

/// Everything found in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameResult {
    pub markers: Vec<DetectedMarker>,
    /// Pose of the last marker in the frame whose pose could be estimated.
    pub current_pose: Option<Transformation>,
}

impl FrameResult {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Frame-by-frame marker detector.
///
/// Runs grayscale -> adaptive threshold -> contours -> candidates ->
/// recognition -> pose on every frame from scratch. The grayscale and
/// threshold buffers are reused between frames but never outlive a call
/// as borrowed data.
pub struct MarkerDetector<CV: ComputerVision> {
    pub cv: CV,
    params: DetectorParams,
    estimator: PoseEstimator,
    gray: Vec<u8>,
    binary: Vec<u8>,
    latest: Option<FrameResult>,
}

impl<CV: ComputerVision> MarkerDetector<CV> {
    /// Detector with default parameters.
    pub fn new(cv: CV, camera: CameraCalibration) -> Self {
        Self {
            cv,
            params: DetectorParams::default(),
            estimator: PoseEstimator::new(camera),
            gray: Vec::new(),
            binary: Vec::new(),
            latest: None,
        }
    }

    pub fn with_params(cv: CV, camera: CameraCalibration, params: DetectorParams) -> Result<Self> {
        params.validate()?;
        let mut detector = Self::new(cv, camera);
        detector.params = params;
        Ok(detector)
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn camera(&self) -> &CameraCalibration {
        self.estimator.camera()
    }

    /// Result of the most recent successful [`process_frame`](Self::process_frame).
    pub fn latest(&self) -> Option<&FrameResult> {
        self.latest.as_ref()
    }

    fn check_frame(frame: &Frame) -> Result<()> {
        if frame.width == 0 || frame.height == 0 {
            return Err(Error::EmptyFrame);
        }
        let expected = frame.pixel_count() * frame.format.bytes_per_pixel();
        if frame.data.len() != expected {
            return Err(Error::InvalidBuffer {
                expected,
                actual: frame.data.len(),
            });
        }
        Ok(())
    }

    /// Fills the grayscale and threshold buffers for `frame`.
    fn prepare(&mut self, frame: &Frame) -> Result<()> {
        Self::check_frame(frame)?;
        let len = frame.pixel_count();
        self.gray.resize(len, 0);
        self.binary.resize(len, 0);

        CV::grayscale(frame, &mut self.gray);
        let gray = ImageBuffer {
            data: &self.gray,
            width: frame.width,
            height: frame.height,
        };
        CV::adaptive_threshold(
            &gray,
            &mut self.binary,
            self.params.blur_radius(),
            self.params.adaptive_constant,
        );
        Ok(())
    }

    fn candidates_from_binary(&self, width: u32, height: u32) -> Vec<Quad> {
        let binary = ImageBuffer {
            data: &self.binary,
            width,
            height,
        };
        let contours = find_contours(&binary);
        let min_points = (width as f32 * self.params.min_contour_length_fraction) as usize;
        let traced = contours.len();
        let contours = filter_by_length(contours, min_points);
        debug!(
            "{traced} contours, {} longer than {min_points} points",
            contours.len()
        );
        find_candidates(&contours, &self.params)
    }

    /// Quadrilateral candidates of `frame`, before symbol recognition.
    pub fn detect_candidates(&mut self, frame: &Frame) -> Result<Vec<Quad>> {
        self.prepare(frame)?;
        Ok(self.candidates_from_binary(frame.width, frame.height))
    }

    /// Runs the whole pipeline on one frame.
    ///
    /// Frames without markers give an empty result, not an error.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameResult> {
        self.prepare(frame)?;
        let candidates = self.candidates_from_binary(frame.width, frame.height);

        let gray = ImageBuffer {
            data: &self.gray,
            width: frame.width,
            height: frame.height,
        };
        let markers = recognize_markers::<CV>(&gray, &candidates, &self.params);
        let poses = self.estimator.estimate_all(&markers);

        let current_pose = poses.iter().rev().flatten().next().copied();
        let markers: Vec<_> = markers
            .into_iter()
            .zip(poses)
            .map(|(marker, pose)| DetectedMarker { marker, pose })
            .collect();

        debug!(
            "frame {}x{}: {} markers",
            frame.width,
            frame.height,
            markers.len()
        );

        let result = FrameResult {
            markers,
            current_pose,
        };
        self.latest = Some(result.clone());
        Ok(result)
    }
}
