// Copyright (c) 2026 kalwalt and AR.js-org contributors
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT
// See https://github.com/AR-js-org/aruco-rs/blob/main/LICENSE
use nalgebra::Vector2;

/// 2D Point with floating point precision, used from candidate analysis onwards.
pub type Point2f = Vector2<f32>;

/// 2D Point in pixel coordinates, produced by contour tracing.
pub type Point2i = Vector2<i32>;

/// The four corners of a candidate or validated marker.
pub type Quad = [Point2f; 4];

/// Zero-copy single channel image buffer.
///
/// # Fields
/// * `data` - A slice representing a 1D contiguous array of 8-bit pixels.
/// * `width` - The logical width of the frame in pixels.
/// * `height` - The logical height of the frame in pixels.
#[derive(Debug, Clone, Copy)]
pub struct ImageBuffer<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> ImageBuffer<'a> {
    /// Wraps a grayscale slice, checking that it covers `width * height` pixels.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Channel layout of a captured color frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Bgr8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A captured video frame, borrowed from the capture backend for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl<'a> Frame<'a> {
    /// Wraps a raw frame, rejecting empty frames and mis-sized buffers.
    pub fn new(data: &'a [u8], width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyFrame);
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(Error::InvalidBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Errors raised by the detection and pose pipeline.
///
/// Not finding a marker is never an error; those outcomes are empty results.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid buffer: expected {expected} bytes, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },
    #[error("frame has no pixels")]
    EmptyFrame,
    #[error("invalid detector parameters: {0}")]
    InvalidParams(String),
    #[error("pose estimation failed: {0}")]
    PoseEstimationFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod core;
pub mod cv;
pub mod logger;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(feature = "wasm")]
pub mod wasm_bridge;

pub use crate::core::camera::CameraCalibration;
pub use crate::core::detector::{DetectedMarker, FrameResult, MarkerDetector};
pub use crate::core::monitor::{FrameSource, Monitor, MonitorHandle, OwnedFrame};
pub use crate::core::params::{CornerRefineParams, DetectorParams};
pub use crate::core::pose::{PoseEstimator, Transformation};
pub use crate::core::recognizer::Marker;
pub use crate::core::symbol::{Decoding, SymbolGrid, TEMPLATE_CODEWORD};
pub use crate::cv::scalar::ScalarCV;
