#![cfg(target_arch = "wasm32")]
#![cfg(feature = "wasm")]

use crate::core::detector::{DetectedMarker, MarkerDetector};
use crate::cv::scalar::ScalarCV;
use crate::{CameraCalibration, Frame, PixelFormat};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
pub struct WasmPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize)]
pub struct WasmMarker {
    pub corners: Vec<WasmPoint>,
    pub rotation: usize,
    /// Column-major model-view matrix, absent when the pose could not be solved.
    pub pose: Option<Vec<f32>>,
}

impl From<&DetectedMarker> for WasmMarker {
    fn from(detected: &DetectedMarker) -> Self {
        WasmMarker {
            corners: detected
                .marker
                .corners
                .iter()
                .map(|p| WasmPoint { x: p.x, y: p.y })
                .collect(),
            rotation: detected.marker.rotation,
            pose: detected.pose.map(|t| t.to_gl_array().to_vec()),
        }
    }
}

#[derive(Serialize)]
struct WasmFrameResult {
    markers: Vec<WasmMarker>,
    current_pose: Option<Vec<f32>>,
}

/// JS-facing detector for RGBA canvas frames.
#[wasm_bindgen]
pub struct WasmMarkerDetector {
    detector: MarkerDetector<ScalarCV>,
}

#[wasm_bindgen]
impl WasmMarkerDetector {
    #[wasm_bindgen(constructor)]
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> WasmMarkerDetector {
        let camera = CameraCalibration::new(fx, fy, cx, cy);
        WasmMarkerDetector {
            detector: MarkerDetector::new(ScalarCV, camera),
        }
    }

    /// Runs one frame. `image_data` is the `ImageData.data` of a canvas.
    pub fn detect_image(
        &mut self,
        width: u32,
        height: u32,
        image_data: &[u8],
    ) -> Result<JsValue, JsValue> {
        let frame = Frame::new(image_data, width, height, PixelFormat::Rgba8)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let result = self
            .detector
            .process_frame(&frame)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let out = WasmFrameResult {
            markers: result.markers.iter().map(WasmMarker::from).collect(),
            current_pose: result.current_pose.map(|t| t.to_gl_array().to_vec()),
        };
        serde_wasm_bindgen::to_value(&out).map_err(JsValue::from)
    }
}
