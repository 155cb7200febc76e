//! 68-point facial landmark regressor using ONNX Runtime.
//!
//! The face box is squared and enlarged before cropping so the whole jaw
//! line fits. The bundled `face_landmarks.onnx` takes a 128x128 RGB patch
//! scaled to `[0, 1]` in NHWC order and returns 68 `(x, y)` pairs in
//! input-pixel units of that patch.
use std::path::Path;

use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::landmark_locator::LandmarkLocator;
use crate::shared::constants::NUM_FACE_LANDMARKS;
use crate::shared::frame::Frame;
use crate::shared::region::{Point, Region};

use super::onnx_session::{first_input_shape, open_session, run_single};

const DEFAULT_INPUT_SIZE: u32 = 128;
const CROP_ENLARGE: f64 = 1.2;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Layout {
    Nchw,
    Nhwc,
}

pub struct OnnxLandmarkLocator {
    session: ort::session::Session,
    input_size: u32,
    layout: Layout,
}

impl OnnxLandmarkLocator {
    pub fn new(model_path: &Path) -> Result<Self, CapabilityError> {
        let session = open_session(model_path)?;
        let (input_size, layout) = first_input_shape(&session)
            .map(|shape| infer_input(&shape))
            .unwrap_or((DEFAULT_INPUT_SIZE, Layout::Nhwc));
        Ok(Self {
            session,
            input_size,
            layout,
        })
    }
}

impl LandmarkLocator for OnnxLandmarkLocator {
    fn locate(&mut self, frame: &Frame, region: &Region) -> Result<FaceLandmarks, CapabilityError> {
        if region.width <= 0.0 || region.height <= 0.0 {
            return Ok(FaceLandmarks::default());
        }
        let crop = region.enlarged_square(CROP_ENLARGE);
        let patch = frame.sample_patch(&crop, self.input_size);
        let (_, output) = match self.layout {
            Layout::Nhwc => run_single(&mut self.session, patch_tensor_nhwc(&patch))?,
            Layout::Nchw => run_single(&mut self.session, patch_tensor_nchw(&patch))?,
        };
        decode_points(&output, &crop, self.input_size)
    }
}

/// Read edge size and channel placement from a 4-D input shape.
fn infer_input(shape: &[i64]) -> (u32, Layout) {
    if shape.len() != 4 {
        return (DEFAULT_INPUT_SIZE, Layout::Nhwc);
    }
    if shape[3] == 3 {
        let edge = if shape[1] > 0 { shape[1] as u32 } else { DEFAULT_INPUT_SIZE };
        (edge, Layout::Nhwc)
    } else {
        let edge = if shape[2] > 0 { shape[2] as u32 } else { DEFAULT_INPUT_SIZE };
        (edge, Layout::Nchw)
    }
}

fn patch_tensor_nhwc(patch: &Frame) -> ndarray::Array4<f32> {
    patch
        .as_ndarray()
        .mapv(|v| v as f32 / 255.0)
        .insert_axis(ndarray::Axis(0))
}

fn patch_tensor_nchw(patch: &Frame) -> ndarray::Array4<f32> {
    patch_tensor_nhwc(patch).permuted_axes([0, 3, 1, 2]).as_standard_layout().to_owned()
}

/// Map `[x0, y0, x1, y1, ...]` in patch pixels back to frame pixels.
fn decode_points(
    output: &[f32],
    crop: &Region,
    input_size: u32,
) -> Result<FaceLandmarks, CapabilityError> {
    if output.len() < NUM_FACE_LANDMARKS * 2 {
        return Err(format!(
            "landmark model returned {} values, expected {}",
            output.len(),
            NUM_FACE_LANDMARKS * 2
        )
        .into());
    }
    let edge = input_size.max(1) as f64;
    let points = output[..NUM_FACE_LANDMARKS * 2]
        .chunks_exact(2)
        .map(|xy| {
            Point::new(
                crop.x + xy[0] as f64 * crop.width / edge,
                crop.y + xy[1] as f64 * crop.height / edge,
            )
        })
        .collect();
    Ok(FaceLandmarks::new(points))
}
