/// FER+ expression classifier using ONNX Runtime.
///
/// Input is a 64×64 grayscale crop around the landmark bounding box, raw
/// 0–255 intensities; outputs eight logits in `Expression::ALL` order.
use std::path::Path;

use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::expression::ExpressionScores;
use crate::detection::domain::expression_classifier::ExpressionClassifier;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

use super::onnx_session::{open_session, run_single};

const INPUT_SIZE: u32 = 64;
const CROP_ENLARGE: f64 = 1.25;

pub struct OnnxExpressionClassifier {
    session: ort::session::Session,
}

impl OnnxExpressionClassifier {
    pub fn new(model_path: &Path) -> Result<Self, CapabilityError> {
        Ok(Self {
            session: open_session(model_path)?,
        })
    }
}

impl ExpressionClassifier for OnnxExpressionClassifier {
    fn classify(
        &mut self,
        frame: &Frame,
        landmarks: &FaceLandmarks,
    ) -> Result<ExpressionScores, CapabilityError> {
        let aligned = landmarks
            .bounding_region()
            .ok_or("cannot classify a face without landmarks")?;
        let patch = frame.sample_patch(&aligned.enlarged_square(CROP_ENLARGE), INPUT_SIZE);
        let (_, logits) = run_single(&mut self.session, grayscale_tensor(&patch))?;
        Ok(ExpressionScores::from_logits(&logits)?)
    }
}

/// `[1, 1, H, W]` luma tensor (ITU-R BT.601 weights).
fn grayscale_tensor(patch: &Frame) -> ndarray::Array4<f32> {
    let rgb = patch.as_ndarray();
    let (h, w) = (patch.height() as usize, patch.width() as usize);
    ndarray::Array4::from_shape_fn((1, 1, h, w), |(_, _, y, x)| {
        0.299 * rgb[[y, x, 0]] as f32 + 0.587 * rgb[[y, x, 1]] as f32 + 0.114 * rgb[[y, x, 2]] as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grayscale_tensor_shape_and_luma() {
        let patch = Frame::filled(INPUT_SIZE, INPUT_SIZE, [255, 0, 0], 0);
        let t = grayscale_tensor(&patch);
        assert_eq!(t.shape(), &[1, 1, 64, 64]);
        assert_relative_eq!(t[[0, 0, 10, 10]], 0.299 * 255.0, epsilon = 1e-3);
    }

    #[test]
    fn test_white_is_full_intensity() {
        let patch = Frame::filled(2, 2, [255, 255, 255], 0);
        let t = grayscale_tensor(&patch);
        assert_relative_eq!(t[[0, 0, 1, 1]], 255.0, epsilon = 1e-2);
    }

    #[test]
    fn test_missing_model_file_is_error() {
        assert!(OnnxExpressionClassifier::new(Path::new("/nonexistent/ferplus.onnx")).is_err());
    }
}
