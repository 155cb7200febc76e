use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::detection::domain::detection::{Detection, DetectionBatch};

const LABEL_GAP: f64 = 8.0;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("overlay surface has zero size")]
    SurfaceNotReady,
    #[error("failed to write overlay snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}

/// Text placed next to a face, in display coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Caption for one detection: dominant expression and its confidence,
/// anchored just below the face box.
pub fn label_for(detection: &Detection) -> OverlayLabel {
    let (expression, probability) = detection.expressions.dominant();
    OverlayLabel {
        text: format!("{expression} {:.1}%", probability * 100.0),
        x: detection.region.x,
        y: detection.region.bottom() + LABEL_GAP,
    }
}

/// Draws one batch over the video. Each call replaces whatever the
/// previous call drew.
pub trait OverlayRenderer: Send {
    fn render(&mut self, batch: &DetectionBatch) -> Result<(), RenderError>;
}

/// Lets the loop draw into a renderer that another thread also reads.
impl<R: OverlayRenderer> OverlayRenderer for Arc<Mutex<R>> {
    fn render(&mut self, batch: &DetectionBatch) -> Result<(), RenderError> {
        self.lock().render(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::expression::{Expression, ExpressionScores};
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::shared::region::Region;

    #[test]
    fn test_label_names_dominant_expression_below_box() {
        let detection = Detection {
            region: Region::new(10.0, 20.0, 50.0, 40.0),
            score: 0.8,
            landmarks: FaceLandmarks::default(),
            expressions: ExpressionScores::new(vec![
                (Expression::Sad, 0.25),
                (Expression::Surprised, 0.75),
            ])
            .unwrap(),
        };
        let label = label_for(&detection);
        assert_eq!(label.text, "surprised 75.0%");
        assert_eq!(label.x, 10.0);
        assert_eq!(label.y, 68.0);
    }
}
