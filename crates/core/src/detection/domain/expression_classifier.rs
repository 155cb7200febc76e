use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::expression::ExpressionScores;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

/// Scores a landmark-aligned face crop against the expression labels.
pub trait ExpressionClassifier: Send {
    fn classify(
        &mut self,
        frame: &Frame,
        landmarks: &FaceLandmarks,
    ) -> Result<ExpressionScores, CapabilityError>;
}
