use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::detector_options::DetectorOptions;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A detected face box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub region: Region,
    pub score: f64,
}

/// Domain interface for face detection.
///
/// Implementations may hold inference sessions with mutable state,
/// hence `&mut self`.
pub trait FaceDetector: Send {
    /// Apply working resolution and confidence threshold before the first
    /// `detect` call. Default: ignore.
    fn configure(&mut self, _options: &DetectorOptions) {}

    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, CapabilityError>;
}
