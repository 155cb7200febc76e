use std::fmt;

use crate::detection::domain::expression_classifier::ExpressionClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::landmark_locator::LandmarkLocator;

/// Error type returned by inference capabilities. Boxed so adapters can
/// surface their runtime's own errors; `Send + Sync` so it can cross the
/// loader's threads.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// The three inference capabilities the cascade needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Detector,
    Landmarker,
    ExpressionClassifier,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Detector,
        CapabilityKind::Landmarker,
        CapabilityKind::ExpressionClassifier,
    ];
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Detector => "face detector",
            CapabilityKind::Landmarker => "landmark locator",
            CapabilityKind::ExpressionClassifier => "expression classifier",
        };
        f.write_str(name)
    }
}

/// Loaded, ready-to-run capabilities. Moved into the detection cascade.
pub struct CapabilitySet {
    pub detector: Box<dyn FaceDetector>,
    pub landmarker: Box<dyn LandmarkLocator>,
    pub expression_classifier: Box<dyn ExpressionClassifier>,
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySet").finish_non_exhaustive()
    }
}
