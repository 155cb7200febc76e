use crate::detection::domain::capability::CapabilityError;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Locates facial landmark points inside a detected face region.
///
/// Returned points are in source-frame pixel coordinates.
pub trait LandmarkLocator: Send {
    fn locate(&mut self, frame: &Frame, region: &Region) -> Result<FaceLandmarks, CapabilityError>;
}
