//! Detector → landmarks → expressions, run as one unit per frame.

use thiserror::Error;

use crate::detection::domain::capability::{CapabilityError, CapabilitySet};
use crate::detection::domain::detection::Detection;
use crate::detection::domain::detector_options::DetectorOptions;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("face detection failed: {0}")]
    Detection(#[source] CapabilityError),
}

/// A full per-frame analysis. The detection loop treats one `analyze`
/// call as a single in-flight inference.
pub trait DetectionCascade: Send {
    fn configure(&mut self, _options: &DetectorOptions) {}

    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, CascadeError>;
}

/// Cascade over the three loaded capabilities.
///
/// A detector failure fails the whole frame. A landmark or expression
/// failure drops only the affected face.
pub struct CapabilityCascade {
    capabilities: CapabilitySet,
}

impl CapabilityCascade {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self { capabilities }
    }
}

impl DetectionCascade for CapabilityCascade {
    fn configure(&mut self, options: &DetectorOptions) {
        self.capabilities.detector.configure(options);
    }

    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, CascadeError> {
        let boxes = self
            .capabilities
            .detector
            .detect(frame)
            .map_err(CascadeError::Detection)?;

        let mut detections = Vec::with_capacity(boxes.len());
        for face in boxes {
            let landmarks = match self.capabilities.landmarker.locate(frame, &face.region) {
                Ok(lm) if !lm.is_empty() => lm,
                Ok(_) => {
                    log::debug!("Frame {}: no landmarks for face, dropped", frame.index());
                    continue;
                }
                Err(e) => {
                    log::warn!("Frame {}: landmark location failed: {e}", frame.index());
                    continue;
                }
            };

            let expressions = match self
                .capabilities
                .expression_classifier
                .classify(frame, &landmarks)
            {
                Ok(scores) => scores,
                Err(e) => {
                    log::warn!("Frame {}: expression classification failed: {e}", frame.index());
                    continue;
                }
            };

            detections.push(Detection {
                region: face.region,
                score: face.score,
                landmarks,
                expressions,
            });
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::expression::{Expression, ExpressionScores};
    use crate::detection::domain::expression_classifier::ExpressionClassifier;
    use crate::detection::domain::face_detector::{FaceBox, FaceDetector};
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::detection::domain::landmark_locator::LandmarkLocator;
    use crate::shared::region::{Point, Region};
    use std::sync::Arc;

    use parking_lot::Mutex;

    struct StubDetector {
        boxes: Vec<FaceBox>,
        fail: bool,
        configured: Arc<Mutex<Option<DetectorOptions>>>,
    }

    impl FaceDetector for StubDetector {
        fn configure(&mut self, options: &DetectorOptions) {
            *self.configured.lock() = Some(*options);
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, CapabilityError> {
            if self.fail {
                return Err("detector exploded".into());
            }
            Ok(self.boxes.clone())
        }
    }

    /// Fails for regions starting at x == 100, returns nothing for x == 200.
    struct StubLandmarker;

    impl LandmarkLocator for StubLandmarker {
        fn locate(
            &mut self,
            _frame: &Frame,
            region: &Region,
        ) -> Result<FaceLandmarks, CapabilityError> {
            if region.x == 100.0 {
                return Err("no landmarks".into());
            }
            if region.x == 200.0 {
                return Ok(FaceLandmarks::default());
            }
            Ok(FaceLandmarks::new(vec![region.center()]))
        }
    }

    /// Fails when the single landmark sits at x == 305 (region x == 300).
    struct StubClassifier;

    impl ExpressionClassifier for StubClassifier {
        fn classify(
            &mut self,
            _frame: &Frame,
            landmarks: &FaceLandmarks,
        ) -> Result<ExpressionScores, CapabilityError> {
            if landmarks.points()[0] == Point::new(305.0, 5.0) {
                return Err("classifier exploded".into());
            }
            Ok(ExpressionScores::new(vec![
                (Expression::Happy, 0.7),
                (Expression::Neutral, 0.3),
            ])?)
        }
    }

    fn face_at(x: f64) -> FaceBox {
        FaceBox {
            region: Region::new(x, 0.0, 10.0, 10.0),
            score: 0.8,
        }
    }

    fn cascade(boxes: Vec<FaceBox>, fail: bool) -> (CapabilityCascade, Arc<Mutex<Option<DetectorOptions>>>) {
        let configured = Arc::new(Mutex::new(None));
        let set = CapabilitySet {
            detector: Box::new(StubDetector {
                boxes,
                fail,
                configured: configured.clone(),
            }),
            landmarker: Box::new(StubLandmarker),
            expression_classifier: Box::new(StubClassifier),
        };
        (CapabilityCascade::new(set), configured)
    }

    #[test]
    fn test_full_detection_per_face() {
        let (mut c, _) = cascade(vec![face_at(0.0), face_at(20.0)], false);
        let frame = Frame::filled(64, 64, [0, 0, 0], 0);
        let dets = c.analyze(&frame).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].region.x, 0.0);
        assert_eq!(dets[1].region.x, 20.0);
        assert_eq!(dets[0].landmarks.len(), 1);
        assert_eq!(dets[0].expressions.dominant().0, Expression::Happy);
    }

    #[test]
    fn test_faces_without_landmarks_or_expressions_are_dropped() {
        let (mut c, _) = cascade(
            vec![face_at(0.0), face_at(100.0), face_at(200.0), face_at(300.0)],
            false,
        );
        let frame = Frame::filled(8, 8, [0, 0, 0], 0);
        let dets = c.analyze(&frame).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].region.x, 0.0);
    }

    #[test]
    fn test_detector_failure_fails_frame() {
        let (mut c, _) = cascade(vec![face_at(0.0)], true);
        let frame = Frame::filled(8, 8, [0, 0, 0], 0);
        let err = c.analyze(&frame).unwrap_err();
        assert!(err.to_string().contains("detector exploded"));
    }

    #[test]
    fn test_configure_reaches_detector() {
        let (mut c, configured) = cascade(vec![], false);
        let opts = DetectorOptions {
            input_size: 320,
            score_threshold: 0.7,
        };
        c.configure(&opts);
        assert_eq!(*configured.lock(), Some(opts));
    }
}
