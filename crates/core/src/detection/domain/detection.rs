use crate::detection::domain::expression::ExpressionScores;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::region::Region;

/// One analyzed face: where it is, its landmarks and its expression scores.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub region: Region,
    pub score: f64,
    pub landmarks: FaceLandmarks,
    pub expressions: ExpressionScores,
}

/// All detections for one frame, in detector order.
///
/// `resolution` names the coordinate space the regions and landmarks are
/// expressed in: the source frame's size as produced by the cascade, or
/// the display size after coordinate mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBatch {
    frame_index: usize,
    resolution: DisplayGeometry,
    detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(frame_index: usize, resolution: DisplayGeometry, detections: Vec<Detection>) -> Self {
        Self {
            frame_index,
            resolution,
            detections,
        }
    }

    pub fn empty(frame_index: usize, resolution: DisplayGeometry) -> Self {
        Self::new(frame_index, resolution, Vec::new())
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn resolution(&self) -> DisplayGeometry {
        self.resolution
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn first(&self) -> Option<&Detection> {
        self.detections.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::expression::Expression;

    fn detection(x: f64) -> Detection {
        Detection {
            region: Region::new(x, 0.0, 10.0, 10.0),
            score: 0.9,
            landmarks: FaceLandmarks::default(),
            expressions: ExpressionScores::new(vec![(Expression::Neutral, 1.0)]).unwrap(),
        }
    }

    #[test]
    fn test_empty_batch() {
        let batch = DetectionBatch::empty(3, DisplayGeometry::new(640, 480));
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert!(batch.first().is_none());
        assert_eq!(batch.frame_index(), 3);
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch = DetectionBatch::new(
            0,
            DisplayGeometry::new(640, 480),
            vec![detection(1.0), detection(2.0)],
        );
        let xs: Vec<f64> = batch.iter().map(|d| d.region.x).collect();
        assert_eq!(xs, vec![1.0, 2.0]);
        assert_eq!(batch.first().unwrap().region.x, 1.0);
    }
}
