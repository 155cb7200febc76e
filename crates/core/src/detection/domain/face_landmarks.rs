//! Ordered facial landmark points (the 68-point iBUG layout for the bundled
//! locator, though nothing here depends on the count).

use crate::shared::region::{Point, Region};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<Point>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tight box around all points; the landmark-aligned face region.
    pub fn bounding_region(&self) -> Option<Region> {
        Region::bounding(&self.points)
    }

    /// Apply `f` to every point, preserving order.
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> FaceLandmarks {
        FaceLandmarks::new(self.points.iter().copied().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> FaceLandmarks {
        FaceLandmarks::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(0.0, 30.0),
        ])
    }

    #[test]
    fn test_empty_has_no_bounds() {
        let lm = FaceLandmarks::default();
        assert!(lm.is_empty());
        assert!(lm.bounding_region().is_none());
    }

    #[test]
    fn test_bounding_region() {
        let r = triangle().bounding_region().unwrap();
        assert_eq!(r, Region::new(0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_map_points_preserves_order() {
        let moved = triangle().map_points(|p| Point::new(p.x + 1.0, p.y * 2.0));
        assert_eq!(moved.len(), 3);
        assert_eq!(moved.points()[1], Point::new(31.0, 0.0));
        assert_eq!(moved.points()[2], Point::new(1.0, 60.0));
    }
}
