//! Maps detections from source-frame pixels onto a display surface.
//!
//! The frame is fitted inside the display with one uniform scale and
//! centered, matching how a video element letterboxes its content.

use crate::detection::domain::detection::{Detection, DetectionBatch};
use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::region::{Point, Region};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Letterbox {
    pub const IDENTITY: Letterbox = Letterbox {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Uniform fit of `from` inside `to`. A zero-sized `from` maps as
    /// identity.
    pub fn fit(from: DisplayGeometry, to: DisplayGeometry) -> Self {
        if from.is_empty() {
            return Self::IDENTITY;
        }
        let (fw, fh) = (from.width as f64, from.height as f64);
        let (tw, th) = (to.width as f64, to.height as f64);
        let scale = (tw / fw).min(th / fh);
        Self {
            scale,
            offset_x: (tw - fw * scale) / 2.0,
            offset_y: (th - fh * scale) / 2.0,
        }
    }

    pub fn point(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.offset_x, p.y * self.scale + self.offset_y)
    }

    pub fn region(&self, r: &Region) -> Region {
        Region::new(
            r.x * self.scale + self.offset_x,
            r.y * self.scale + self.offset_y,
            r.width * self.scale,
            r.height * self.scale,
        )
    }
}

/// Rescale every region and landmark of `batch` from `from` to `to`.
///
/// Pure; the returned batch is expressed in `to` coordinates.
pub fn map(batch: &DetectionBatch, from: DisplayGeometry, to: DisplayGeometry) -> DetectionBatch {
    let lb = Letterbox::fit(from, to);
    let detections = batch
        .iter()
        .map(|d| Detection {
            region: lb.region(&d.region),
            score: d.score,
            landmarks: d.landmarks.map_points(|p| lb.point(p)),
            expressions: d.expressions.clone(),
        })
        .collect();
    DetectionBatch::new(batch.frame_index(), to, detections)
}
