//! Transparent RGBA overlay drawn with imageproc.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detection::domain::detection::{Detection, DetectionBatch};
use crate::overlay::domain::overlay_renderer::{
    label_for, OverlayLabel, OverlayRenderer, RenderError,
};
use crate::shared::display_geometry::DisplayGeometry;

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([255, 105, 180, 255]);
const BAR_COLOR: Rgba<u8> = Rgba([255, 255, 255, 200]);
const LANDMARK_RADIUS: i32 = 2;
const BAR_GAP: f64 = 2.0;
const BAR_HEIGHT: u32 = 4;

/// Owns the overlay surface outright; nothing else writes to it.
pub struct RasterOverlayRenderer {
    surface: RgbaImage,
    labels: Vec<OverlayLabel>,
}

impl RasterOverlayRenderer {
    pub fn new(display: DisplayGeometry) -> Self {
        Self {
            surface: RgbaImage::new(display.width, display.height),
            labels: Vec::new(),
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Expression captions from the last render, one per detection.
    pub fn labels(&self) -> &[OverlayLabel] {
        &self.labels
    }

    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        self.surface
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    fn draw_detection(&mut self, detection: &Detection) {
        let r = &detection.region;
        let width = r.width.round().max(1.0) as u32;
        let height = r.height.round().max(1.0) as u32;
        draw_hollow_rect_mut(
            &mut self.surface,
            Rect::at(r.x.round() as i32, r.y.round() as i32).of_size(width, height),
            BOX_COLOR,
        );

        for p in detection.landmarks.points() {
            draw_filled_circle_mut(
                &mut self.surface,
                (p.x.round() as i32, p.y.round() as i32),
                LANDMARK_RADIUS,
                LANDMARK_COLOR,
            );
        }

        let (_, probability) = detection.expressions.dominant();
        let bar_width = (r.width * probability as f64).round() as u32;
        if bar_width > 0 {
            draw_filled_rect_mut(
                &mut self.surface,
                Rect::at(r.x.round() as i32, (r.bottom() + BAR_GAP).round() as i32)
                    .of_size(bar_width, BAR_HEIGHT),
                BAR_COLOR,
            );
        }

        self.labels.push(label_for(detection));
    }
}

impl OverlayRenderer for RasterOverlayRenderer {
    fn render(&mut self, batch: &DetectionBatch) -> Result<(), RenderError> {
        if self.surface.width() == 0 || self.surface.height() == 0 {
            return Err(RenderError::SurfaceNotReady);
        }

        self.surface.fill(0);
        self.labels.clear();
        for detection in batch {
            self.draw_detection(detection);
        }
        Ok(())
    }
}
