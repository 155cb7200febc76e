use ndarray::ArrayView3;

use crate::shared::region::Region;

pub const CHANNELS: usize = 3;

/// A single video frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at the capture boundary only; detection code
/// treats pixel data as opaque RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Solid-colour frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Monotonic position of this frame within its source.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    /// Nearest-neighbour resample of `region` into a `size`×`size` patch.
    ///
    /// The region may extend past the frame; out-of-bounds samples repeat
    /// the nearest edge pixel.
    pub fn sample_patch(&self, region: &Region, size: u32) -> Frame {
        let s = size as usize;
        let mut data = Vec::with_capacity(s * s * CHANNELS);
        if self.is_empty() {
            data.resize(s * s * CHANNELS, 0);
            return Frame::new(data, size, size, self.index);
        }

        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let step_x = region.width / size as f64;
        let step_y = region.height / size as f64;

        for py in 0..s {
            let sy = (region.y + (py as f64 + 0.5) * step_y).clamp(0.0, max_y) as u32;
            for px in 0..s {
                let sx = (region.x + (px as f64 + 0.5) * step_x).clamp(0.0, max_x) as u32;
                data.extend_from_slice(&self.pixel(sx, sy));
            }
        }

        Frame::new(data, size, size, self.index)
    }
}
