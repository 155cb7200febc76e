use crate::shared::constants::{DEFAULT_DETECTOR_INPUT_SIZE, DEFAULT_SCORE_THRESHOLD};

/// Detector configuration, fixed for the lifetime of a detection loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    /// Square working resolution the frame is letterboxed into.
    pub input_size: u32,
    /// Minimum confidence for a face box to be kept.
    pub score_threshold: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_DETECTOR_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}
