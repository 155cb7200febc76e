use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;

/// Shared, read-only reference to a captured frame. Cloning never copies
/// pixel data.
#[derive(Clone, Debug)]
pub struct FrameHandle(Arc<Frame>);

impl FrameHandle {
    pub fn new(frame: Frame) -> Self {
        Self(Arc::new(frame))
    }
}

impl Deref for FrameHandle {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Acquired, no frame delivered yet.
    Pending,
    Playing,
    Paused,
    /// Stopped, torn down, or out of frames. Terminal.
    Ended,
}

/// Which way the requested camera should face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraConstraints {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaAccessError {
    #[error("no camera device at index {index}")]
    NoDevice { index: u32 },
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("video stream failed: {0}")]
    Stream(String),
    #[error("video source did not start within {0:?}")]
    Timeout(Duration),
}

/// A live view onto a video surface.
///
/// The source keeps only its most recent frame; readers sample it when
/// they are ready and anything older is gone.
pub trait FrameSource: Send {
    fn playback(&self) -> PlaybackState;

    /// Block until the first frame is available.
    fn wait_until_playing(&self, timeout: Duration) -> Result<(), MediaAccessError>;

    /// Latest frame, if any has been captured yet.
    fn current_frame(&self) -> Option<FrameHandle>;

    /// Native size of the frames this source delivers.
    fn resolution(&self) -> Option<DisplayGeometry>;

    /// Freeze the surface. The current frame stays readable.
    fn pause(&self);

    /// Release the device or file. Idempotent.
    fn stop(&mut self);
}
