//! Webcam capture through nokhwa.
//!
//! The camera handle is not `Send`, so it is opened and driven entirely on
//! the capture thread. The thread reports the open result back once, then
//! keeps publishing the newest decoded frame into a [`LiveFrameSlot`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{
    CameraConstraints, FacingMode, FrameHandle, FrameSource, MediaAccessError, PlaybackState,
};
use crate::video::infrastructure::live_frame_slot::LiveFrameSlot;

const REQUESTED_FPS: u32 = 30;

/// How long to wait for the device to open before giving up.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CameraSource {
    slot: Arc<LiveFrameSlot>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Open the camera described by `constraints` and start capturing.
    ///
    /// Returns once the device is open and streaming; the first frame may
    /// still be pending.
    pub fn acquire(
        constraints: CameraConstraints,
        open_timeout: Duration,
    ) -> Result<Self, MediaAccessError> {
        if constraints.facing == FacingMode::Environment {
            log::debug!("Facing mode is advisory; using camera index {}", constraints.index);
        }

        let slot = Arc::new(LiveFrameSlot::new());
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let slot_clone = Arc::clone(&slot);
        let running_clone = Arc::clone(&running);
        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                let camera = match open_camera(&constraints) {
                    Ok(camera) => {
                        let _ = ready_tx.send(Ok(()));
                        camera
                    }
                    Err(e) => {
                        slot_clone.fail(e.to_string());
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                capture_loop(camera, &slot_clone, &running_clone);
            })
            .map_err(|e| MediaAccessError::Stream(format!("failed to spawn capture thread: {e}")))?;

        let mut source = Self {
            slot,
            running,
            thread_handle: Some(thread_handle),
        };

        match ready_rx.recv_timeout(open_timeout) {
            Ok(Ok(())) => Ok(source),
            Ok(Err(e)) => {
                source.stop();
                Err(e)
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // The open call may be stuck in the driver; don't join it.
                source.running.store(false, Ordering::Release);
                source.thread_handle = None;
                source.slot.end();
                Err(MediaAccessError::Timeout(open_timeout))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                source.stop();
                Err(MediaAccessError::Stream("capture thread exited".to_string()))
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn playback(&self) -> PlaybackState {
        self.slot.playback()
    }

    fn wait_until_playing(&self, timeout: Duration) -> Result<(), MediaAccessError> {
        self.slot.wait_until_playing(timeout)
    }

    fn current_frame(&self) -> Option<FrameHandle> {
        self.slot.latest()
    }

    fn resolution(&self) -> Option<DisplayGeometry> {
        self.slot.resolution()
    }

    fn pause(&self) {
        self.slot.pause();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.slot.end();
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_camera(constraints: &CameraConstraints) -> Result<Camera, MediaAccessError> {
    let devices = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| MediaAccessError::Stream(format!("cannot enumerate cameras: {e}")))?;
    if constraints.index as usize >= devices.len() {
        return Err(MediaAccessError::NoDevice {
            index: constraints.index,
        });
    }

    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ),
    ));
    let mut camera =
        Camera::new(CameraIndex::Index(constraints.index), requested).map_err(classify_error)?;
    camera.open_stream().map_err(classify_error)?;

    log::info!(
        "Camera opened: {} ({}x{})",
        camera.info().human_name(),
        camera.resolution().width(),
        camera.resolution().height()
    );
    Ok(camera)
}

fn capture_loop(mut camera: Camera, slot: &LiveFrameSlot, running: &AtomicBool) {
    let mut index = 0usize;
    while running.load(Ordering::Acquire) {
        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(image) => {
                    let (w, h) = (image.width(), image.height());
                    slot.publish(Frame::new(image.into_raw(), w, h, index));
                    index += 1;
                }
                Err(e) => log::warn!("Failed to decode camera frame: {e}"),
            },
            Err(e) => {
                log::warn!("Failed to capture frame: {e}");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop camera stream: {e}");
    }
    slot.end();
    log::info!("Camera capture stopped after {index} frames");
}

/// Platform backends report denied access only through their message text.
fn classify_error(e: nokhwa::NokhwaError) -> MediaAccessError {
    let message = e.to_string();
    classify_message(message)
}

fn classify_message(message: String) -> MediaAccessError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        MediaAccessError::PermissionDenied(message)
    } else {
        MediaAccessError::Stream(message)
    }
}
