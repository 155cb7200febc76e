use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use thiserror::Error;

use crate::detection::domain::detection_cascade::{CapabilityCascade, DetectionCascade};
use crate::detection::infrastructure::capability_loader::{CapabilityLoader, ModelLoadError};
use crate::pipeline::detection_loop::{DetectionLoop, LoopReport, LoopState};
use crate::video::domain::frame_source::{FrameSource, MediaAccessError};

/// User-visible lifecycle of the whole pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineStatus {
    Uninitialized,
    LoadingModels,
    AcquiringCamera,
    Running,
    Stopped,
    /// Terminal. Carries the message to show the user.
    Failed(String),
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Uninitialized => f.write_str("uninitialized"),
            PipelineStatus::LoadingModels => f.write_str("loading models"),
            PipelineStatus::AcquiringCamera => f.write_str("acquiring camera"),
            PipelineStatus::Running => f.write_str("running"),
            PipelineStatus::Stopped => f.write_str("stopped"),
            PipelineStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error(transparent)]
    Models(#[from] ModelLoadError),
    #[error("video source unavailable: {0}")]
    Media(#[from] MediaAccessError),
    #[error("pipeline cannot start while {0}")]
    InvalidState(PipelineStatus),
    #[error("failed to spawn detection loop thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Sequences model loading, source acquisition and the detection loop.
///
/// The loop runs on its own thread; `status()` can be read from anywhere.
/// `Running` is only reported once the source has started playing.
/// A start failure leaves the controller in `Failed` for good.
pub struct PipelineController {
    status: Arc<Mutex<PipelineStatus>>,
    stop: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<Option<LoopReport>>>,
}

impl PipelineController {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(PipelineStatus::Uninitialized)),
            stop: None,
            handle: None,
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.lock().clone()
    }

    /// Loads models from `models_dir`, then calls `acquire` for the frame
    /// source and `assemble` to wrap the cascade in a configured loop.
    ///
    /// `acquire` is never called if model loading fails.
    pub fn start<A, B>(
        &mut self,
        loader: &CapabilityLoader,
        models_dir: &Path,
        acquire: A,
        assemble: B,
    ) -> Result<(), StartError>
    where
        A: FnOnce() -> Result<Box<dyn FrameSource>, MediaAccessError>,
        B: FnOnce(Box<dyn DetectionCascade>) -> DetectionLoop,
    {
        let current = self.status();
        if !matches!(
            current,
            PipelineStatus::Uninitialized | PipelineStatus::Stopped
        ) {
            return Err(StartError::InvalidState(current));
        }

        self.set_status(PipelineStatus::LoadingModels);
        let capabilities = loader.load_all(models_dir).map_err(|e| self.fail(e))?;

        self.set_status(PipelineStatus::AcquiringCamera);
        let mut source = acquire().map_err(|e| self.fail(e))?;

        let playing = Arc::clone(&self.status);
        let mut detection_loop = assemble(Box::new(CapabilityCascade::new(capabilities)))
            .with_state_listener(Box::new(move |state| {
                if state == LoopState::Running {
                    log::debug!("Pipeline {}", PipelineStatus::Running);
                    *playing.lock() = PipelineStatus::Running;
                }
            }));
        self.stop = Some(detection_loop.stop_handle());

        let status = Arc::clone(&self.status);
        let handle = thread::Builder::new()
            .name("detection-loop".into())
            .spawn(move || {
                let outcome = detection_loop.run(source.as_ref());
                source.stop();
                match outcome {
                    Ok(report) => {
                        log::info!(
                            "Detection loop ended {:?} after {} batches ({} cascade failures)",
                            report.final_state,
                            report.published,
                            report.cascade_failures
                        );
                        *status.lock() = PipelineStatus::Stopped;
                        Some(report)
                    }
                    Err(e) => {
                        log::error!("Detection loop could not start: {e}");
                        *status.lock() = PipelineStatus::Failed(e.to_string());
                        None
                    }
                }
            })
            .map_err(|e| self.fail(StartError::Spawn(e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Asks the loop to stop at its next guard check and waits for it.
    pub fn stop(&mut self) -> Option<LoopReport> {
        if let Some(stop) = &self.stop {
            stop.store(true, Ordering::Relaxed);
        }
        self.wait()
    }

    /// Waits for the loop to finish on its own.
    pub fn wait(&mut self) -> Option<LoopReport> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(report) => report,
            Err(_) => {
                self.set_status(PipelineStatus::Failed("detection loop panicked".into()));
                None
            }
        }
    }

    fn set_status(&self, status: PipelineStatus) {
        log::debug!("Pipeline {status}");
        *self.status.lock() = status;
    }

    fn fail<E: Into<StartError>>(&self, error: E) -> StartError {
        let error = error.into();
        log::error!("Pipeline failed to start: {error}");
        self.set_status(PipelineStatus::Failed(error.to_string()));
        error
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::detection::domain::capability::CapabilityError;
    use crate::detection::domain::expression::{Expression, ExpressionScores};
    use crate::detection::domain::expression_classifier::ExpressionClassifier;
    use crate::detection::domain::face_detector::{FaceBox, FaceDetector};
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::detection::domain::landmark_locator::LandmarkLocator;
    use crate::detection::infrastructure::capability_loader::CapabilityFactory;
    use crate::pipeline::detection_loop::{LoopConfig, LoopState};
    use crate::pipeline::refresh_clock::RefreshClock;
    use crate::shared::display_geometry::DisplayGeometry;
    use crate::shared::frame::Frame;
    use crate::shared::region::{Point, Region};
    use crate::video::domain::frame_source::{FrameHandle, PlaybackState};

    struct OneFaceDetector;
    impl FaceDetector for OneFaceDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, CapabilityError> {
            Ok(vec![FaceBox {
                region: Region::new(1.0, 1.0, 4.0, 4.0),
                score: 0.9,
            }])
        }
    }

    struct CornerLandmarker;
    impl LandmarkLocator for CornerLandmarker {
        fn locate(&mut self, _f: &Frame, r: &Region) -> Result<FaceLandmarks, CapabilityError> {
            Ok(FaceLandmarks::new(vec![Point::new(r.x, r.y)]))
        }
    }

    struct HappyClassifier;
    impl ExpressionClassifier for HappyClassifier {
        fn classify(
            &mut self,
            _f: &Frame,
            _l: &FaceLandmarks,
        ) -> Result<ExpressionScores, CapabilityError> {
            Ok(ExpressionScores::new(vec![(Expression::Happy, 1.0)])?)
        }
    }

    struct StubFactory {
        fail_detector: bool,
    }

    impl CapabilityFactory for StubFactory {
        fn detector(&self, _path: &Path) -> Result<Box<dyn FaceDetector>, CapabilityError> {
            if self.fail_detector {
                return Err("model file is truncated".into());
            }
            Ok(Box::new(OneFaceDetector))
        }

        fn landmarker(&self, _path: &Path) -> Result<Box<dyn LandmarkLocator>, CapabilityError> {
            Ok(Box::new(CornerLandmarker))
        }

        fn expression_classifier(
            &self,
            _path: &Path,
        ) -> Result<Box<dyn ExpressionClassifier>, CapabilityError> {
            Ok(Box::new(HappyClassifier))
        }
    }

    /// Plays `remaining` frames (forever if `None`), then ends. Playback
    /// only starts once `gate` is open.
    struct CountingSource {
        remaining: parking_lot::Mutex<Option<usize>>,
        served: AtomicUsize,
        stopped: Arc<AtomicBool>,
        gate: Arc<AtomicBool>,
    }

    impl CountingSource {
        fn boxed(frames: Option<usize>, stopped: Arc<AtomicBool>) -> Box<dyn FrameSource> {
            Self::gated(frames, stopped, Arc::new(AtomicBool::new(true)))
        }

        fn gated(
            frames: Option<usize>,
            stopped: Arc<AtomicBool>,
            gate: Arc<AtomicBool>,
        ) -> Box<dyn FrameSource> {
            Box::new(Self {
                remaining: parking_lot::Mutex::new(frames),
                served: AtomicUsize::new(0),
                stopped,
                gate,
            })
        }
    }

    impl FrameSource for CountingSource {
        fn playback(&self) -> PlaybackState {
            match *self.remaining.lock() {
                Some(0) => PlaybackState::Ended,
                _ => PlaybackState::Playing,
            }
        }

        fn wait_until_playing(&self, _timeout: Duration) -> Result<(), MediaAccessError> {
            while !self.gate.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }

        fn current_frame(&self) -> Option<FrameHandle> {
            if let Some(n) = self.remaining.lock().as_mut() {
                *n = n.saturating_sub(1);
            }
            let index = self.served.fetch_add(1, Ordering::SeqCst);
            Some(FrameHandle::new(Frame::filled(8, 8, [0, 0, 0], index)))
        }

        fn resolution(&self) -> Option<DisplayGeometry> {
            Some(DisplayGeometry::new(8, 8))
        }

        fn pause(&self) {}

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    struct BusyClock;
    impl RefreshClock for BusyClock {
        fn wait_next(&mut self) -> u64 {
            std::thread::sleep(Duration::from_millis(1));
            0
        }
    }

    fn loader(fail_detector: bool) -> CapabilityLoader {
        CapabilityLoader::new(Arc::new(StubFactory { fail_detector }))
    }

    fn assemble(cascade: Box<dyn DetectionCascade>) -> DetectionLoop {
        DetectionLoop::new(cascade, Box::new(BusyClock), LoopConfig::default())
    }

    fn wait_for_status(controller: &PipelineController, expected: PipelineStatus) {
        for _ in 0..1000 {
            if controller.status() == expected {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("status stuck at {}, expected {expected}", controller.status());
    }

    #[test]
    fn test_model_failure_never_acquires_source() {
        let mut controller = PipelineController::new();
        let acquired = AtomicBool::new(false);

        let err = controller
            .start(
                &loader(true),
                Path::new("/models"),
                || {
                    acquired.store(true, Ordering::SeqCst);
                    Err(MediaAccessError::NoDevice { index: 0 })
                },
                assemble,
            )
            .unwrap_err();

        assert!(matches!(err, StartError::Models(_)));
        assert!(!acquired.load(Ordering::SeqCst));
        match controller.status() {
            PipelineStatus::Failed(reason) => assert!(reason.contains("model file is truncated")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_media_failure_is_terminal() {
        let mut controller = PipelineController::new();
        let err = controller
            .start(
                &loader(false),
                Path::new("/models"),
                || Err(MediaAccessError::PermissionDenied("user declined".into())),
                assemble,
            )
            .unwrap_err();
        assert!(matches!(err, StartError::Media(_)));
        assert!(matches!(controller.status(), PipelineStatus::Failed(_)));

        let again = controller.start(
            &loader(false),
            Path::new("/models"),
            || Err(MediaAccessError::NoDevice { index: 0 }),
            assemble,
        );
        assert!(matches!(again, Err(StartError::InvalidState(_))));
    }

    #[test]
    fn test_runs_until_source_ends() {
        let mut controller = PipelineController::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let source_stopped = Arc::clone(&stopped);

        controller
            .start(
                &loader(false),
                Path::new("/models"),
                move || Ok(CountingSource::boxed(Some(3), source_stopped)),
                assemble,
            )
            .unwrap();

        let report = controller.wait().unwrap();
        assert_eq!(report.published, 3);
        assert_eq!(report.final_state, LoopState::Stopped);
        assert_eq!(controller.status(), PipelineStatus::Stopped);
        assert!(stopped.load(Ordering::SeqCst), "source is stopped when the loop exits");
    }

    #[test]
    fn test_stop_ends_endless_source() {
        let mut controller = PipelineController::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let source_stopped = Arc::clone(&stopped);

        controller
            .start(
                &loader(false),
                Path::new("/models"),
                move || Ok(CountingSource::boxed(None, source_stopped)),
                assemble,
            )
            .unwrap();
        wait_for_status(&controller, PipelineStatus::Running);

        std::thread::sleep(Duration::from_millis(20));
        let report = controller.stop().unwrap();
        assert_eq!(report.final_state, LoopState::Stopped);
        assert_eq!(controller.status(), PipelineStatus::Stopped);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_status_stays_acquiring_until_source_plays() {
        let mut controller = PipelineController::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(AtomicBool::new(false));
        let (source_stopped, source_gate) = (Arc::clone(&stopped), Arc::clone(&gate));

        controller
            .start(
                &loader(false),
                Path::new("/models"),
                move || Ok(CountingSource::gated(None, source_stopped, source_gate)),
                assemble,
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(controller.status(), PipelineStatus::AcquiringCamera);

        gate.store(true, Ordering::SeqCst);
        wait_for_status(&controller, PipelineStatus::Running);

        controller.stop().unwrap();
        assert_eq!(controller.status(), PipelineStatus::Stopped);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PipelineStatus::AcquiringCamera.to_string(), "acquiring camera");
        assert_eq!(
            PipelineStatus::Failed("no camera".into()).to_string(),
            "failed: no camera"
        );
    }
}
