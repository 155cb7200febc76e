use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detection::domain::detection::DetectionBatch;
use crate::detection::domain::detection_cascade::DetectionCascade;
use crate::detection::domain::detector_options::DetectorOptions;
use crate::pipeline::batch_sink::BatchSink;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::refresh_clock::RefreshClock;
use crate::shared::display_geometry::DisplayGeometry;
use crate::video::domain::frame_source::{FrameSource, MediaAccessError, PlaybackState};

const DEFAULT_PLAYBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Called on the loop thread whenever the loop changes state.
pub type StateListener = Box<dyn FnMut(LoopState) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Settings fixed for the lifetime of one run.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub detector: DetectorOptions,
    /// How long to wait for the source to start playing.
    pub playback_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            detector: DetectorOptions::default(),
            playback_timeout: DEFAULT_PLAYBACK_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopReport {
    /// Guard passes, including ones that found no frame.
    pub iterations: usize,
    pub published: usize,
    pub cascade_failures: usize,
    pub final_state: LoopState,
}

/// Drives the detection cascade against a live frame source.
///
/// One thread, one cascade call at a time: each iteration samples the
/// newest frame, analyzes it synchronously and publishes the batch to every
/// sink before waiting for the next refresh tick. Ticks that pass during
/// inference are dropped by the clock, so frames are skipped instead of
/// queued.
pub struct DetectionLoop {
    cascade: Box<dyn DetectionCascade>,
    clock: Box<dyn RefreshClock>,
    config: LoopConfig,
    sinks: Vec<Box<dyn BatchSink>>,
    logger: Box<dyn PipelineLogger>,
    frame_limit: Option<usize>,
    stop: Arc<AtomicBool>,
    state: LoopState,
    listener: Option<StateListener>,
}

impl DetectionLoop {
    pub fn new(
        cascade: Box<dyn DetectionCascade>,
        clock: Box<dyn RefreshClock>,
        config: LoopConfig,
    ) -> Self {
        Self {
            cascade,
            clock,
            config,
            sinks: Vec::new(),
            logger: Box::new(NullPipelineLogger),
            frame_limit: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
            listener: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn BatchSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Stop after this many published batches.
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Notified once playback has started and again with the final state.
    pub fn with_state_listener(mut self, listener: StateListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Flag that ends the loop at its next guard check. A cascade already
    /// running is allowed to finish.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until the source pauses or ends, the stop flag is raised, or
    /// the frame limit is reached. Only fails if the source never starts.
    pub fn run(&mut self, source: &dyn FrameSource) -> Result<LoopReport, MediaAccessError> {
        source.wait_until_playing(self.config.playback_timeout)?;

        self.cascade.configure(&self.config.detector);
        self.set_state(LoopState::Running);
        self.logger.info(&format!(
            "Detection loop running (input {}px, min score {:.2})",
            self.config.detector.input_size, self.config.detector.score_threshold
        ));

        let mut report = LoopReport {
            iterations: 0,
            published: 0,
            cascade_failures: 0,
            final_state: LoopState::Running,
        };

        loop {
            if let Some(next) = self.guard(source, report.published) {
                self.set_state(next);
                break;
            }
            report.iterations += 1;

            let Some(frame) = source.current_frame() else {
                self.clock.wait_next();
                continue;
            };

            let started = Instant::now();
            let detections = match self.cascade.analyze(&frame) {
                Ok(detections) => detections,
                Err(e) => {
                    log::warn!("Detection failed on frame {}: {e}", frame.index());
                    report.cascade_failures += 1;
                    Vec::new()
                }
            };
            self.logger.timing("cascade", elapsed_ms(started));

            let batch = DetectionBatch::new(
                frame.index(),
                DisplayGeometry::new(frame.width(), frame.height()),
                detections,
            );
            self.publish(&batch);
            report.published += 1;

            self.logger.metric("faces", batch.len() as f64);
            self.logger.frame(batch.frame_index(), batch.len());

            let dropped = self.clock.wait_next();
            self.logger.metric("dropped_ticks", dropped as f64);
        }

        report.final_state = self.state;
        self.logger.info(&format!(
            "Detection loop finished in state {:?} after {} batches",
            self.state, report.published
        ));
        self.logger.summary();
        Ok(report)
    }

    fn set_state(&mut self, state: LoopState) {
        self.state = state;
        if let Some(listener) = &mut self.listener {
            listener(state);
        }
    }

    /// The state to finish in, or `None` to keep going.
    fn guard(&self, source: &dyn FrameSource, published: usize) -> Option<LoopState> {
        if self.stop.load(Ordering::Relaxed) {
            return Some(LoopState::Stopped);
        }
        match source.playback() {
            PlaybackState::Paused => return Some(LoopState::Paused),
            PlaybackState::Ended => return Some(LoopState::Stopped),
            PlaybackState::Pending | PlaybackState::Playing => {}
        }
        match self.frame_limit {
            Some(limit) if published >= limit => Some(LoopState::Stopped),
            _ => None,
        }
    }

    fn publish(&mut self, batch: &DetectionBatch) {
        for sink in &mut self.sinks {
            let started = Instant::now();
            if let Err(e) = sink.publish(batch) {
                log::warn!("{} sink failed on frame {}: {e}", sink.name(), batch.frame_index());
            }
            self.logger.timing(sink.name(), elapsed_ms(started));
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
