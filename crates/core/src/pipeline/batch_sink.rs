//! Consumers of published detection batches.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;

use crate::detection::domain::detection::DetectionBatch;
use crate::overlay::domain::coordinate_mapper;
use crate::overlay::domain::overlay_renderer::{label_for, OverlayLabel, OverlayRenderer};
use crate::shared::display_geometry::DisplayGeometry;
use crate::stats::stats_aggregator::{aggregate, AggregateStats};

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every batch the detection loop publishes, on the loop thread.
pub trait BatchSink: Send {
    /// Stage name used for timing and log lines.
    fn name(&self) -> &str;

    fn publish(&mut self, batch: &DetectionBatch) -> Result<(), SinkError>;
}

/// Maps batches into display space and draws them.
pub struct OverlaySink<R: OverlayRenderer> {
    renderer: R,
    display: DisplayGeometry,
}

impl<R: OverlayRenderer> OverlaySink<R> {
    /// `display` is fixed for the lifetime of the sink.
    pub fn new(renderer: R, display: DisplayGeometry) -> Self {
        Self { renderer, display }
    }
}

impl<R: OverlayRenderer> BatchSink for OverlaySink<R> {
    fn name(&self) -> &str {
        "overlay"
    }

    fn publish(&mut self, batch: &DetectionBatch) -> Result<(), SinkError> {
        let mapped = coordinate_mapper::map(batch, batch.resolution(), self.display);
        self.renderer.render(&mapped)?;
        Ok(())
    }
}

/// Read side of a [`StatsSink`], cheap to clone across threads.
#[derive(Clone)]
pub struct StatsReader {
    latest: Arc<Mutex<Option<AggregateStats>>>,
}

impl StatsReader {
    /// Stats of the most recently published batch.
    pub fn latest(&self) -> Option<AggregateStats> {
        self.latest.lock().clone()
    }
}

/// One streamed update: the batch's stats plus the caption of every face,
/// positioned in display space.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchRecord {
    pub frame_index: usize,
    #[serde(flatten)]
    pub stats: AggregateStats,
    pub labels: Vec<OverlayLabel>,
}

struct RecordStream {
    tx: Sender<BatchRecord>,
    display: DisplayGeometry,
}

/// Aggregates each batch and republishes the result.
///
/// The latest value is always available through [`StatsReader`]. An
/// optional bounded channel feeds a streaming consumer; when it is full the
/// update is dropped rather than queued.
pub struct StatsSink {
    latest: Arc<Mutex<Option<AggregateStats>>>,
    stream: Option<RecordStream>,
    dropped: u64,
}

impl StatsSink {
    pub fn new() -> (Self, StatsReader) {
        let latest = Arc::new(Mutex::new(None));
        let reader = StatsReader {
            latest: Arc::clone(&latest),
        };
        (
            Self {
                latest,
                stream: None,
                dropped: 0,
            },
            reader,
        )
    }

    /// Also send every update over a channel holding at most `capacity`.
    /// Labels are placed on a `display`-sized surface, matching the overlay.
    pub fn with_stream(
        mut self,
        capacity: usize,
        display: DisplayGeometry,
    ) -> (Self, Receiver<BatchRecord>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.stream = Some(RecordStream { tx, display });
        (self, rx)
    }

    /// Updates the stream consumer was too slow to take.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl BatchSink for StatsSink {
    fn name(&self) -> &str {
        "stats"
    }

    fn publish(&mut self, batch: &DetectionBatch) -> Result<(), SinkError> {
        let stats = aggregate(batch);
        *self.latest.lock() = Some(stats.clone());

        if let Some(stream) = &self.stream {
            let mapped = coordinate_mapper::map(batch, batch.resolution(), stream.display);
            let record = BatchRecord {
                frame_index: batch.frame_index(),
                stats,
                labels: mapped.iter().map(label_for).collect(),
            };
            match stream.tx.try_send(record) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.dropped += 1,
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("Stats stream consumer went away");
                    self.stream = None;
                }
            }
        }
        Ok(())
    }
}
