use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for detection loop events.
///
/// Decouples the loop from specific output mechanisms (stdout, log crate,
/// test capture) so callers can observe per-frame behavior without changing
/// the orchestration code.
pub trait PipelineLogger: Send {
    /// Report that a batch was published for `frame_index`.
    fn frame(&mut self, frame_index: usize, faces: usize);

    /// Record how long a named stage took for one iteration.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. dropped ticks, face count).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame(&mut self, _frame_index: usize, _faces: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one stage's samples. Fixed size, however long
/// the loop runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleStats {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl SampleStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = if self.count == 1 {
            value
        } else {
            self.max.max(value)
        };
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// CLI-oriented logger that tracks per-stage timing and metrics and
/// produces a summary when the loop ends.
///
/// Per-frame output is throttled to every `throttle_frames` batches.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, SampleStats>,
    metrics: HashMap<String, SampleStats>,
    start_time: Instant,
    batches: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            batches: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let batches = self.batches;
        let mut lines = vec![format!(
            "Detection loop summary ({batches} batches, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stats = &self.timings[stage];
            let (avg_ms, max_ms, total_ms) = (stats.mean(), stats.max, stats.sum);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", self.metrics[name].mean()));
        }

        if batches > 0 && elapsed_ms > 0.0 {
            let fps = batches as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<SampleStats> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<SampleStats> {
        self.metrics.get(name).copied()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn frame(&mut self, frame_index: usize, faces: usize) {
        self.batches += 1;
        if self.batches % self.throttle_frames == 0 {
            log::info!("Frame {frame_index}: {faces} face(s) ({} batches)", self.batches);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn record(table: &mut HashMap<String, SampleStats>, name: &str, value: f64) {
    match table.get_mut(name) {
        Some(stats) => stats.record(value),
        None => {
            let mut stats = SampleStats::default();
            stats.record(value);
            table.insert(name.to_string(), stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.frame(1, 2);
        logger.timing("cascade", 5.0);
        logger.metric("dropped_ticks", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("cascade", 20.0);
        logger.timing("cascade", 30.0);
        logger.timing("overlay", 5.0);

        let cascade = logger.timings_for("cascade").unwrap();
        assert_eq!(cascade.count, 2);
        assert_relative_eq!(cascade.sum, 50.0);
        assert_relative_eq!(cascade.max, 30.0);
        assert_relative_eq!(cascade.mean(), 25.0);
        assert_eq!(logger.timings_for("overlay").unwrap().count, 1);
        assert!(logger.timings_for("missing").is_none());
    }

    #[test]
    fn test_metric_mean() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);

        assert_relative_eq!(logger.metrics_for("faces").unwrap().mean(), 3.5);
    }

    #[test]
    fn test_max_tracks_negative_only_samples() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("offset", -3.0);
        logger.metric("offset", -1.0);
        assert_relative_eq!(logger.metrics_for("offset").unwrap().max, -1.0);
    }

    #[test]
    fn test_retained_state_does_not_grow_with_iterations() {
        let mut logger = StdoutPipelineLogger::new(1000);
        let stages = ["cascade", "overlay", "stats"];
        for i in 0..100_000 {
            for stage in stages {
                logger.timing(stage, 1.0);
            }
            logger.metric("faces", 1.0);
            logger.metric("dropped_ticks", 0.0);
            logger.frame(i, 1);
            logger.info("tick");
        }

        assert_eq!(logger.timings.len(), 3);
        assert_eq!(logger.metrics.len(), 2);
        assert_eq!(logger.timings_for("cascade").unwrap().count, 100_000);
    }

    #[test]
    fn test_summary_lists_stages_metrics_and_fps() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 0..10 {
            logger.frame(i, 1);
        }
        logger.timing("cascade", 20.0);
        logger.timing("overlay", 5.0);
        logger.metric("dropped_ticks", 3.0);
        logger.metric("dropped_ticks", 4.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Detection loop summary (10 batches"));
        assert!(summary.contains("cascade"));
        assert!(summary.contains("overlay"));
        assert!(summary.contains("dropped_ticks: avg 3.5"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = StdoutPipelineLogger::new(10);
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_frame_counts_batches() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 0..25 {
            logger.frame(i, 0);
        }
        assert_eq!(logger.batches, 25);
    }

    #[test]
    fn test_throttle_never_zero() {
        let logger = StdoutPipelineLogger::new(0);
        assert_eq!(logger.throttle_frames, 1);
    }
}
