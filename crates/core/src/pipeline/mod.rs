pub mod batch_sink;
pub mod detection_loop;
pub mod pipeline_controller;
pub mod pipeline_logger;
pub mod refresh_clock;
