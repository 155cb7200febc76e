pub mod detection;
pub mod overlay;
pub mod pipeline;
pub mod provisioning;
pub mod shared;
pub mod stats;
pub mod video;
