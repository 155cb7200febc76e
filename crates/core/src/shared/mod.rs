pub mod constants;
pub mod display_geometry;
pub mod frame;
pub mod region;
