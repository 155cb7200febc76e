pub mod coordinate_mapper;
pub mod overlay_renderer;
