pub mod raster_overlay_renderer;
