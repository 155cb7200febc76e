pub mod camera_source;
pub mod ffmpeg_file_source;
pub mod live_frame_slot;
