//! Video file replayed as a live surface via ffmpeg-next.
//!
//! Decoding runs on its own thread at the stream's native frame rate and
//! publishes into a [`LiveFrameSlot`], so readers see the same "latest
//! frame only" behavior as with a camera. End of file ends playback.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{
    FrameHandle, FrameSource, MediaAccessError, PlaybackState,
};
use crate::video::infrastructure::live_frame_slot::LiveFrameSlot;

/// Used when the container does not declare a frame rate.
const FALLBACK_FPS: f64 = 30.0;

pub struct FileSource {
    slot: Arc<LiveFrameSlot>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl FileSource {
    /// Open `path` and start replaying it.
    pub fn open(path: &Path) -> Result<Self, MediaAccessError> {
        let slot = Arc::new(LiveFrameSlot::new());
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let path_buf = path.to_path_buf();
        let slot_clone = Arc::clone(&slot);
        let running_clone = Arc::clone(&running);
        let thread_handle = std::thread::Builder::new()
            .name("file-replay".to_string())
            .spawn(move || {
                let mut decoder = match FileDecoder::open(&path_buf) {
                    Ok(d) => {
                        let _ = ready_tx.send(Ok(()));
                        d
                    }
                    Err(e) => {
                        slot_clone.fail(e.clone());
                        let _ = ready_tx.send(Err(MediaAccessError::Stream(e)));
                        return;
                    }
                };
                replay(&mut decoder, &slot_clone, &running_clone);
            })
            .map_err(|e| MediaAccessError::Stream(format!("failed to spawn replay thread: {e}")))?;

        let mut source = Self {
            slot,
            running,
            thread_handle: Some(thread_handle),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(source),
            Ok(Err(e)) => {
                source.stop();
                Err(e)
            }
            Err(_) => {
                source.stop();
                Err(MediaAccessError::Stream("replay thread exited".to_string()))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn playback(&self) -> PlaybackState {
        self.slot.playback()
    }

    fn wait_until_playing(&self, timeout: Duration) -> Result<(), MediaAccessError> {
        self.slot.wait_until_playing(timeout)
    }

    fn current_frame(&self) -> Option<FrameHandle> {
        self.slot.latest()
    }

    fn resolution(&self) -> Option<DisplayGeometry> {
        self.slot.resolution()
    }

    fn pause(&self) {
        self.slot.pause();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.slot.end();
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn replay(decoder: &mut FileDecoder, slot: &LiveFrameSlot, running: &AtomicBool) {
    let frame_interval = Duration::from_secs_f64(1.0 / decoder.fps);
    let start = Instant::now();
    let mut published = 0u32;

    while running.load(Ordering::Acquire) {
        if slot.playback() == PlaybackState::Paused {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }
        match decoder.next_frame() {
            Some(Ok(frame)) => {
                let due = start + frame_interval * published;
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
                slot.publish(frame);
                published += 1;
            }
            Some(Err(e)) => {
                log::error!("Decoding {} failed: {e}", decoder.path.display());
                slot.fail(e);
                return;
            }
            None => break,
        }
    }

    slot.end();
    log::info!(
        "Replay of {} finished after {published} frames",
        decoder.path.display()
    );
}

/// Sequential decoder producing tightly packed RGB frames.
struct FileDecoder {
    path: PathBuf,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    fps: f64,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FileDecoder {
    fn open(path: &Path) -> Result<Self, String> {
        let open_err = |e: ffmpeg_next::Error| format!("cannot open {}: {e}", path.display());

        ffmpeg_next::init().map_err(open_err)?;
        let ictx = ffmpeg_next::format::input(path).map_err(open_err)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| format!("no video stream in {}", path.display()))?;
        let video_stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            FALLBACK_FPS
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(open_err)?;
        let decoder = codec_ctx.decoder().video().map_err(open_err)?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(open_err)?;

        log::info!(
            "Opened {} ({width}x{height} @ {fps:.2} fps)",
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            fps,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, String>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(format!("pixel conversion failed: {e}")));
        }
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }

    fn next_frame(&mut self) -> Option<Result<Frame, String>> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
