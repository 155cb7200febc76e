//! Single-frame mailbox between a capture thread and its readers.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::shared::display_geometry::DisplayGeometry;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameHandle, MediaAccessError, PlaybackState};

struct SlotState {
    latest: Option<FrameHandle>,
    playback: PlaybackState,
    resolution: Option<DisplayGeometry>,
    failure: Option<String>,
}

/// Holds the newest frame only. Each publish replaces the previous one.
pub struct LiveFrameSlot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl Default for LiveFrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveFrameSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                latest: None,
                playback: PlaybackState::Pending,
                resolution: None,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Store a new frame. The first publish starts playback; publishes
    /// while paused or ended are dropped.
    pub fn publish(&self, frame: Frame) {
        let mut state = self.state.lock();
        match state.playback {
            PlaybackState::Paused | PlaybackState::Ended => return,
            PlaybackState::Pending => state.playback = PlaybackState::Playing,
            PlaybackState::Playing => {}
        }
        state.resolution = Some(DisplayGeometry::new(frame.width(), frame.height()));
        state.latest = Some(FrameHandle::new(frame));
        drop(state);
        self.changed.notify_all();
    }

    pub fn latest(&self) -> Option<FrameHandle> {
        self.state.lock().latest.clone()
    }

    pub fn playback(&self) -> PlaybackState {
        self.state.lock().playback
    }

    pub fn resolution(&self) -> Option<DisplayGeometry> {
        self.state.lock().resolution
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.playback == PlaybackState::Playing {
            state.playback = PlaybackState::Paused;
        }
    }

    /// Mark the stream finished. Wakes any waiter.
    pub fn end(&self) {
        self.state.lock().playback = PlaybackState::Ended;
        self.changed.notify_all();
    }

    /// End the stream with a reason that `wait_until_playing` reports.
    pub fn fail(&self, reason: String) {
        {
            let mut state = self.state.lock();
            state.failure = Some(reason);
            state.playback = PlaybackState::Ended;
        }
        self.changed.notify_all();
    }

    pub fn wait_until_playing(&self, timeout: Duration) -> Result<(), MediaAccessError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.playback == PlaybackState::Pending {
            if self.changed.wait_until(&mut state, deadline).timed_out()
                && state.playback == PlaybackState::Pending
            {
                return Err(MediaAccessError::Timeout(timeout));
            }
        }
        match state.playback {
            PlaybackState::Ended => Err(MediaAccessError::Stream(
                state
                    .failure
                    .clone()
                    .unwrap_or_else(|| "source ended before the first frame".to_string()),
            )),
            _ => Ok(()),
        }
    }
}
