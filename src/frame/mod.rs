//! Frame pacing driven by compositor frame callbacks
//!
//! Every window owns a [`FrameTask`]. A redraw requests exactly one
//! `wl_surface.frame` callback, tagged with a [`FrameTicket`]; the completion
//! handler validates the ticket, redraws and requests the next one. Because a
//! new ticket is only issued once the previous one completed, a window never
//! has two frame callbacks in flight.
//!
//! Destroying a window cancels its task. Completions that arrive afterwards
//! carry a ticket nobody is waiting for and are dropped.

use crate::window::WindowId;
use log::{debug, info, trace};
use std::time::{Duration, Instant};

/// Window used to average the FPS counter.
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Identifies one outstanding frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTicket {
    pub window: WindowId,
    pub token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTaskState {
    /// No callback requested yet, or the last one completed.
    Idle,
    /// A callback with this token is outstanding.
    Pending(u64),
    /// The window is gone; nothing will be requested again.
    Cancelled,
}

/// Lazily started frame counter reporting once per second.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    window_start: Option<Instant>,
    last_frame: Option<Instant>,
    frames: u32,
    last_interval: Option<Duration>,
    last_fps: Option<f32>,
}

impl FpsCounter {
    /// Records a completed frame. Returns the averaged FPS whenever a full
    /// report interval has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        if let Some(last) = self.last_frame {
            self.last_interval = Some(now.saturating_duration_since(last));
        }
        self.last_frame = Some(now);

        let Some(start) = self.window_start else {
            // first completion only starts the clock
            self.window_start = Some(now);
            self.frames = 0;
            return None;
        };

        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_REPORT_INTERVAL {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.last_fps = Some(fps);
        self.window_start = Some(now);
        self.frames = 0;
        Some(fps)
    }

    pub fn is_initialized(&self) -> bool {
        self.window_start.is_some()
    }

    /// Time between the two most recent completions.
    pub fn last_interval(&self) -> Option<Duration> {
        self.last_interval
    }

    pub fn last_fps(&self) -> Option<f32> {
        self.last_fps
    }
}

/// Per-window redraw task.
#[derive(Debug, Clone)]
pub struct FrameTask {
    state: FrameTaskState,
    completed: u64,
    fps: FpsCounter,
}

impl Default for FrameTask {
    fn default() -> Self {
        Self {
            state: FrameTaskState::Idle,
            completed: 0,
            fps: FpsCounter::default(),
        }
    }
}

impl FrameTask {
    pub fn state(&self) -> FrameTaskState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FrameTaskState::Pending(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == FrameTaskState::Cancelled
    }

    /// Number of frame callbacks that completed for this window.
    pub fn completed_frames(&self) -> u64 {
        self.completed
    }

    pub fn fps(&self) -> &FpsCounter {
        &self.fps
    }
}

/// Issues and validates frame tickets for all windows.
#[derive(Debug)]
pub struct FrameScheduler {
    next_token: u64,
    fps_enabled: bool,
}

impl FrameScheduler {
    pub fn new(fps_enabled: bool) -> Self {
        if fps_enabled {
            info!("🎬 Frame scheduler: FPS counter enabled");
        }
        Self {
            next_token: 1,
            fps_enabled,
        }
    }

    pub fn fps_enabled(&self) -> bool {
        self.fps_enabled
    }

    /// Requests the next frame callback for `window`.
    ///
    /// Returns `None` while a callback is already outstanding or after the
    /// task was cancelled, so callers can never double-register.
    pub fn request(&mut self, window: WindowId, task: &mut FrameTask) -> Option<FrameTicket> {
        match task.state {
            FrameTaskState::Pending(token) => {
                trace!("Window {} already waits for frame token {}", window, token);
                None
            }
            FrameTaskState::Cancelled => None,
            FrameTaskState::Idle => {
                let token = self.next_token;
                self.next_token += 1;
                task.state = FrameTaskState::Pending(token);
                Some(FrameTicket { window, token })
            }
        }
    }

    /// Handles a frame-completion signal. Returns `true` when the window
    /// should redraw (and then request its next ticket).
    pub fn complete(&mut self, ticket: FrameTicket, task: &mut FrameTask, now: Instant) -> bool {
        match task.state {
            FrameTaskState::Pending(token) if token == ticket.token => {
                task.state = FrameTaskState::Idle;
                task.completed += 1;
                if self.fps_enabled {
                    if let Some(fps) = task.fps.tick(now) {
                        info!("🎞️ Window {}: {:.1} FPS", ticket.window, fps);
                    }
                } else {
                    task.fps.tick(now);
                }
                true
            }
            state => {
                debug!(
                    "Dropping frame completion {:?} for window {} (task state {:?})",
                    ticket.token, ticket.window, state
                );
                false
            }
        }
    }

    /// Stops the task; any outstanding ticket becomes stale.
    pub fn cancel(&mut self, window: WindowId, task: &mut FrameTask) {
        if let FrameTaskState::Pending(token) = task.state {
            debug!("Cancelling frame token {} of window {}", token, window);
        }
        task.state = FrameTaskState::Cancelled;
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(index: u32) -> WindowId {
        WindowId::from_raw_parts(index, 0)
    }

    #[test]
    fn test_request_is_exclusive_until_completion() {
        let mut scheduler = FrameScheduler::default();
        let mut task = FrameTask::default();

        let first = scheduler.request(window(0), &mut task).unwrap();
        assert!(scheduler.request(window(0), &mut task).is_none());
        assert!(task.is_pending());

        assert!(scheduler.complete(first, &mut task, Instant::now()));
        let second = scheduler.request(window(0), &mut task).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_two_completions_in_sequence_never_overlap() {
        let mut scheduler = FrameScheduler::default();
        let mut task = FrameTask::default();
        let now = Instant::now();

        let ticket = scheduler.request(window(1), &mut task).unwrap();
        assert!(scheduler.complete(ticket, &mut task, now));
        // duplicate delivery of the same completion must not redraw again
        assert!(!scheduler.complete(ticket, &mut task, now));
        assert_eq!(task.completed_frames(), 1);
        assert_eq!(task.state(), FrameTaskState::Idle);
    }

    #[test]
    fn test_cancel_drops_late_completion() {
        let mut scheduler = FrameScheduler::default();
        let mut task = FrameTask::default();

        let ticket = scheduler.request(window(2), &mut task).unwrap();
        scheduler.cancel(window(2), &mut task);

        assert!(!scheduler.complete(ticket, &mut task, Instant::now()));
        assert!(scheduler.request(window(2), &mut task).is_none());
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_tokens_are_unique_across_windows() {
        let mut scheduler = FrameScheduler::default();
        let mut a = FrameTask::default();
        let mut b = FrameTask::default();

        let ta = scheduler.request(window(0), &mut a).unwrap();
        let tb = scheduler.request(window(1), &mut b).unwrap();
        assert_ne!(ta.token, tb.token);
        // a ticket from another window does not complete this one
        assert!(!scheduler.complete(tb, &mut a, Instant::now()));
    }

    #[test]
    fn test_fps_counter_lazy_init() {
        let mut fps = FpsCounter::default();
        let start = Instant::now();

        assert!(!fps.is_initialized());
        assert_eq!(fps.tick(start), None);
        assert!(fps.is_initialized());
        assert_eq!(fps.last_interval(), None);

        let mut reported = None;
        for i in 1..=60u64 {
            if let Some(value) = fps.tick(start + Duration::from_micros(16_667 * i)) {
                reported = Some(value);
            }
        }
        let value = reported.expect("a report after one second");
        assert!(value > 55.0 && value < 65.0, "got {}", value);
        assert_eq!(fps.last_interval(), Some(Duration::from_micros(16_667)));
    }
}
