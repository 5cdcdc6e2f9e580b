//! Touch event coalescing
//!
//! Every touch point owns a slot. Sub-events set bits on their point's mask;
//! `frame` emits one [`TouchEvent`] per point touched in the batch and frees
//! the slots of points whose last sub-event was an up, or that were
//! cancelled. A finger lifted and put down again within one batch keeps its
//! slot.

use crate::window::WindowId;
use bitflags::bitflags;
use log::{trace, warn};

/// Maximum number of concurrently tracked touch points.
pub const MAX_TOUCH_POINTS: usize = 10;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TouchMask: u32 {
        const DOWN = 1 << 0;
        const UP = 1 << 1;
        const MOTION = 1 << 2;
        const CANCEL = 1 << 3;
        const SHAPE = 1 << 4;
        const ORIENTATION = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct TouchPoint {
    active: bool,
    id: i32,
    mask: TouchMask,
    /// Latest up/down sub-event was an up.
    lifted: bool,
    window: Option<WindowId>,
    x: f64,
    y: f64,
    major: f64,
    minor: f64,
    orientation: f64,
}

/// One coalesced touch callback for a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub id: i32,
    pub mask: TouchMask,
    pub window: Option<WindowId>,
    pub x: f64,
    pub y: f64,
    /// Finger is still on the surface after this batch.
    pub down: bool,
    pub major: f64,
    pub minor: f64,
    pub orientation: f64,
}

#[derive(Debug, Default)]
pub struct TouchAccumulator {
    points: [TouchPoint; MAX_TOUCH_POINTS],
}

impl TouchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points currently occupying a slot.
    pub fn active_points(&self) -> usize {
        self.points.iter().filter(|p| p.active).count()
    }

    pub fn is_accumulating(&self) -> bool {
        self.points.iter().any(|p| p.active && !p.mask.is_empty())
    }

    fn slot(&mut self, id: i32) -> Option<&mut TouchPoint> {
        if let Some(index) = self.points.iter().position(|p| p.active && p.id == id) {
            return Some(&mut self.points[index]);
        }
        let Some(index) = self.points.iter().position(|p| !p.active) else {
            warn!("🖐️ Touch point {} dropped: {} points already active", id, MAX_TOUCH_POINTS);
            return None;
        };
        let point = &mut self.points[index];
        *point = TouchPoint {
            active: true,
            id,
            ..TouchPoint::default()
        };
        Some(point)
    }

    pub fn down(&mut self, id: i32, window: Option<WindowId>, x: f64, y: f64) {
        if let Some(point) = self.slot(id) {
            point.mask |= TouchMask::DOWN;
            point.lifted = false;
            point.window = window;
            point.x = x;
            point.y = y;
        }
    }

    pub fn up(&mut self, id: i32) {
        if let Some(point) = self.slot(id) {
            point.mask |= TouchMask::UP;
            point.lifted = true;
        }
    }

    pub fn motion(&mut self, id: i32, x: f64, y: f64) {
        if let Some(point) = self.slot(id) {
            point.mask |= TouchMask::MOTION;
            point.x = x;
            point.y = y;
        }
    }

    pub fn shape(&mut self, id: i32, major: f64, minor: f64) {
        if let Some(point) = self.slot(id) {
            point.mask |= TouchMask::SHAPE;
            point.major = major;
            point.minor = minor;
        }
    }

    pub fn orientation(&mut self, id: i32, orientation: f64) {
        if let Some(point) = self.slot(id) {
            point.mask |= TouchMask::ORIENTATION;
            point.orientation = orientation;
        }
    }

    /// The compositor took over the whole touch sequence.
    pub fn cancel(&mut self) {
        for point in self.points.iter_mut().filter(|p| p.active) {
            point.mask |= TouchMask::CANCEL;
        }
    }

    /// Closes the batch, yielding one event per touched point.
    pub fn frame(&mut self) -> Vec<TouchEvent> {
        let mut events = Vec::new();
        for point in self.points.iter_mut().filter(|p| p.active) {
            if point.mask.is_empty() {
                continue;
            }
            let finished = point.lifted || point.mask.contains(TouchMask::CANCEL);
            events.push(TouchEvent {
                id: point.id,
                mask: point.mask,
                window: point.window,
                x: point.x,
                y: point.y,
                down: !finished,
                major: point.major,
                minor: point.minor,
                orientation: point.orientation,
            });
            if finished {
                *point = TouchPoint::default();
            } else {
                point.mask = TouchMask::empty();
            }
        }
        trace!("🖐️ touch frame: {} point(s)", events.len());
        events
    }

    pub fn forget_window(&mut self, window: WindowId) {
        for point in self.points.iter_mut().filter(|p| p.window == Some(window)) {
            point.window = None;
        }
    }
}
