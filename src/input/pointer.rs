//! Pointer event coalescing
//!
//! `wl_pointer` delivers one logical event as a burst of messages closed by
//! `frame`. Each message sets its bit in [`PointerMask`] and overwrites its
//! fields; `frame` hands out the accumulated [`PointerFrame`] and resets it.
//! Only fields whose bit is set are meaningful.

use crate::window::WindowId;
use bitflags::bitflags;
use log::trace;

bitflags! {
    /// Which sub-events were received since the last frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PointerMask: u32 {
        const ENTER = 1 << 0;
        const LEAVE = 1 << 1;
        const MOTION = 1 << 2;
        const BUTTON = 1 << 3;
        const AXIS = 1 << 4;
        const AXIS_SOURCE = 1 << 5;
        const AXIS_STOP = 1 << 6;
        const AXIS_DISCRETE = 1 << 7;

        const SCROLL = Self::AXIS.bits()
            | Self::AXIS_SOURCE.bits()
            | Self::AXIS_STOP.bits()
            | Self::AXIS_DISCRETE.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

impl ScrollAxis {
    pub const ALL: [ScrollAxis; 2] = [ScrollAxis::Vertical, ScrollAxis::Horizontal];

    fn slot(self) -> usize {
        match self {
            ScrollAxis::Vertical => 0,
            ScrollAxis::Horizontal => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollSource {
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

/// Scroll state of one axis within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisFrame {
    /// Some axis sub-event targeted this axis.
    pub valid: bool,
    pub value: Option<f64>,
    pub discrete: Option<i32>,
    pub stopped: bool,
}

/// One scroll callback worth of data for a single axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub axis: ScrollAxis,
    pub source: ScrollSource,
    /// Continuous value, 0.0 when the frame carried none.
    pub value: f64,
    /// Discrete steps, 0 when the frame carried none.
    pub discrete: i32,
    pub stopped: bool,
}

/// A coalesced pointer event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointerFrame {
    pub mask: PointerMask,
    /// Window under the pointer when the frame closed.
    pub window: Option<WindowId>,
    /// Window the pointer left during this frame.
    pub left: Option<WindowId>,
    pub x: f64,
    pub y: f64,
    pub button: u32,
    pub state: ButtonState,
    pub time: u32,
    pub serial: u32,
    pub axes: [AxisFrame; 2],
    pub axis_source: ScrollSource,
}

impl PointerFrame {
    pub fn position(&self) -> Option<(f64, f64)> {
        self.mask
            .intersects(PointerMask::ENTER | PointerMask::MOTION)
            .then_some((self.x, self.y))
    }

    pub fn button(&self) -> Option<(u32, ButtonState)> {
        self.mask
            .contains(PointerMask::BUTTON)
            .then_some((self.button, self.state))
    }

    pub fn axis(&self, axis: ScrollAxis) -> &AxisFrame {
        &self.axes[axis.slot()]
    }

    /// One merged scroll event per axis touched in this frame.
    pub fn scroll_events(&self) -> Vec<ScrollEvent> {
        if !self.mask.intersects(PointerMask::SCROLL) {
            return Vec::new();
        }
        let source = if self.mask.contains(PointerMask::AXIS_SOURCE) {
            self.axis_source
        } else {
            ScrollSource::Other
        };
        ScrollAxis::ALL
            .iter()
            .filter(|axis| self.axis(**axis).valid)
            .map(|&axis| {
                let state = self.axis(axis);
                ScrollEvent {
                    axis,
                    source,
                    value: state.value.unwrap_or(0.0),
                    discrete: state.discrete.unwrap_or(0),
                    stopped: state.stopped,
                }
            })
            .collect()
    }
}

/// Process-wide pointer accumulator.
#[derive(Debug, Default)]
pub struct PointerAccumulator {
    pending: PointerFrame,
    focus: Option<WindowId>,
}

impl PointerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window currently under the pointer.
    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Some sub-event arrived since the last frame.
    pub fn is_accumulating(&self) -> bool {
        !self.pending.mask.is_empty()
    }

    pub fn pending_mask(&self) -> PointerMask {
        self.pending.mask
    }

    /// `window` is `None` when the surface is not one of ours.
    pub fn enter(&mut self, serial: u32, window: Option<WindowId>, x: f64, y: f64) {
        self.pending.mask |= PointerMask::ENTER;
        self.pending.serial = serial;
        self.pending.x = x;
        self.pending.y = y;
        self.focus = window;
    }

    pub fn leave(&mut self, serial: u32) {
        self.pending.mask |= PointerMask::LEAVE;
        self.pending.serial = serial;
        self.pending.left = self.focus.take();
    }

    pub fn motion(&mut self, time: u32, x: f64, y: f64) {
        self.pending.mask |= PointerMask::MOTION;
        self.pending.time = time;
        self.pending.x = x;
        self.pending.y = y;
    }

    pub fn button(&mut self, serial: u32, time: u32, button: u32, state: ButtonState) {
        self.pending.mask |= PointerMask::BUTTON;
        self.pending.serial = serial;
        self.pending.time = time;
        self.pending.button = button;
        self.pending.state = state;
    }

    pub fn axis(&mut self, time: u32, axis: ScrollAxis, value: f64) {
        self.pending.mask |= PointerMask::AXIS;
        self.pending.time = time;
        let slot = &mut self.pending.axes[axis.slot()];
        slot.valid = true;
        slot.value = Some(value);
    }

    pub fn axis_source(&mut self, source: ScrollSource) {
        self.pending.mask |= PointerMask::AXIS_SOURCE;
        self.pending.axis_source = source;
    }

    pub fn axis_stop(&mut self, time: u32, axis: ScrollAxis) {
        self.pending.mask |= PointerMask::AXIS_STOP;
        self.pending.time = time;
        let slot = &mut self.pending.axes[axis.slot()];
        slot.valid = true;
        slot.stopped = true;
    }

    pub fn axis_discrete(&mut self, axis: ScrollAxis, discrete: i32) {
        self.pending.mask |= PointerMask::AXIS_DISCRETE;
        let slot = &mut self.pending.axes[axis.slot()];
        slot.valid = true;
        slot.discrete = Some(discrete);
    }

    /// Closes the batch. Returns `None` for an empty frame.
    pub fn frame(&mut self) -> Option<PointerFrame> {
        if self.pending.mask.is_empty() {
            return None;
        }
        let mut frame = std::mem::take(&mut self.pending);
        frame.window = self.focus;
        trace!("🖱️ pointer frame @ {}: {:?}", frame.time, frame.mask);
        Some(frame)
    }

    /// The window is gone; stop routing pointer events to it.
    pub fn forget_window(&mut self, window: WindowId) {
        if self.focus == Some(window) {
            self.focus = None;
        }
        if self.pending.left == Some(window) {
            self.pending.left = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn window(index: u32) -> WindowId {
        WindowId::from_raw_parts(index, 0)
    }

    #[test]
    fn test_motion_last_write_wins() {
        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, Some(window(0)), 0.0, 0.0);
        pointer.frame();

        pointer.motion(10, 10.0, 20.0);
        pointer.motion(11, 15.0, 25.0);
        let frame = pointer.frame().unwrap();

        assert_eq!(frame.mask, PointerMask::MOTION);
        assert_eq!(frame.position(), Some((15.0, 25.0)));
        assert_eq!(frame.time, 11);
        assert_eq!(frame.window, Some(window(0)));
        assert!(pointer.frame().is_none());
    }

    #[test]
    fn test_state_machine_idle_accumulating_idle() {
        let mut pointer = PointerAccumulator::new();
        assert!(!pointer.is_accumulating());
        pointer.button(3, 4, 0x110, ButtonState::Pressed);
        assert!(pointer.is_accumulating());
        pointer.frame();
        assert!(!pointer.is_accumulating());
        assert_eq!(pointer.pending_mask(), PointerMask::empty());
    }

    #[test]
    fn test_leave_and_enter_in_one_frame() {
        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, Some(window(0)), 1.0, 1.0);
        pointer.frame();

        pointer.leave(2);
        pointer.enter(3, Some(window(1)), 5.0, 6.0);
        let frame = pointer.frame().unwrap();

        assert_eq!(frame.mask, PointerMask::LEAVE | PointerMask::ENTER);
        assert_eq!(frame.left, Some(window(0)));
        assert_eq!(frame.window, Some(window(1)));
        assert_eq!(frame.serial, 3);
    }

    #[test]
    fn test_scroll_merges_value_discrete_and_stop() {
        let mut pointer = PointerAccumulator::new();
        pointer.axis_source(ScrollSource::Wheel);
        pointer.axis(7, ScrollAxis::Vertical, 10.0);
        pointer.axis_discrete(ScrollAxis::Vertical, 1);
        pointer.axis_stop(8, ScrollAxis::Horizontal);
        let frame = pointer.frame().unwrap();

        let events = frame.scroll_events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ScrollEvent {
                axis: ScrollAxis::Vertical,
                source: ScrollSource::Wheel,
                value: 10.0,
                discrete: 1,
                stopped: false,
            }
        );
        assert_eq!(events[1].axis, ScrollAxis::Horizontal);
        assert!(events[1].stopped);
        assert_eq!(events[1].value, 0.0);
    }

    #[test]
    fn test_forget_window_clears_focus() {
        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, Some(window(4)), 0.0, 0.0);
        pointer.forget_window(window(4));
        assert_eq!(pointer.focus(), None);
    }

    #[derive(Debug, Clone)]
    enum Sub {
        Enter(f64, f64),
        Leave,
        Motion(f64, f64),
        Button(u32, bool),
        Axis(bool, f64),
        Source(u8),
        Stop(bool),
        Discrete(bool, i32),
    }

    fn sub_event() -> impl Strategy<Value = Sub> {
        prop_oneof![
            (-1e4f64..1e4, -1e4f64..1e4).prop_map(|(x, y)| Sub::Enter(x, y)),
            Just(Sub::Leave),
            (-1e4f64..1e4, -1e4f64..1e4).prop_map(|(x, y)| Sub::Motion(x, y)),
            (0u32..0x120, any::<bool>()).prop_map(|(b, p)| Sub::Button(b, p)),
            (any::<bool>(), -100f64..100.0).prop_map(|(h, v)| Sub::Axis(h, v)),
            (0u8..5).prop_map(Sub::Source),
            any::<bool>().prop_map(Sub::Stop),
            (any::<bool>(), -5i32..5).prop_map(|(h, d)| Sub::Discrete(h, d)),
        ]
    }

    fn axis_of(horizontal: bool) -> ScrollAxis {
        if horizontal {
            ScrollAxis::Horizontal
        } else {
            ScrollAxis::Vertical
        }
    }

    proptest! {
        #[test]
        fn prop_mask_and_last_write_wins(subs in proptest::collection::vec(sub_event(), 1..40)) {
            let mut pointer = PointerAccumulator::new();
            let mut expected = PointerMask::empty();
            let mut last_pos = None;
            let mut last_button = None;
            let mut last_value = [None, None];
            let mut last_discrete = [None, None];

            for sub in &subs {
                match *sub {
                    Sub::Enter(x, y) => {
                        expected |= PointerMask::ENTER;
                        last_pos = Some((x, y));
                        pointer.enter(1, Some(window(0)), x, y);
                    }
                    Sub::Leave => {
                        expected |= PointerMask::LEAVE;
                        pointer.leave(2);
                    }
                    Sub::Motion(x, y) => {
                        expected |= PointerMask::MOTION;
                        last_pos = Some((x, y));
                        pointer.motion(3, x, y);
                    }
                    Sub::Button(b, pressed) => {
                        expected |= PointerMask::BUTTON;
                        let state = if pressed { ButtonState::Pressed } else { ButtonState::Released };
                        last_button = Some((b, state));
                        pointer.button(4, 5, b, state);
                    }
                    Sub::Axis(h, v) => {
                        expected |= PointerMask::AXIS;
                        last_value[axis_of(h).slot()] = Some(v);
                        pointer.axis(6, axis_of(h), v);
                    }
                    Sub::Source(_) => {
                        expected |= PointerMask::AXIS_SOURCE;
                        pointer.axis_source(ScrollSource::Finger);
                    }
                    Sub::Stop(h) => {
                        expected |= PointerMask::AXIS_STOP;
                        pointer.axis_stop(7, axis_of(h));
                    }
                    Sub::Discrete(h, d) => {
                        expected |= PointerMask::AXIS_DISCRETE;
                        last_discrete[axis_of(h).slot()] = Some(d);
                        pointer.axis_discrete(axis_of(h), d);
                    }
                }
            }

            let frame = pointer.frame().unwrap();
            prop_assert_eq!(frame.mask, expected);
            if expected.intersects(PointerMask::ENTER | PointerMask::MOTION) {
                prop_assert_eq!(frame.position(), last_pos);
            }
            prop_assert_eq!(frame.button(), last_button);
            for axis in ScrollAxis::ALL {
                prop_assert_eq!(frame.axis(axis).value, last_value[axis.slot()]);
                prop_assert_eq!(frame.axis(axis).discrete, last_discrete[axis.slot()]);
            }
            prop_assert!(pointer.frame().is_none());
        }
    }
}
