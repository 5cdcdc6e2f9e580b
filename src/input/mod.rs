//! Input event normalization
//!
//! The compositor delivers input as bursts of small messages. Each device
//! class has its own accumulator; all of them are process-wide and carry the
//! focused window inside the events they emit.

pub mod keyboard;
pub mod pointer;
pub mod touch;

pub use keyboard::{KeyEvent, KeyboardState, Modifiers, RepeatInfo};
pub use pointer::{
    AxisFrame, ButtonState, PointerAccumulator, PointerFrame, PointerMask, ScrollAxis,
    ScrollEvent, ScrollSource,
};
pub use touch::{TouchAccumulator, TouchEvent, TouchMask, MAX_TOUCH_POINTS};

use crate::window::WindowId;

/// Linux evdev button codes
const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;
const BTN_MIDDLE: u32 = 0x112;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u32),
}

impl From<u32> for MouseButton {
    fn from(code: u32) -> Self {
        match code {
            BTN_LEFT => MouseButton::Left,
            BTN_RIGHT => MouseButton::Right,
            BTN_MIDDLE => MouseButton::Middle,
            other => MouseButton::Other(other),
        }
    }
}

/// All input accumulators of one connection.
#[derive(Debug, Default)]
pub struct InputState {
    pub pointer: PointerAccumulator,
    pub touch: TouchAccumulator,
    pub keyboard: KeyboardState,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops routing any device's events to a destroyed window.
    pub fn forget_window(&mut self, window: WindowId) {
        self.pointer.forget_window(window);
        self.touch.forget_window(window);
        self.keyboard.forget_window(window);
    }
}
