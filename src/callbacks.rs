//! Application callback table
//!
//! One optional handler per event category. A category left unset is a
//! no-op. Handlers are closures, so per-handler user data is whatever they
//! capture.

use crate::data_transfer::TransferPayload;
use crate::input::{ButtonState, KeyEvent, PointerFrame, PointerMask, ScrollEvent, TouchEvent};
use crate::renderer::Canvas;
use crate::window::WindowId;

type WindowFn = Box<dyn FnMut(WindowId)>;
type PositionFn = Box<dyn FnMut(WindowId, f64, f64)>;
type ClickFn = Box<dyn FnMut(WindowId, u32, ButtonState)>;
type ScrollFn = Box<dyn FnMut(WindowId, ScrollEvent)>;
type KeyFn = Box<dyn FnMut(WindowId, &KeyEvent)>;
type TouchFn = Box<dyn FnMut(WindowId, &TouchEvent)>;
type DropFn = Box<dyn FnMut(WindowId, &TransferPayload)>;
type ResizeFn = Box<dyn FnMut(WindowId, u32, u32)>;
type FrameFn = Box<dyn FnMut(WindowId, &mut dyn Canvas)>;

#[derive(Default)]
pub struct Callbacks {
    keyboard_enter: Option<WindowFn>,
    keyboard_leave: Option<WindowFn>,
    keyboard_input: Option<KeyFn>,
    mouse_enter: Option<PositionFn>,
    mouse_leave: Option<WindowFn>,
    mouse_move: Option<PositionFn>,
    mouse_click: Option<ClickFn>,
    mouse_scroll: Option<ScrollFn>,
    touch: Option<TouchFn>,
    drag_and_drop: Option<DropFn>,
    window_resize: Option<ResizeFn>,
    window_close: Option<WindowFn>,
    window_frame_update: Option<FrameFn>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("keyboard_enter", &self.keyboard_enter.is_some())
            .field("keyboard_leave", &self.keyboard_leave.is_some())
            .field("keyboard_input", &self.keyboard_input.is_some())
            .field("mouse_enter", &self.mouse_enter.is_some())
            .field("mouse_leave", &self.mouse_leave.is_some())
            .field("mouse_move", &self.mouse_move.is_some())
            .field("mouse_click", &self.mouse_click.is_some())
            .field("mouse_scroll", &self.mouse_scroll.is_some())
            .field("touch", &self.touch.is_some())
            .field("drag_and_drop", &self.drag_and_drop.is_some())
            .field("window_resize", &self.window_resize.is_some())
            .field("window_close", &self.window_close.is_some())
            .field("window_frame_update", &self.window_frame_update.is_some())
            .finish()
    }
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_keyboard_enter(&mut self, f: impl FnMut(WindowId) + 'static) -> &mut Self {
        self.keyboard_enter = Some(Box::new(f));
        self
    }

    pub fn on_keyboard_leave(&mut self, f: impl FnMut(WindowId) + 'static) -> &mut Self {
        self.keyboard_leave = Some(Box::new(f));
        self
    }

    pub fn on_keyboard_input(&mut self, f: impl FnMut(WindowId, &KeyEvent) + 'static) -> &mut Self {
        self.keyboard_input = Some(Box::new(f));
        self
    }

    pub fn on_mouse_enter(&mut self, f: impl FnMut(WindowId, f64, f64) + 'static) -> &mut Self {
        self.mouse_enter = Some(Box::new(f));
        self
    }

    pub fn on_mouse_leave(&mut self, f: impl FnMut(WindowId) + 'static) -> &mut Self {
        self.mouse_leave = Some(Box::new(f));
        self
    }

    pub fn on_mouse_move(&mut self, f: impl FnMut(WindowId, f64, f64) + 'static) -> &mut Self {
        self.mouse_move = Some(Box::new(f));
        self
    }

    pub fn on_mouse_click(
        &mut self,
        f: impl FnMut(WindowId, u32, ButtonState) + 'static,
    ) -> &mut Self {
        self.mouse_click = Some(Box::new(f));
        self
    }

    pub fn on_mouse_scroll(&mut self, f: impl FnMut(WindowId, ScrollEvent) + 'static) -> &mut Self {
        self.mouse_scroll = Some(Box::new(f));
        self
    }

    pub fn on_touch(&mut self, f: impl FnMut(WindowId, &TouchEvent) + 'static) -> &mut Self {
        self.touch = Some(Box::new(f));
        self
    }

    pub fn on_drag_and_drop(
        &mut self,
        f: impl FnMut(WindowId, &TransferPayload) + 'static,
    ) -> &mut Self {
        self.drag_and_drop = Some(Box::new(f));
        self
    }

    pub fn on_window_resize(&mut self, f: impl FnMut(WindowId, u32, u32) + 'static) -> &mut Self {
        self.window_resize = Some(Box::new(f));
        self
    }

    pub fn on_window_close(&mut self, f: impl FnMut(WindowId) + 'static) -> &mut Self {
        self.window_close = Some(Box::new(f));
        self
    }

    pub fn on_window_frame_update(
        &mut self,
        f: impl FnMut(WindowId, &mut dyn Canvas) + 'static,
    ) -> &mut Self {
        self.window_frame_update = Some(Box::new(f));
        self
    }

    /// Routes one coalesced pointer frame: leave, enter, motion, click, then
    /// one scroll per axis.
    pub fn dispatch_pointer(&mut self, frame: &PointerFrame) {
        if frame.mask.contains(PointerMask::LEAVE) {
            if let (Some(window), Some(f)) = (frame.left, self.mouse_leave.as_mut()) {
                f(window);
            }
        }

        let Some(window) = frame.window else {
            return;
        };

        if frame.mask.contains(PointerMask::ENTER) {
            if let Some(f) = self.mouse_enter.as_mut() {
                f(window, frame.x, frame.y);
            }
        }
        if frame.mask.contains(PointerMask::MOTION) {
            if let Some(f) = self.mouse_move.as_mut() {
                f(window, frame.x, frame.y);
            }
        }
        if let Some((button, state)) = frame.button() {
            if let Some(f) = self.mouse_click.as_mut() {
                f(window, button, state);
            }
        }
        if let Some(f) = self.mouse_scroll.as_mut() {
            for event in frame.scroll_events() {
                f(window, event);
            }
        }
    }

    pub fn dispatch_touch(&mut self, events: &[TouchEvent]) {
        let Some(f) = self.touch.as_mut() else {
            return;
        };
        for event in events {
            if let Some(window) = event.window {
                f(window, event);
            }
        }
    }

    pub fn dispatch_key(&mut self, event: &KeyEvent) {
        if let (Some(window), Some(f)) = (event.window, self.keyboard_input.as_mut()) {
            f(window, event);
        }
    }

    pub fn emit_keyboard_enter(&mut self, window: WindowId) {
        if let Some(f) = self.keyboard_enter.as_mut() {
            f(window);
        }
    }

    pub fn emit_keyboard_leave(&mut self, window: WindowId) {
        if let Some(f) = self.keyboard_leave.as_mut() {
            f(window);
        }
    }

    pub fn emit_drop(&mut self, window: WindowId, payload: &TransferPayload) {
        if let Some(f) = self.drag_and_drop.as_mut() {
            f(window, payload);
        }
    }

    pub fn emit_resize(&mut self, window: WindowId, width: u32, height: u32) {
        if let Some(f) = self.window_resize.as_mut() {
            f(window, width, height);
        }
    }

    pub fn emit_close(&mut self, window: WindowId) {
        if let Some(f) = self.window_close.as_mut() {
            f(window);
        }
    }

    pub fn emit_frame_update(&mut self, window: WindowId, canvas: &mut dyn Canvas) {
        if let Some(f) = self.window_frame_update.as_mut() {
            f(window, canvas);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerAccumulator;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn window(index: u32) -> WindowId {
        WindowId::from_raw_parts(index, 0)
    }

    #[test]
    fn test_unset_callbacks_are_noops() {
        let mut callbacks = Callbacks::new();
        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, Some(window(0)), 1.0, 2.0);
        pointer.button(2, 3, 0x110, ButtonState::Pressed);
        callbacks.dispatch_pointer(&pointer.frame().unwrap());
        callbacks.emit_close(window(0));
        callbacks.emit_resize(window(0), 10, 10);
    }

    #[test]
    fn test_pointer_dispatch_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut callbacks = Callbacks::new();
        let l = log.clone();
        callbacks.on_mouse_leave(move |w| l.borrow_mut().push(format!("leave {}", w)));
        let l = log.clone();
        callbacks.on_mouse_enter(move |w, _, _| l.borrow_mut().push(format!("enter {}", w)));
        let l = log.clone();
        callbacks.on_mouse_move(move |w, x, y| l.borrow_mut().push(format!("move {} {} {}", w, x, y)));
        let l = log.clone();
        callbacks.on_mouse_click(move |w, b, _| l.borrow_mut().push(format!("click {} {:#x}", w, b)));

        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, Some(window(0)), 0.0, 0.0);
        pointer.frame();
        pointer.leave(2);
        pointer.enter(3, Some(window(1)), 4.0, 4.0);
        pointer.motion(4, 5.0, 6.0);
        pointer.button(5, 6, 0x111, ButtonState::Released);
        callbacks.dispatch_pointer(&pointer.frame().unwrap());

        assert_eq!(
            *log.borrow(),
            vec!["leave 0", "enter 1", "move 1 5 6", "click 1 0x111"]
        );
    }

    #[test]
    fn test_pointer_outside_our_windows_is_ignored() {
        let hits = Rc::new(RefCell::new(0));
        let mut callbacks = Callbacks::new();
        let h = hits.clone();
        callbacks.on_mouse_move(move |_, _, _| *h.borrow_mut() += 1);

        let mut pointer = PointerAccumulator::new();
        pointer.enter(1, None, 0.0, 0.0);
        pointer.motion(2, 1.0, 1.0);
        callbacks.dispatch_pointer(&pointer.frame().unwrap());
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_drop_payload_reaches_handler() {
        let seen = Rc::new(RefCell::new(None));
        let mut callbacks = Callbacks::new();
        let s = seen.clone();
        callbacks.on_drag_and_drop(move |w, payload| {
            *s.borrow_mut() = Some((w, payload.mime_type.clone(), payload.data.clone()));
        });

        let payload = TransferPayload::new("text/uri-list", b"file:///tmp/a".to_vec());
        callbacks.emit_drop(window(2), &payload);
        assert_eq!(
            *seen.borrow(),
            Some((window(2), "text/uri-list".to_string(), b"file:///tmp/a".to_vec()))
        );
    }
}
