//! Seat, pointer, keyboard and touch event handlers

use super::state::WaylandState;
use crate::input::{ButtonState, ScrollAxis, ScrollSource};
use crate::protocol::{CapabilityChange, SeatCapabilities};
use log::{debug, info, trace, warn};
use wayland_client::protocol::{
    wl_keyboard::{self, KeyState, KeymapFormat, WlKeyboard},
    wl_pointer::{self, WlPointer},
    wl_seat::{self, Capability, WlSeat},
    wl_touch::{self, WlTouch},
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};

fn capabilities_from_wire(capabilities: WEnum<Capability>) -> SeatCapabilities {
    let raw: u32 = match capabilities {
        WEnum::Value(capabilities) => capabilities.bits(),
        WEnum::Unknown(raw) => raw,
    };
    SeatCapabilities::from_bits_truncate(raw)
}

fn scroll_axis(axis: WEnum<wl_pointer::Axis>) -> Option<ScrollAxis> {
    match axis {
        WEnum::Value(wl_pointer::Axis::VerticalScroll) => Some(ScrollAxis::Vertical),
        WEnum::Value(wl_pointer::Axis::HorizontalScroll) => Some(ScrollAxis::Horizontal),
        _ => None,
    }
}

fn scroll_source(source: WEnum<wl_pointer::AxisSource>) -> ScrollSource {
    match source {
        WEnum::Value(wl_pointer::AxisSource::Wheel) => ScrollSource::Wheel,
        WEnum::Value(wl_pointer::AxisSource::Finger) => ScrollSource::Finger,
        WEnum::Value(wl_pointer::AxisSource::Continuous) => ScrollSource::Continuous,
        WEnum::Value(wl_pointer::AxisSource::WheelTilt) => ScrollSource::WheelTilt,
        _ => ScrollSource::Other,
    }
}

/// Acquires or releases the device behind `capability` after a change.
/// Returns true when the device went away and its accumulator must reset.
fn sync_device<T>(
    device: &mut Option<T>,
    capability: SeatCapabilities,
    change: CapabilityChange,
    acquire: impl FnOnce() -> T,
    release: impl FnOnce(T),
) -> bool {
    if change.removed.contains(capability) {
        if let Some(old) = device.take() {
            release(old);
        }
        return true;
    }
    if change.added.contains(capability) && device.is_none() {
        *device = Some(acquire());
    }
    false
}

impl WaylandState {
    fn update_capabilities(&mut self, seat: &WlSeat, new: SeatCapabilities, qh: &QueueHandle<Self>) {
        let change = CapabilityChange::between(self.devices.capabilities, new);
        self.devices.capabilities = new;
        if change.is_empty() {
            return;
        }
        info!(
            "🖐️ Seat capabilities now {:?} (added {:?}, removed {:?})",
            new, change.added, change.removed
        );

        let devices = &mut self.devices;
        if sync_device(
            &mut devices.pointer,
            SeatCapabilities::POINTER,
            change,
            || seat.get_pointer(qh, ()),
            |pointer| pointer.release(),
        ) {
            self.input.pointer = Default::default();
        }
        if sync_device(
            &mut devices.keyboard,
            SeatCapabilities::KEYBOARD,
            change,
            || seat.get_keyboard(qh, ()),
            |keyboard| keyboard.release(),
        ) {
            self.input.keyboard = Default::default();
        }
        if sync_device(
            &mut devices.touch,
            SeatCapabilities::TOUCH,
            change,
            || seat.get_touch(qh, ()),
            |touch| touch.release(),
        ) {
            self.input.touch = Default::default();
        }
    }

    /// Releases every device object, data device included.
    pub(crate) fn release_devices(&mut self) {
        if let Some(pointer) = self.devices.pointer.take() {
            pointer.release();
        }
        if let Some(keyboard) = self.devices.keyboard.take() {
            keyboard.release();
        }
        if let Some(touch) = self.devices.touch.take() {
            touch.release();
        }
        if let Some(device) = self.devices.data_device.take() {
            if device.version() >= 2 {
                device.release();
            }
        }
        self.devices.capabilities = SeatCapabilities::empty();
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                state.update_capabilities(seat, capabilities_from_wire(capabilities), qh);
            }
            wl_seat::Event::Name { name } => debug!("🖐️ Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<WlPointer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _pointer: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let pointer = &mut state.input.pointer;
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                let window = state.window_of(&surface);
                state.last_serial = serial;
                state.input.pointer.enter(serial, window, surface_x, surface_y);
            }
            wl_pointer::Event::Leave { serial, .. } => pointer.leave(serial),
            wl_pointer::Event::Motion {
                time,
                surface_x,
                surface_y,
            } => pointer.motion(time, surface_x, surface_y),
            wl_pointer::Event::Button {
                serial,
                time,
                button,
                state: button_state,
            } => {
                let button_state = match button_state {
                    WEnum::Value(wl_pointer::ButtonState::Pressed) => ButtonState::Pressed,
                    _ => ButtonState::Released,
                };
                pointer.button(serial, time, button, button_state);
                state.last_serial = serial;
            }
            wl_pointer::Event::Axis { time, axis, value } => {
                if let Some(axis) = scroll_axis(axis) {
                    pointer.axis(time, axis, value);
                }
            }
            wl_pointer::Event::AxisSource { axis_source } => {
                pointer.axis_source(scroll_source(axis_source));
            }
            wl_pointer::Event::AxisStop { time, axis } => {
                if let Some(axis) = scroll_axis(axis) {
                    pointer.axis_stop(time, axis);
                }
            }
            wl_pointer::Event::AxisDiscrete { axis, discrete } => {
                if let Some(axis) = scroll_axis(axis) {
                    pointer.axis_discrete(axis, discrete);
                }
            }
            wl_pointer::Event::Frame => {
                if let Some(frame) = pointer.frame() {
                    trace!("🖱️ Pointer frame {:?}", frame.mask);
                    state.callbacks.dispatch_pointer(&frame);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _keyboard: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => match format {
                WEnum::Value(KeymapFormat::XkbV1) => {
                    if let Err(err) = state.input.keyboard.load_keymap(fd, size) {
                        warn!("⚠️ Keymap rejected, keys will carry no text: {}", err);
                    }
                }
                other => warn!("⚠️ Unsupported keymap format {:?}", other),
            },
            wl_keyboard::Event::Enter {
                serial,
                surface,
                keys,
            } => {
                let window = state.window_of(&surface);
                let keys: Vec<u32> = bytemuck::pod_collect_to_vec(&keys);
                state.last_serial = serial;
                state.input.keyboard.enter(serial, window, &keys);
                if let Some(window) = window {
                    state.callbacks.emit_keyboard_enter(window);
                }
            }
            wl_keyboard::Event::Leave { serial, .. } => {
                // the time of the synthetic releases is unknown
                let (window, releases) = state.input.keyboard.leave(serial, 0);
                for release in &releases {
                    state.callbacks.dispatch_key(release);
                }
                if let Some(window) = window {
                    state.callbacks.emit_keyboard_leave(window);
                }
            }
            wl_keyboard::Event::Key {
                serial,
                time,
                key,
                state: key_state,
            } => {
                let pressed = matches!(key_state, WEnum::Value(KeyState::Pressed));
                let event = state.input.keyboard.key(serial, time, key, pressed);
                state.last_serial = serial;
                state.callbacks.dispatch_key(&event);
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                state
                    .input
                    .keyboard
                    .update_modifiers(mods_depressed, mods_latched, mods_locked, group);
            }
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                state.input.keyboard.set_repeat_info(rate, delay);
            }
            _ => {}
        }
    }
}

impl Dispatch<WlTouch, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _touch: &WlTouch,
        event: wl_touch::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_touch::Event::Down {
                serial,
                surface,
                id,
                x,
                y,
                ..
            } => {
                let window = state.window_of(&surface);
                state.last_serial = serial;
                state.input.touch.down(id, window, x, y);
            }
            wl_touch::Event::Up { id, .. } => state.input.touch.up(id),
            wl_touch::Event::Motion { id, x, y, .. } => state.input.touch.motion(id, x, y),
            wl_touch::Event::Shape { id, major, minor } => {
                state.input.touch.shape(id, major, minor)
            }
            wl_touch::Event::Orientation { id, orientation } => {
                state.input.touch.orientation(id, orientation)
            }
            wl_touch::Event::Cancel => state.input.touch.cancel(),
            wl_touch::Event::Frame => {
                let events = state.input.touch.frame();
                if !events.is_empty() {
                    state.callbacks.dispatch_touch(&events);
                }
            }
            _ => {}
        }
    }
}
