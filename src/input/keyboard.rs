//! Keyboard focus and xkb key translation

use crate::error::{GlpsError, Result};
use crate::window::WindowId;
use log::{debug, trace};
use std::os::fd::OwnedFd;
use xkbcommon::xkb;

/// Evdev codes are offset by 8 in xkb.
const EVDEV_OFFSET: u32 = 8;

/// Key codes come straight off the wire, so the offset wraps instead of
/// overflowing.
fn xkb_keycode(key: u32) -> xkb::Keycode {
    xkb::Keycode::new(key.wrapping_add(EVDEV_OFFSET))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub logo: bool,
    pub caps_lock: bool,
    pub num_lock: bool,
}

/// Key repeat settings announced by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInfo {
    /// Characters per second, 0 disables repeat.
    pub rate: i32,
    /// Milliseconds before repeating starts.
    pub delay: i32,
}

impl Default for RepeatInfo {
    fn default() -> Self {
        Self { rate: 25, delay: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub window: Option<WindowId>,
    /// Raw evdev key code.
    pub key: u32,
    pub keysym: u32,
    /// UTF-8 produced by the key, empty when none or released.
    pub text: String,
    pub pressed: bool,
    pub time: u32,
    pub modifiers: Modifiers,
}

struct Keymapped {
    state: xkb::State,
}

pub struct KeyboardState {
    context: xkb::Context,
    keymap: Option<Keymapped>,
    focus: Option<WindowId>,
    serial: u32,
    pressed: Vec<u32>,
    modifiers: Modifiers,
    repeat: RepeatInfo,
}

impl std::fmt::Debug for KeyboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardState")
            .field("has_keymap", &self.keymap.is_some())
            .field("focus", &self.focus)
            .field("serial", &self.serial)
            .field("pressed", &self.pressed)
            .field("modifiers", &self.modifiers)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            keymap: None,
            focus: None,
            serial: 0,
            pressed: Vec::new(),
            modifiers: Modifiers::default(),
            repeat: RepeatInfo::default(),
        }
    }

    /// Compiles the keymap shared by the compositor.
    pub fn load_keymap(&mut self, fd: OwnedFd, size: u32) -> Result<()> {
        // SAFETY: the compositor hands out a read-only mapping of `size` bytes
        let keymap = unsafe {
            xkb::Keymap::new_from_fd(
                &self.context,
                fd,
                size as usize,
                xkb::KEYMAP_FORMAT_TEXT_V1,
                xkb::KEYMAP_COMPILE_NO_FLAGS,
            )
        }?
        .ok_or(GlpsError::Keymap)?;

        debug!("⌨️ Keymap loaded ({} bytes)", size);
        self.keymap = Some(Keymapped {
            state: xkb::State::new(&keymap),
        });
        Ok(())
    }

    pub fn has_keymap(&self) -> bool {
        self.keymap.is_some()
    }

    /// Window holding keyboard focus.
    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Serial of the last focus change or key event.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn repeat_info(&self) -> RepeatInfo {
        self.repeat
    }

    pub fn pressed_keys(&self) -> &[u32] {
        &self.pressed
    }

    /// Focus gained; `keys` are already held down.
    pub fn enter(&mut self, serial: u32, window: Option<WindowId>, keys: &[u32]) {
        self.serial = serial;
        self.focus = window;
        self.pressed = keys.to_vec();
        debug!("⌨️ Keyboard focus -> {:?}", window);
    }

    /// Focus lost. Returns the window that had focus and a release for every
    /// key still held.
    pub fn leave(&mut self, serial: u32, time: u32) -> (Option<WindowId>, Vec<KeyEvent>) {
        self.serial = serial;
        let held = std::mem::take(&mut self.pressed);
        let releases = held
            .into_iter()
            .map(|key| self.translate(key, false, time))
            .collect();
        let window = self.focus.take();
        debug!("⌨️ Keyboard left {:?}", window);
        (window, releases)
    }

    pub fn key(&mut self, serial: u32, time: u32, key: u32, pressed: bool) -> KeyEvent {
        self.serial = serial;
        if pressed {
            if !self.pressed.contains(&key) {
                self.pressed.push(key);
            }
        } else {
            self.pressed.retain(|held| *held != key);
        }
        let event = self.translate(key, pressed, time);
        trace!("⌨️ key {} ({:#x}) pressed={} {:?}", key, event.keysym, pressed, event.text);
        event
    }

    pub fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        let Some(keymapped) = self.keymap.as_mut() else {
            return;
        };
        keymapped
            .state
            .update_mask(depressed, latched, locked, 0, 0, group);

        let state = &keymapped.state;
        let active = |name: &str| state.mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE);
        self.modifiers = Modifiers {
            ctrl: active(xkb::MOD_NAME_CTRL),
            shift: active(xkb::MOD_NAME_SHIFT),
            alt: active(xkb::MOD_NAME_ALT),
            logo: active(xkb::MOD_NAME_LOGO),
            caps_lock: active(xkb::MOD_NAME_CAPS),
            num_lock: active(xkb::MOD_NAME_NUM),
        };
    }

    pub fn set_repeat_info(&mut self, rate: i32, delay: i32) {
        self.repeat = RepeatInfo { rate, delay };
    }

    pub fn forget_window(&mut self, window: WindowId) {
        if self.focus == Some(window) {
            self.focus = None;
            self.pressed.clear();
        }
    }

    fn translate(&self, key: u32, pressed: bool, time: u32) -> KeyEvent {
        let (keysym, text) = match &self.keymap {
            Some(keymapped) => {
                let code = xkb_keycode(key);
                let keysym = keymapped.state.key_get_one_sym(code).raw();
                let text = if pressed {
                    keymapped.state.key_get_utf8(code)
                } else {
                    String::new()
                };
                (keysym, text)
            }
            None => (0, String::new()),
        };
        KeyEvent {
            window: self.focus,
            key,
            keysym,
            text,
            pressed,
            time,
            modifiers: self.modifiers,
        }
    }
}
