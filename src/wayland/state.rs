//! Dispatch state shared by every Wayland event handler

use crate::callbacks::Callbacks;
use crate::data_transfer::{DataTransfer, TransferPayload};
use crate::error::GlpsError;
use crate::frame::FrameTicket;
use crate::input::InputState;
use crate::manager::WindowSystem;
use crate::protocol::SeatCapabilities;
use crate::renderer::egl::EglBackend;
use crate::window::{SurfaceKey, WindowId};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::time::Instant;
use wayland_client::globals::GlobalListContents;
use wayland_client::protocol::{
    wl_callback::{self, WlCallback},
    wl_compositor::WlCompositor,
    wl_data_device::WlDataDevice,
    wl_data_device_manager::WlDataDeviceManager,
    wl_data_source::WlDataSource,
    wl_keyboard::WlKeyboard,
    wl_pointer::WlPointer,
    wl_registry::{self, WlRegistry},
    wl_seat::WlSeat,
    wl_surface::{self, WlSurface},
    wl_touch::WlTouch,
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_egl::WlEglSurface;
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
    zxdg_toplevel_decoration_v1::{self, ZxdgToplevelDecorationV1},
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

/// Protocol objects owned by one window.
pub(crate) struct NativeWindow {
    pub(crate) surface: WlSurface,
    pub(crate) xdg_surface: XdgSurface,
    pub(crate) toplevel: XdgToplevel,
    pub(crate) decoration: Option<ZxdgToplevelDecorationV1>,
    pub(crate) egl_window: WlEglSurface,
}

impl NativeWindow {
    pub(crate) fn egl_window(&self) -> &WlEglSurface {
        &self.egl_window
    }

    /// Destroys the protocol objects, role objects first.
    pub(crate) fn destroy(self) {
        if let Some(decoration) = self.decoration {
            decoration.destroy();
        }
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        drop(self.egl_window);
        self.surface.destroy();
    }
}

pub(crate) struct Globals {
    pub(crate) compositor: WlCompositor,
    pub(crate) wm_base: XdgWmBase,
    pub(crate) decoration_manager: Option<ZxdgDecorationManagerV1>,
    pub(crate) seat: Option<WlSeat>,
    pub(crate) data_device_manager: Option<WlDataDeviceManager>,
}

#[derive(Default)]
pub(crate) struct Devices {
    pub(crate) capabilities: SeatCapabilities,
    pub(crate) pointer: Option<WlPointer>,
    pub(crate) keyboard: Option<WlKeyboard>,
    pub(crate) touch: Option<WlTouch>,
    pub(crate) data_device: Option<WlDataDevice>,
}

/// A selection published by this client.
pub(crate) struct OwnedSelection {
    pub(crate) source: WlDataSource,
    pub(crate) payload: TransferPayload,
}

pub(crate) struct WaylandState {
    pub(crate) system: WindowSystem<NativeWindow, EglBackend>,
    pub(crate) callbacks: Callbacks,
    pub(crate) input: InputState,
    pub(crate) transfer: DataTransfer<wayland_client::protocol::wl_data_offer::WlDataOffer>,
    pub(crate) globals: Globals,
    pub(crate) devices: Devices,
    pub(crate) selection: Option<OwnedSelection>,
    /// Toplevel sizes announced before the window finished registering.
    pub(crate) preconfigured: HashMap<SurfaceKey, (u32, u32)>,
    pub(crate) next_surface_key: u32,
    /// Serial of the latest input event, needed to set the selection.
    pub(crate) last_serial: u32,
    pub(crate) fatal: Option<GlpsError>,
}

impl WaylandState {
    pub(crate) fn allocate_surface_key(&mut self) -> SurfaceKey {
        let key = SurfaceKey(self.next_surface_key);
        self.next_surface_key = self.next_surface_key.wrapping_add(1);
        key
    }

    /// Window behind a surface, if it is one of ours.
    pub(crate) fn window_of(&self, surface: &WlSurface) -> Option<WindowId> {
        surface
            .data::<SurfaceKey>()
            .and_then(|key| self.system.resolve(*key))
    }

    /// Draws the window and asks for the next frame-completion signal.
    pub(crate) fn redraw(&mut self, id: WindowId, qh: &QueueHandle<Self>) {
        let Self {
            system,
            callbacks,
            fatal,
            ..
        } = self;
        let result = system.present(
            id,
            |native, ticket| {
                native.surface.frame(qh, ticket);
            },
            |canvas| callbacks.emit_frame_update(id, canvas),
        );

        if let Err(err) = result {
            if err.is_recoverable() {
                debug!("Skipping redraw of window {}: {}", id, err);
            } else {
                error!("❌ Redraw of window {} failed: {}", id, err);
                fatal.get_or_insert(err);
            }
        }
    }

    /// Unregisters the window and destroys its protocol objects.
    pub(crate) fn destroy_window(&mut self, id: WindowId) -> crate::error::Result<()> {
        let native = self.system.unregister(id)?;
        self.input.forget_window(id);
        native.destroy();
        Ok(())
    }

    fn configure_toplevel(&mut self, key: SurfaceKey, width: i32, height: i32) {
        let (width, height) = (width.max(0) as u32, height.max(0) as u32);
        match self.system.resolve(key) {
            Some(id) => {
                if let Err(err) = self.system.stage_resize(id, width, height) {
                    debug!("Configure for window {} ignored: {}", id, err);
                }
            }
            None if width > 0 && height > 0 => {
                self.preconfigured.insert(key, (width, height));
            }
            None => {}
        }
    }

    fn configure_surface(&mut self, key: SurfaceKey) {
        let Some(id) = self.system.resolve(key) else {
            return;
        };
        match self.system.apply_resize(id) {
            Ok(Some((width, height))) => {
                if let Ok(record) = self.system.window(id) {
                    record
                        .native
                        .egl_window
                        .resize(width as i32, height as i32, 0, 0);
                }
                self.callbacks.emit_resize(id, width, height);
            }
            Ok(None) => {}
            Err(err) => debug!("Surface configure for window {} ignored: {}", id, err),
        }
    }
}

impl Dispatch<WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        _state: &mut Self,
        _registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                interface, version, ..
            } => trace!("🔌 Late global {} v{} ignored", interface, version),
            wl_registry::Event::GlobalRemove { name } => {
                debug!("🔌 Global {} removed", name)
            }
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, SurfaceKey> for WaylandState {
    fn event(
        state: &mut Self,
        xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        key: &SurfaceKey,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.configure_surface(*key);
        }
    }
}

impl Dispatch<XdgToplevel, SurfaceKey> for WaylandState {
    fn event(
        state: &mut Self,
        _toplevel: &XdgToplevel,
        event: xdg_toplevel::Event,
        key: &SurfaceKey,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state.configure_toplevel(*key, width, height);
            }
            xdg_toplevel::Event::Close => {
                let Some(id) = state.system.resolve(*key) else {
                    return;
                };
                info!("🚪 Compositor asked window {} to close", id);
                state.callbacks.emit_close(id);
                if let Err(err) = state.destroy_window(id) {
                    warn!("⚠️ Closing window {} failed: {}", id, err);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<ZxdgToplevelDecorationV1, SurfaceKey> for WaylandState {
    fn event(
        _state: &mut Self,
        _decoration: &ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        key: &SurfaceKey,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event {
            match mode {
                WEnum::Value(mode) => debug!("🖼️ Surface {:?} decoration mode {:?}", key, mode),
                WEnum::Unknown(raw) => debug!("🖼️ Surface {:?} unknown decoration mode {}", key, raw),
            }
        }
    }
}

impl Dispatch<WlSurface, SurfaceKey> for WaylandState {
    fn event(
        _state: &mut Self,
        _surface: &WlSurface,
        event: wl_surface::Event,
        key: &SurfaceKey,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_surface::Event::Enter { output } = event {
            trace!("Surface {:?} entered output {}", key, output.id());
        }
    }
}

impl Dispatch<WlCallback, FrameTicket> for WaylandState {
    fn event(
        state: &mut Self,
        _callback: &WlCallback,
        event: wl_callback::Event,
        ticket: &FrameTicket,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            if state.system.complete_frame(*ticket, Instant::now()) {
                state.redraw(ticket.window, qh);
            }
        }
    }
}

delegate_noop!(WaylandState: ignore WlCompositor);
delegate_noop!(WaylandState: ignore ZxdgDecorationManagerV1);
delegate_noop!(WaylandState: ignore WlDataDeviceManager);
