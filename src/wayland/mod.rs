//! Wayland client backend
//!
//! [`WindowManager`] owns the connection, the event queue and every window.
//! Windows are xdg toplevels rendered through one shared EGL context; each
//! redraw is paced by the compositor's frame callbacks. Input arrives per
//! device, is coalesced until the device's frame event and then handed to
//! the registered [`Callbacks`].
//!
//! Everything runs on the thread that calls [`WindowManager::run`] (or
//! [`WindowManager::dispatch`]); callbacks are invoked from inside dispatch.

mod data_device;
mod input;
mod state;

use crate::callbacks::Callbacks;
use crate::config::GlpsConfig;
use crate::data_transfer::{DataTransfer, TransferPayload};
use crate::error::{GlpsError, Result};
use crate::input::InputState;
use crate::manager::WindowSystem;
use crate::protocol::{GlobalCensus, GlobalKind};
use crate::renderer::egl::EglBackend;
use crate::window::{WindowId, WindowProperties};
use log::{debug, error, info, warn};
use state::{Devices, Globals, NativeWindow, OwnedSelection, WaylandState};
use std::collections::HashMap;
use std::ffi::c_void;
use wayland_client::globals::{registry_queue_init, GlobalList};
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_egl::WlEglSurface;
use wayland_protocols::xdg::decoration::zv1::client::zxdg_toplevel_decoration_v1::Mode;

/// Binds `kind` at the highest version both sides speak.
fn bind<I>(
    globals: &GlobalList,
    qh: &QueueHandle<WaylandState>,
    census: &GlobalCensus,
    kind: GlobalKind,
) -> Result<I>
where
    I: Proxy + 'static,
    WaylandState: Dispatch<I, ()>,
{
    let version = census
        .usable_version(kind)
        .ok_or(GlpsError::MissingGlobal(kind.interface()))?;
    globals
        .bind::<I, _, _>(qh, version..=version, ())
        .map_err(|source| GlpsError::Bind {
            interface: kind.interface(),
            source,
        })
}

fn bind_optional<I>(
    globals: &GlobalList,
    qh: &QueueHandle<WaylandState>,
    census: &GlobalCensus,
    kind: GlobalKind,
) -> Result<Option<I>>
where
    I: Proxy + 'static,
    WaylandState: Dispatch<I, ()>,
{
    if census.has(kind) {
        bind(globals, qh, census, kind).map(Some)
    } else {
        Ok(None)
    }
}

/// Connection to the compositor plus every window opened on it.
pub struct WindowManager {
    conn: Connection,
    queue: EventQueue<WaylandState>,
    qh: QueueHandle<WaylandState>,
    state: WaylandState,
    app_id: String,
    font_path: String,
    closed: bool,
}

impl WindowManager {
    /// Connects to the display named by the environment, binds the globals
    /// and brings up EGL. No window exists yet.
    pub fn connect(config: &GlpsConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| GlpsError::Config(err.to_string()))?;

        let conn = Connection::connect_to_env()?;
        info!("🔌 Connected to the Wayland display");

        let (globals, mut queue) = registry_queue_init::<WaylandState>(&conn)?;
        let qh = queue.handle();

        let census = globals.contents().with_list(|list| {
            GlobalCensus::from_globals(
                list.iter()
                    .map(|global| (global.interface.as_str(), global.version)),
            )
        });
        census.check()?;

        let bound = Globals {
            compositor: bind(&globals, &qh, &census, GlobalKind::Compositor)?,
            wm_base: bind(&globals, &qh, &census, GlobalKind::WmBase)?,
            decoration_manager: bind_optional(&globals, &qh, &census, GlobalKind::DecorationManager)?,
            seat: bind_optional(&globals, &qh, &census, GlobalKind::Seat)?,
            data_device_manager: bind_optional(&globals, &qh, &census, GlobalKind::DataDeviceManager)?,
        };

        let mut devices = Devices::default();
        if let (Some(manager), Some(seat)) = (&bound.data_device_manager, &bound.seat) {
            devices.data_device = Some(manager.get_data_device(seat, &qh, ()));
        }

        // SAFETY: the display pointer stays valid while `conn` lives, and
        // `shutdown` terminates EGL before the connection is dropped.
        let backend = unsafe {
            EglBackend::new(conn.backend().display_ptr().cast::<c_void>(), &config.render)?
        };

        let mut state = WaylandState {
            system: WindowSystem::new(config, backend),
            callbacks: Callbacks::new(),
            input: InputState::new(),
            transfer: DataTransfer::new(config.input.preferred_mime_types.clone()),
            globals: bound,
            devices,
            selection: None,
            preconfigured: HashMap::new(),
            next_surface_key: 0,
            last_serial: 0,
            fatal: None,
        };

        // seat capabilities arrive with this roundtrip
        queue.roundtrip(&mut state)?;

        Ok(Self {
            conn,
            queue,
            qh,
            state,
            app_id: config.window.app_id.clone(),
            font_path: config.general.font_path.clone(),
            closed: false,
        })
    }

    pub fn callbacks(&mut self) -> &mut Callbacks {
        &mut self.state.callbacks
    }

    pub fn font_path(&self) -> &str {
        &self.font_path
    }

    /// Opens a toplevel window and draws its first frame.
    ///
    /// Fails with `CapacityExceeded` before any protocol object is created
    /// when the window table is full.
    pub fn create_window(&mut self, properties: WindowProperties) -> Result<WindowId> {
        if self.closed {
            return Err(GlpsError::ShutDown);
        }
        self.state.system.check_capacity()?;
        let properties = properties.bounded();

        let key = self.state.allocate_surface_key();
        let qh = &self.qh;
        let globals = &self.state.globals;

        let surface = globals.compositor.create_surface(qh, key);
        let xdg_surface = globals.wm_base.get_xdg_surface(&surface, qh, key);
        let toplevel = xdg_surface.get_toplevel(qh, key);
        toplevel.set_title(properties.title.clone());
        toplevel.set_app_id(self.app_id.clone());

        let decoration = globals.decoration_manager.as_ref().map(|manager| {
            let decoration = manager.get_toplevel_decoration(&toplevel, qh, key);
            decoration.set_mode(Mode::ServerSide);
            decoration
        });

        // the first configure must be acked before anything is attached
        surface.commit();
        self.queue.roundtrip(&mut self.state)?;

        let (width, height) = self
            .state
            .preconfigured
            .remove(&key)
            .unwrap_or((properties.width.max(1), properties.height.max(1)));

        let egl_window = match WlEglSurface::new(surface.id(), width as i32, height as i32) {
            Ok(egl_window) => egl_window,
            Err(err) => {
                if let Some(decoration) = decoration {
                    decoration.destroy();
                }
                toplevel.destroy();
                xdg_surface.destroy();
                surface.destroy();
                return Err(err.into());
            }
        };

        let native = NativeWindow {
            surface,
            xdg_surface,
            toplevel,
            decoration,
            egl_window,
        };
        let properties = WindowProperties {
            width,
            height,
            ..properties
        };
        let id = self
            .state
            .system
            .register(&properties, key, native, NativeWindow::egl_window)?;

        self.state.redraw(id, &self.qh);
        self.conn.flush()?;
        Ok(id)
    }

    pub fn destroy_window(&mut self, id: WindowId) -> Result<()> {
        self.state.destroy_window(id)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Window behind a surface, if it belongs to this manager.
    pub fn resolve(&self, surface: &WlSurface) -> Option<WindowId> {
        self.state.window_of(surface)
    }

    pub fn window_size(&self, id: WindowId) -> Result<(u32, u32)> {
        let record = self.state.system.window(id)?;
        Ok((record.width, record.height))
    }

    pub fn windows(&self) -> Vec<WindowId> {
        self.state.system.ids()
    }

    pub fn window_count(&self) -> usize {
        self.state.system.len()
    }

    /// Redraws now, outside the frame-callback rhythm.
    pub fn redraw(&mut self, id: WindowId) -> Result<()> {
        self.state.system.window(id)?;
        self.state.redraw(id, &self.qh);
        self.take_fatal()
    }

    /// Publishes `data` as the clipboard selection.
    pub fn clipboard_copy(&mut self, mime_type: &str, data: &[u8]) -> Result<()> {
        let Some(manager) = self.state.globals.data_device_manager.as_ref() else {
            return Err(GlpsError::MissingGlobal(GlobalKind::DataDeviceManager.interface()));
        };
        let Some(device) = self.state.devices.data_device.as_ref() else {
            return Err(GlpsError::MissingGlobal(GlobalKind::Seat.interface()));
        };

        let payload = TransferPayload::new(mime_type, data);
        let source = manager.create_data_source(&self.qh, ());
        source.offer(payload.mime_type.clone());
        device.set_selection(Some(&source), self.state.last_serial);
        info!("📋 Copied {} bytes as {}", payload.data.len(), payload.mime_type);

        self.state.transfer.store_clipboard(payload.clone());
        if let Some(previous) = self
            .state
            .selection
            .replace(OwnedSelection { source, payload })
        {
            previous.source.destroy();
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Reads the current selection. Our own selection is served locally.
    pub fn clipboard_paste(&mut self) -> Result<Option<TransferPayload>> {
        if let Some(own) = &self.state.selection {
            return Ok(Some(own.payload.clone()));
        }
        let Some((offer, mime_type)) = self.state.transfer.selection() else {
            debug!("📋 Nothing to paste");
            return Ok(None);
        };
        let offer = offer.clone();

        let payload = data_device::receive(&offer, &mime_type, &self.conn)?;
        self.state.transfer.store_clipboard(payload.clone());
        Ok(Some(payload))
    }

    /// Last payload received by drop or paste, or published by copy.
    pub fn last_transfer(&self) -> Option<&TransferPayload> {
        self.state.transfer.clipboard()
    }

    /// Blocks for one batch of events and dispatches it.
    pub fn dispatch(&mut self) -> Result<usize> {
        if self.closed {
            return Err(GlpsError::ShutDown);
        }
        let dispatched = self.queue.blocking_dispatch(&mut self.state)?;
        self.take_fatal()?;
        Ok(dispatched)
    }

    /// Dispatches until the connection closes or no window is left, then
    /// tears everything down. Returns at once when no window was opened.
    ///
    /// A lost connection ends the loop normally; a rendering failure is
    /// returned after teardown.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "▶️ Event loop started with {} window(s)",
            self.state.system.len()
        );
        let outcome = loop {
            if self.state.system.is_empty() {
                if self.state.system.created_count() == 0 {
                    warn!("⚠️ No window to run");
                } else {
                    info!("🪟 Last window closed");
                }
                break Ok(());
            }
            match self.queue.blocking_dispatch(&mut self.state) {
                Ok(_) => {}
                Err(err) => {
                    warn!("⚠️ Connection lost: {}", err);
                    break Ok(());
                }
            }
            if let Err(err) = self.take_fatal() {
                break Err(err);
            }
        };

        self.shutdown();
        outcome
    }

    fn take_fatal(&mut self) -> Result<()> {
        match self.state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Destroys every window, the rendering context and the device objects.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for native in self.state.system.teardown() {
            native.destroy();
        }
        self.state.release_devices();
        if let Some(selection) = self.state.selection.take() {
            selection.source.destroy();
        }
        for offer in self.state.transfer.clear() {
            offer.destroy();
        }
        if let Some(manager) = self.state.globals.decoration_manager.take() {
            manager.destroy();
        }
        if let Some(seat) = self.state.globals.seat.take() {
            seat.release();
        }
        self.state.globals.wm_base.destroy();

        if let Err(err) = self.conn.flush() {
            error!("❌ Final flush failed: {}", err);
        }
        info!("👋 Wayland backend shut down");
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
