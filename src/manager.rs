//! Window/context lifecycle core
//!
//! [`WindowSystem`] ties the window registry, the shared rendering context
//! and the frame scheduler together. It knows nothing about the wire
//! protocol: `N` is whatever native objects the caller keeps per window and
//! `B` is the graphics backend. The Wayland glue drives it, and so does the
//! test-suite with the headless backend.

use crate::config::GlpsConfig;
use crate::error::Result;
use crate::frame::{FrameScheduler, FrameTicket};
use crate::renderer::{Canvas, GraphicsBackend, RenderContext};
use crate::window::{SurfaceKey, WindowId, WindowProperties, WindowRecord, WindowRegistry};
use log::{debug, info, warn};
use std::time::Instant;

pub struct WindowSystem<N, B: GraphicsBackend> {
    registry: WindowRegistry<N>,
    render: RenderContext<B>,
    frames: FrameScheduler,
}

impl<N, B: GraphicsBackend> WindowSystem<N, B> {
    pub fn new(config: &GlpsConfig, backend: B) -> Self {
        Self {
            registry: WindowRegistry::new(config.window.capacity),
            render: RenderContext::new(
                backend,
                config.render.shaders.clone(),
                config.render.clear_color,
            ),
            frames: FrameScheduler::new(config.debug.enable_fps_counter),
        }
    }

    /// Fails with `CapacityExceeded` when another window would not fit.
    /// Callers check this before creating any native objects.
    pub fn check_capacity(&self) -> Result<()> {
        self.registry.ensure_capacity()
    }

    /// Registers a window whose native objects already exist. `render_target`
    /// picks the handle the rendering surface is created from.
    pub fn register<F>(
        &mut self,
        properties: &WindowProperties,
        surface: SurfaceKey,
        native: N,
        render_target: F,
    ) -> Result<WindowId>
    where
        F: FnOnce(&N) -> &B::NativeWindow,
    {
        let id = self.registry.next_id()?;
        self.render.attach_window(id, render_target(&native))?;
        let inserted = self.registry.insert(properties, surface, native)?;
        debug_assert_eq!(id, inserted);

        info!(
            "🪟 Window {} \"{}\" created ({}x{})",
            id, properties.title, properties.width, properties.height
        );
        Ok(id)
    }

    /// Cancels the window's frame task, releases its rendering surface and
    /// hands back the native objects for destruction.
    pub fn unregister(&mut self, id: WindowId) -> Result<N> {
        let record = self.registry.get_mut(id)?;
        self.frames.cancel(id, &mut record.frame);

        if let Err(err) = self.render.detach_window(id) {
            warn!("⚠️ Releasing rendering surface of window {} failed: {}", id, err);
        }
        let record = self.registry.remove(id)?;
        info!("🗑️ Window {} destroyed", id);
        Ok(record.native)
    }

    /// Runs one redraw: requests the next frame ticket (handed to `register`
    /// so the caller can ask the compositor for a completion signal), draws,
    /// and presents.
    pub fn present<R, D>(&mut self, id: WindowId, register: R, draw: D) -> Result<()>
    where
        R: FnOnce(&N, FrameTicket),
        D: FnOnce(&mut dyn Canvas),
    {
        let record = self.registry.get_mut(id)?;
        if let Some(ticket) = self.frames.request(id, &mut record.frame) {
            register(&record.native, ticket);
        }
        let (width, height) = (record.width, record.height);

        self.render.draw_frame(id, width, height, draw)?;
        self.render.swap(id)
    }

    /// Handles a frame-completion signal. Returns `true` when the window is
    /// alive and due for its next redraw.
    pub fn complete_frame(&mut self, ticket: FrameTicket, now: Instant) -> bool {
        match self.registry.get_mut(ticket.window) {
            Ok(record) => self.frames.complete(ticket, &mut record.frame, now),
            Err(err) => {
                debug!("Frame completion for a gone window: {}", err);
                false
            }
        }
    }

    /// Stores a size announced by the toplevel until the surface configure.
    pub fn stage_resize(&mut self, id: WindowId, width: u32, height: u32) -> Result<()> {
        let record = self.registry.get_mut(id)?;
        if width > 0 && height > 0 {
            record.pending_size = Some((width, height));
        }
        Ok(())
    }

    /// Applies the staged size. Returns the new size if it changed.
    pub fn apply_resize(&mut self, id: WindowId) -> Result<Option<(u32, u32)>> {
        let record = self.registry.get_mut(id)?;
        let Some((width, height)) = record.pending_size.take() else {
            return Ok(None);
        };
        if (width, height) == (record.width, record.height) {
            return Ok(None);
        }
        record.width = width;
        record.height = height;
        debug!("📐 Window {} resized to {}x{}", id, width, height);
        Ok(Some((width, height)))
    }

    pub fn resolve(&self, surface: SurfaceKey) -> Option<WindowId> {
        self.registry.resolve(surface)
    }

    pub fn window(&self, id: WindowId) -> Result<&WindowRecord<N>> {
        self.registry.get(id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Result<&mut WindowRecord<N>> {
        self.registry.get_mut(id)
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.registry.ids()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn created_count(&self) -> u64 {
        self.registry.created_count()
    }

    pub fn render(&self) -> &RenderContext<B> {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderContext<B> {
        &mut self.render
    }

    /// Destroys every window and the rendering context. Returns the native
    /// objects of the windows that were still open.
    pub fn teardown(&mut self) -> Vec<N> {
        for id in self.registry.ids() {
            if let Ok(record) = self.registry.get_mut(id) {
                self.frames.cancel(id, &mut record.frame);
            }
        }
        self.render.teardown();
        self.registry
            .drain()
            .into_iter()
            .map(|record| record.native)
            .collect()
    }
}
