//! Shared rendering context for all windows
//!
//! One graphics context serves every window. Driver state is global to the
//! process, so every draw or GPU-object call must be preceded by making the
//! target window's surface current. [`RenderContext`] is the only place that
//! does this; it also guarantees the shared programs and buffers are set up
//! exactly once, when the first window attaches.
//!
//! The graphics API itself sits behind [`GraphicsBackend`]: EGL + OpenGL for
//! real windows, a counting headless backend for tests.

pub mod egl;
pub mod headless;
pub mod shaders;

pub use headless::HeadlessBackend;

use crate::config::ShaderPaths;
use crate::error::{GlpsError, Result};
use crate::window::WindowId;
use log::{debug, info};
use std::collections::HashMap;

/// Vertex layout of the shape program (`pos`, `col` attributes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub col: [f32; 3],
}

impl Vertex {
    pub const fn new(pos: [f32; 2], col: [f32; 3]) -> Self {
        Self { pos, col }
    }
}

/// Colored quad drawn by the demo when the application draws nothing else.
pub const DEMO_QUAD: [Vertex; 6] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 0.0]),
];

/// Graphics API operations the context manager needs.
///
/// Methods that touch GPU objects assume the right surface was made current
/// just before; [`RenderContext`] upholds that.
pub trait GraphicsBackend {
    /// Native window handle a rendering surface is created from.
    type NativeWindow;
    type Surface;
    /// Programs and buffers shared by every window.
    type Shared;
    /// Per-window vertex arrays and programs.
    type WindowObjects;

    fn create_surface(&mut self, native: &Self::NativeWindow) -> Result<Self::Surface>;
    fn destroy_surface(&mut self, surface: Self::Surface);

    /// Creates the single context. Called once, before the first `make_current`.
    fn create_context(&mut self) -> Result<()>;

    /// Binds the context to `surface`, or unbinds it with `None`.
    fn make_current(&mut self, surface: Option<&Self::Surface>) -> Result<()>;

    /// Resolves API entry points. Called once, with a surface current.
    fn load_functions(&mut self) -> Result<()>;

    fn setup_shared(&mut self, shaders: &ShaderPaths) -> Result<Self::Shared>;
    fn setup_window_objects(&mut self, shared: &Self::Shared) -> Result<Self::WindowObjects>;
    fn release_window_objects(&mut self, objects: Self::WindowObjects);

    /// Sets the viewport and clears the current surface.
    fn begin_frame(&mut self, width: u32, height: u32, clear: [f32; 4]);
    fn clear(&mut self, color: [f32; 4]);
    fn draw_triangles(
        &mut self,
        shared: &Self::Shared,
        objects: &Self::WindowObjects,
        vertices: &[Vertex],
    );

    fn swap(&mut self, surface: &Self::Surface) -> Result<()>;

    fn release_shared(&mut self, shared: Self::Shared);

    /// Destroys the context and disconnects from the display.
    fn teardown(&mut self);
}

/// Drawing surface handed to the frame-update callback.
pub trait Canvas {
    fn window(&self) -> WindowId;
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: [f32; 4]);
    fn draw_triangles(&mut self, vertices: &[Vertex]);
}

struct FrameCanvas<'a, B: GraphicsBackend> {
    backend: &'a mut B,
    shared: &'a B::Shared,
    objects: &'a B::WindowObjects,
    window: WindowId,
    size: (u32, u32),
}

impl<B: GraphicsBackend> Canvas for FrameCanvas<'_, B> {
    fn window(&self) -> WindowId {
        self.window
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.backend.clear(color);
    }

    fn draw_triangles(&mut self, vertices: &[Vertex]) {
        if !vertices.is_empty() {
            self.backend
                .draw_triangles(self.shared, self.objects, vertices);
        }
    }
}

struct RenderTarget<B: GraphicsBackend> {
    surface: B::Surface,
    objects: Option<B::WindowObjects>,
}

/// Setup-side-effect counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub shared_setups: u32,
    pub attached_windows: usize,
    pub frames_drawn: u64,
    pub swaps: u64,
}

pub struct RenderContext<B: GraphicsBackend> {
    backend: B,
    shaders: ShaderPaths,
    clear_color: [f32; 4],
    context_created: bool,
    shared: Option<B::Shared>,
    targets: HashMap<WindowId, RenderTarget<B>>,
    current: Option<WindowId>,
    stats: RenderStats,
}

impl<B: GraphicsBackend> RenderContext<B> {
    pub fn new(backend: B, shaders: ShaderPaths, clear_color: [f32; 4]) -> Self {
        Self {
            backend,
            shaders,
            clear_color,
            context_created: false,
            shared: None,
            targets: HashMap::new(),
            current: None,
            stats: RenderStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn stats(&self) -> RenderStats {
        RenderStats {
            attached_windows: self.targets.len(),
            ..self.stats
        }
    }

    /// Window the context is currently bound to.
    pub fn current(&self) -> Option<WindowId> {
        self.current
    }

    pub fn is_attached(&self, window: WindowId) -> bool {
        self.targets.contains_key(&window)
    }

    /// Creates the window's surface and per-window objects. The first
    /// attached window also brings up the context and the shared objects.
    pub fn attach_window(&mut self, window: WindowId, native: &B::NativeWindow) -> Result<()> {
        let surface = self.backend.create_surface(native)?;
        self.targets.insert(
            window,
            RenderTarget {
                surface,
                objects: None,
            },
        );

        if let Err(err) = self.init_target(window) {
            if let Some(target) = self.targets.remove(&window) {
                if self.current == Some(window) {
                    let _ = self.backend.make_current(None);
                    self.current = None;
                }
                self.backend.destroy_surface(target.surface);
            }
            return Err(err);
        }

        debug!("🎨 Window {} attached to the shared context", window);
        Ok(())
    }

    fn init_target(&mut self, window: WindowId) -> Result<()> {
        if !self.context_created {
            self.backend.create_context()?;
            self.context_created = true;
        }
        self.make_current(window)?;

        if self.shared.is_none() {
            self.backend.load_functions()?;
            let shared = self.backend.setup_shared(&self.shaders)?;
            self.shared = Some(shared);
            self.stats.shared_setups += 1;
            info!("🎨 Shared programs and buffers ready");
        }

        let Some(shared) = self.shared.as_ref() else {
            return Err(GlpsError::egl("setup", "shared objects missing"));
        };
        let objects = self.backend.setup_window_objects(shared)?;
        if let Some(target) = self.targets.get_mut(&window) {
            target.objects = Some(objects);
        }
        Ok(())
    }

    /// Releases the window's objects and destroys its surface.
    pub fn detach_window(&mut self, window: WindowId) -> Result<()> {
        if !self.targets.contains_key(&window) {
            return Err(GlpsError::UnknownWindow(window));
        }
        // objects belong to the context; release them with the window's surface bound
        self.make_current(window)?;

        let Some(target) = self.targets.remove(&window) else {
            return Err(GlpsError::UnknownWindow(window));
        };
        if let Some(objects) = target.objects {
            self.backend.release_window_objects(objects);
        }
        self.backend.make_current(None)?;
        self.current = None;
        self.backend.destroy_surface(target.surface);

        debug!("🎨 Window {} detached", window);
        Ok(())
    }

    /// Binds the shared context to the window's surface.
    pub fn make_current(&mut self, window: WindowId) -> Result<()> {
        let target = self
            .targets
            .get(&window)
            .ok_or(GlpsError::UnknownWindow(window))?;
        self.backend.make_current(Some(&target.surface))?;
        self.current = Some(window);
        Ok(())
    }

    /// Makes the window current, clears it and lets `draw` fill the frame.
    pub fn draw_frame<F>(&mut self, window: WindowId, width: u32, height: u32, draw: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Canvas),
    {
        self.make_current(window)?;

        let Self {
            backend,
            shared,
            targets,
            clear_color,
            stats,
            ..
        } = self;
        let target = targets
            .get(&window)
            .ok_or(GlpsError::UnknownWindow(window))?;
        let (Some(shared), Some(objects)) = (shared.as_ref(), target.objects.as_ref()) else {
            return Err(GlpsError::egl("draw", "window has no GPU objects"));
        };

        backend.begin_frame(width, height, *clear_color);
        let mut canvas = FrameCanvas {
            backend,
            shared,
            objects,
            window,
            size: (width, height),
        };
        draw(&mut canvas);
        stats.frames_drawn += 1;
        Ok(())
    }

    /// Presents the back buffer. Valid right after `draw_frame` on the same window.
    pub fn swap(&mut self, window: WindowId) -> Result<()> {
        let target = self
            .targets
            .get(&window)
            .ok_or(GlpsError::UnknownWindow(window))?;
        self.backend.swap(&target.surface)?;
        self.stats.swaps += 1;
        Ok(())
    }

    /// Releases shared objects, detaches every window, then destroys the context.
    pub fn teardown(&mut self) {
        let mut windows: Vec<WindowId> = self.targets.keys().copied().collect();
        windows.sort_by_key(|id| id.index());

        if let Some(shared) = self.shared.take() {
            // without a surface to bind, destroying the context frees them
            if let Some(&window) = windows.first() {
                if self.make_current(window).is_ok() {
                    self.backend.release_shared(shared);
                }
            }
        }
        for window in windows {
            if let Err(err) = self.detach_window(window) {
                debug!("Detaching window {} during teardown failed: {}", window, err);
            }
        }
        if self.context_created {
            self.backend.teardown();
            self.context_created = false;
            info!("🎨 Rendering context released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RenderContext<HeadlessBackend> {
        RenderContext::new(
            HeadlessBackend::new(),
            ShaderPaths::default(),
            [0.2, 0.3, 0.3, 1.0],
        )
    }

    fn id(index: u32) -> WindowId {
        WindowId::from_raw_parts(index, 0)
    }

    #[test]
    fn test_shared_setup_runs_once() {
        let mut render = context();
        for index in 0..4 {
            render.attach_window(id(index), &()).unwrap();
        }
        assert_eq!(render.stats().shared_setups, 1);
        assert_eq!(render.backend().counters().shared_setups, 1);
        assert_eq!(render.backend().counters().contexts_created, 1);
        assert_eq!(render.backend().counters().vao_pairs_created, 4);
        assert_eq!(render.stats().attached_windows, 4);
    }

    #[test]
    fn test_window_objects_created_while_current() {
        let mut render = context();
        render.attach_window(id(0), &()).unwrap();
        render.attach_window(id(1), &()).unwrap();
        assert_eq!(render.current(), Some(id(1)));
        assert_eq!(render.backend().counters().objects_without_current, 0);
    }

    #[test]
    fn test_draw_frame_binds_target_window() {
        let mut render = context();
        render.attach_window(id(0), &()).unwrap();
        render.attach_window(id(1), &()).unwrap();

        render
            .draw_frame(id(0), 640, 480, |canvas| {
                assert_eq!(canvas.window(), id(0));
                assert_eq!(canvas.size(), (640, 480));
                canvas.draw_triangles(&DEMO_QUAD);
            })
            .unwrap();
        render.swap(id(0)).unwrap();

        assert_eq!(render.current(), Some(id(0)));
        let counters = render.backend().counters();
        assert_eq!(counters.triangles, 2);
        assert_eq!(counters.swaps, 1);
        assert_eq!(render.stats().frames_drawn, 1);
    }

    #[test]
    fn test_detach_releases_objects_and_surface() {
        let mut render = context();
        render.attach_window(id(0), &()).unwrap();
        render.attach_window(id(1), &()).unwrap();
        render.detach_window(id(0)).unwrap();

        let counters = render.backend().counters();
        assert_eq!(counters.vao_pairs_released, 1);
        assert_eq!(counters.surfaces_destroyed, 1);
        assert_eq!(counters.objects_without_current, 0);
        assert!(!render.is_attached(id(0)));
        assert!(matches!(
            render.detach_window(id(0)),
            Err(GlpsError::UnknownWindow(_))
        ));
    }

    #[test]
    fn test_failed_shared_setup_leaves_no_surface() {
        let mut render = context();
        render.backend_mut().fail_shared_setup(true);
        assert!(render.attach_window(id(0), &()).is_err());
        assert!(!render.is_attached(id(0)));
        assert_eq!(render.backend().counters().surfaces_destroyed, 1);

        render.backend_mut().fail_shared_setup(false);
        render.attach_window(id(1), &()).unwrap();
        assert_eq!(render.stats().shared_setups, 1);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut render = context();
        for index in 0..3 {
            render.attach_window(id(index), &()).unwrap();
        }
        render.teardown();

        let counters = render.backend().counters();
        assert_eq!(counters.vao_pairs_released, 3);
        assert_eq!(counters.surfaces_destroyed, 3);
        assert_eq!(counters.teardowns, 1);
        assert_eq!(counters.shared_releases, 1);
        assert_eq!(counters.objects_without_current, 0);
        assert_eq!(render.stats().attached_windows, 0);

        render.teardown();
        assert_eq!(render.backend().counters().teardowns, 1);
    }
}
