//! GPU-free graphics backend
//!
//! Records every context, surface and object operation in
//! [`HeadlessCounters`] instead of talking to a driver. Used by the test
//! suite and anywhere the window core runs without a display.

use super::{GraphicsBackend, Vertex};
use crate::config::ShaderPaths;
use crate::error::{GlpsError, Result};
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessCounters {
    pub contexts_created: u32,
    pub shared_setups: u32,
    pub shared_releases: u32,
    pub vao_pairs_created: u32,
    pub vao_pairs_released: u32,
    pub surfaces_created: u32,
    pub surfaces_destroyed: u32,
    pub make_current_calls: u32,
    pub frames_begun: u64,
    pub swaps: u64,
    pub triangles: u64,
    /// GPU object calls issued while no surface was current.
    pub objects_without_current: u32,
    pub teardowns: u32,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    counters: HeadlessCounters,
    next_surface: u32,
    current: Option<u32>,
    fail_shared_setup: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> HeadlessCounters {
        self.counters
    }

    /// Surface currently bound, if any.
    pub fn current_surface(&self) -> Option<u32> {
        self.current
    }

    /// Makes the next shared setups fail, like a shader that does not compile.
    pub fn fail_shared_setup(&mut self, fail: bool) {
        self.fail_shared_setup = fail;
    }

    fn touch_objects(&mut self) {
        if self.current.is_none() {
            self.counters.objects_without_current += 1;
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    type NativeWindow = ();
    type Surface = u32;
    type Shared = ();
    type WindowObjects = u32;

    fn create_surface(&mut self, _native: &()) -> Result<u32> {
        let surface = self.next_surface;
        self.next_surface += 1;
        self.counters.surfaces_created += 1;
        Ok(surface)
    }

    fn destroy_surface(&mut self, surface: u32) {
        if self.current == Some(surface) {
            self.current = None;
        }
        self.counters.surfaces_destroyed += 1;
    }

    fn create_context(&mut self) -> Result<()> {
        self.counters.contexts_created += 1;
        Ok(())
    }

    fn make_current(&mut self, surface: Option<&u32>) -> Result<()> {
        self.counters.make_current_calls += 1;
        self.current = surface.copied();
        Ok(())
    }

    fn load_functions(&mut self) -> Result<()> {
        Ok(())
    }

    fn setup_shared(&mut self, _shaders: &ShaderPaths) -> Result<()> {
        self.touch_objects();
        if self.fail_shared_setup {
            return Err(GlpsError::Shader {
                name: "shape".to_string(),
                log: "headless failure".to_string(),
            });
        }
        self.counters.shared_setups += 1;
        Ok(())
    }

    fn setup_window_objects(&mut self, _shared: &()) -> Result<u32> {
        self.touch_objects();
        self.counters.vao_pairs_created += 1;
        Ok(self.counters.vao_pairs_created)
    }

    fn release_window_objects(&mut self, _objects: u32) {
        self.touch_objects();
        self.counters.vao_pairs_released += 1;
    }

    fn begin_frame(&mut self, _width: u32, _height: u32, _clear: [f32; 4]) {
        self.touch_objects();
        self.counters.frames_begun += 1;
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.touch_objects();
    }

    fn draw_triangles(&mut self, _shared: &(), objects: &u32, vertices: &[Vertex]) {
        self.touch_objects();
        trace!("headless: {} vertices through VAO pair {}", vertices.len(), objects);
        self.counters.triangles += (vertices.len() / 3) as u64;
    }

    fn swap(&mut self, _surface: &u32) -> Result<()> {
        self.counters.swaps += 1;
        Ok(())
    }

    fn release_shared(&mut self, _shared: ()) {
        self.touch_objects();
        self.counters.shared_releases += 1;
    }

    fn teardown(&mut self) {
        self.current = None;
        self.counters.teardowns += 1;
    }
}
