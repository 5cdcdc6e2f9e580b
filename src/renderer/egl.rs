//! EGL + desktop OpenGL backend for Wayland windows

use super::{shaders, GraphicsBackend, Vertex};
use crate::config::{RenderConfig, ShaderPaths};
use crate::error::{GlpsError, Result};
use gl::types::{GLsizei, GLsizeiptr, GLuint};
use khronos_egl as egl;
use log::{debug, info, warn};
use std::cell::Cell;
use std::ffi::{c_void, CString};
use wayland_egl::WlEglSurface;

// EGL_KHR_create_context
const CONTEXT_MAJOR_VERSION: egl::Int = 0x3098;
const CONTEXT_MINOR_VERSION: egl::Int = 0x30FB;
const CONTEXT_OPENGL_PROFILE_MASK: egl::Int = 0x30FD;
const CONTEXT_OPENGL_CORE_PROFILE_BIT: egl::Int = 0x0000_0001;
const CONTEXT_OPENGL_COMPATIBILITY_PROFILE_BIT: egl::Int = 0x0000_0002;

/// Floats reserved per glyph quad in the text buffer (6 vertices of vec4).
const TEXT_QUAD_FLOATS: usize = 6 * 4;

type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

/// Window surface plus whether its swap interval was configured yet.
pub struct EglSurface {
    surface: egl::Surface,
    interval_set: Cell<bool>,
}

/// Objects shared by every window.
#[derive(Debug)]
pub struct GlShared {
    shape_program: GLuint,
    shape_vbo: GLuint,
    text_vbo: GLuint,
    text_vertex: GLuint,
    text_fragment: GLuint,
}

/// Per-window programs and vertex arrays.
#[derive(Debug)]
pub struct GlWindowObjects {
    text_program: GLuint,
    text_vao: GLuint,
    shape_vao: GLuint,
}

impl GlWindowObjects {
    pub fn text_program(&self) -> GLuint {
        self.text_program
    }

    pub fn text_vao(&self) -> GLuint {
        self.text_vao
    }
}

pub struct EglBackend {
    egl: EglInstance,
    display: egl::Display,
    config: egl::Config,
    context: Option<egl::Context>,
    gl_version: (i32, i32),
    core_profile: bool,
}

impl EglBackend {
    /// Loads libEGL and initialises it on the given `wl_display`.
    ///
    /// # Safety
    ///
    /// `display` must point to a live `wl_display` that outlives the backend.
    pub unsafe fn new(display: *mut c_void, render: &RenderConfig) -> Result<Self> {
        let egl = EglInstance::load_required().map_err(|err| GlpsError::egl("load", err))?;

        let display = egl
            .get_display(display as egl::NativeDisplayType)
            .ok_or_else(|| GlpsError::egl("get_display", "no EGL display for this connection"))?;

        let (major, minor) = egl
            .initialize(display)
            .map_err(|err| GlpsError::egl("initialize", err))?;
        info!("🖼️ EGL {}.{} initialized", major, minor);

        let attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_BIT,
            egl::NONE,
        ];
        let config = egl
            .choose_first_config(display, &attribs)
            .map_err(|err| GlpsError::egl("choose_config", err))?
            .ok_or_else(|| GlpsError::egl("choose_config", "no matching config"))?;

        egl.bind_api(egl::OPENGL_API)
            .map_err(|err| GlpsError::egl("bind_api", err))?;

        Ok(Self {
            egl,
            display,
            config,
            context: None,
            gl_version: (render.gl_major, render.gl_minor),
            core_profile: render.core_profile,
        })
    }

    fn context(&self) -> Result<egl::Context> {
        self.context
            .ok_or_else(|| GlpsError::egl("make_current", "context not created"))
    }
}

impl GraphicsBackend for EglBackend {
    type NativeWindow = WlEglSurface;
    type Surface = EglSurface;
    type Shared = GlShared;
    type WindowObjects = GlWindowObjects;

    fn create_surface(&mut self, native: &WlEglSurface) -> Result<EglSurface> {
        // SAFETY: the native window stays alive until destroy_surface
        let surface = unsafe {
            self.egl.create_window_surface(
                self.display,
                self.config,
                native.ptr() as egl::NativeWindowType,
                None,
            )
        }
        .map_err(|err| GlpsError::egl("create_window_surface", err))?;

        Ok(EglSurface {
            surface,
            interval_set: Cell::new(false),
        })
    }

    fn destroy_surface(&mut self, surface: EglSurface) {
        if let Err(err) = self.egl.destroy_surface(self.display, surface.surface) {
            warn!("⚠️ eglDestroySurface failed: {}", err);
        }
    }

    fn create_context(&mut self) -> Result<()> {
        let (major, minor) = self.gl_version;
        let profile = if self.core_profile {
            CONTEXT_OPENGL_CORE_PROFILE_BIT
        } else {
            CONTEXT_OPENGL_COMPATIBILITY_PROFILE_BIT
        };
        let attribs = [
            CONTEXT_MAJOR_VERSION,
            major,
            CONTEXT_MINOR_VERSION,
            minor,
            CONTEXT_OPENGL_PROFILE_MASK,
            profile,
            egl::NONE,
        ];
        let context = self
            .egl
            .create_context(self.display, self.config, None, &attribs)
            .map_err(|err| GlpsError::egl("create_context", err))?;

        info!(
            "🖼️ OpenGL {}.{} {} context created",
            major,
            minor,
            if self.core_profile { "core" } else { "compatibility" }
        );
        self.context = Some(context);
        Ok(())
    }

    fn make_current(&mut self, surface: Option<&EglSurface>) -> Result<()> {
        match surface {
            Some(target) => {
                let context = self.context()?;
                self.egl
                    .make_current(
                        self.display,
                        Some(target.surface),
                        Some(target.surface),
                        Some(context),
                    )
                    .map_err(|err| GlpsError::egl("make_current", err))?;

                // frame callbacks pace redraws; a blocking swap would stall the other windows
                if !target.interval_set.replace(true) {
                    if let Err(err) = self.egl.swap_interval(self.display, 0) {
                        debug!("eglSwapInterval(0) rejected: {}", err);
                    }
                }
                Ok(())
            }
            None => self
                .egl
                .make_current(self.display, None, None, None)
                .map_err(|err| GlpsError::egl("make_current", err)),
        }
    }

    fn load_functions(&mut self) -> Result<()> {
        gl::load_with(|name| match self.egl.get_proc_address(name) {
            Some(f) => f as *const c_void,
            None => std::ptr::null(),
        });
        if !gl::Clear::is_loaded() {
            return Err(GlpsError::egl("get_proc_address", "OpenGL entry points missing"));
        }
        Ok(())
    }

    fn setup_shared(&mut self, paths: &ShaderPaths) -> Result<GlShared> {
        let text_vertex = shaders::compile_file(gl::VERTEX_SHADER, &paths.text_vertex)?;
        let text_fragment = shaders::compile_file(gl::FRAGMENT_SHADER, &paths.text_fragment)?;

        let shape_vertex = shaders::compile_file(gl::VERTEX_SHADER, &paths.shape_vertex)?;
        let shape_fragment = shaders::compile_file(gl::FRAGMENT_SHADER, &paths.shape_fragment)?;
        let shape_program = shaders::link("shape", &[shape_vertex, shape_fragment]);

        // SAFETY: a window surface is current
        unsafe {
            gl::DeleteShader(shape_vertex);
            gl::DeleteShader(shape_fragment);
        }
        let shape_program = shape_program?;

        let mut buffers = [0 as GLuint; 2];
        // SAFETY: as above
        unsafe {
            gl::GenBuffers(2, buffers.as_mut_ptr());
        }

        Ok(GlShared {
            shape_program,
            shape_vbo: buffers[0],
            text_vbo: buffers[1],
            text_vertex,
            text_fragment,
        })
    }

    fn setup_window_objects(&mut self, shared: &GlShared) -> Result<GlWindowObjects> {
        let text_program = shaders::link("text", &[shared.text_vertex, shared.text_fragment])?;

        let pos = CString::new("pos").map_err(|err| GlpsError::egl("attrib", err))?;
        let col = CString::new("col").map_err(|err| GlpsError::egl("attrib", err))?;
        let stride = std::mem::size_of::<Vertex>() as GLsizei;

        // SAFETY: a window surface is current; the VAOs reference shared buffers only
        unsafe {
            let mut text_vao = 0;
            gl::GenVertexArrays(1, &mut text_vao);
            gl::BindVertexArray(text_vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, shared.text_vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                (TEXT_QUAD_FLOATS * std::mem::size_of::<f32>()) as GLsizeiptr,
                std::ptr::null(),
                gl::DYNAMIC_DRAW,
            );
            gl::EnableVertexAttribArray(0);
            gl::VertexAttribPointer(
                0,
                4,
                gl::FLOAT,
                gl::FALSE,
                (4 * std::mem::size_of::<f32>()) as GLsizei,
                std::ptr::null(),
            );
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);

            let mut shape_vao = 0;
            gl::GenVertexArrays(1, &mut shape_vao);
            gl::BindVertexArray(shape_vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, shared.shape_vbo);

            let pos_attrib = gl::GetAttribLocation(shared.shape_program, pos.as_ptr());
            if pos_attrib >= 0 {
                gl::EnableVertexAttribArray(pos_attrib as GLuint);
                gl::VertexAttribPointer(
                    pos_attrib as GLuint,
                    2,
                    gl::FLOAT,
                    gl::FALSE,
                    stride,
                    std::ptr::null(),
                );
            }
            let col_attrib = gl::GetAttribLocation(shared.shape_program, col.as_ptr());
            if col_attrib >= 0 {
                gl::EnableVertexAttribArray(col_attrib as GLuint);
                gl::VertexAttribPointer(
                    col_attrib as GLuint,
                    3,
                    gl::FLOAT,
                    gl::FALSE,
                    stride,
                    std::mem::size_of::<[f32; 2]>() as *const c_void,
                );
            }
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);

            debug!("🔧 VAO pair {}/{} ready", text_vao, shape_vao);
            Ok(GlWindowObjects {
                text_program,
                text_vao,
                shape_vao,
            })
        }
    }

    fn release_window_objects(&mut self, objects: GlWindowObjects) {
        // SAFETY: the owning window's surface is current
        unsafe {
            gl::DeleteVertexArrays(1, &objects.text_vao);
            gl::DeleteVertexArrays(1, &objects.shape_vao);
            gl::DeleteProgram(objects.text_program);
        }
    }

    fn begin_frame(&mut self, width: u32, height: u32, clear: [f32; 4]) {
        // SAFETY: the target surface is current
        unsafe {
            gl::Viewport(0, 0, width as GLsizei, height as GLsizei);
        }
        self.clear(clear);
    }

    fn clear(&mut self, color: [f32; 4]) {
        // SAFETY: the target surface is current
        unsafe {
            gl::ClearColor(color[0], color[1], color[2], color[3]);
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
    }

    fn draw_triangles(&mut self, shared: &GlShared, objects: &GlWindowObjects, vertices: &[Vertex]) {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        // SAFETY: the target surface is current; `bytes` outlives BufferData
        unsafe {
            gl::UseProgram(shared.shape_program);
            gl::BindVertexArray(objects.shape_vao);
            gl::BindBuffer(gl::ARRAY_BUFFER, shared.shape_vbo);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                bytes.len() as GLsizeiptr,
                bytes.as_ptr() as *const c_void,
                gl::STREAM_DRAW,
            );
            gl::DrawArrays(gl::TRIANGLES, 0, vertices.len() as GLsizei);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);
        }
    }

    fn swap(&mut self, surface: &EglSurface) -> Result<()> {
        self.egl
            .swap_buffers(self.display, surface.surface)
            .map_err(|err| GlpsError::egl("swap_buffers", err))
    }

    fn release_shared(&mut self, shared: GlShared) {
        // SAFETY: a window surface is current
        unsafe {
            gl::DeleteProgram(shared.shape_program);
            gl::DeleteShader(shared.text_vertex);
            gl::DeleteShader(shared.text_fragment);
            gl::DeleteBuffers(1, &shared.shape_vbo);
            gl::DeleteBuffers(1, &shared.text_vbo);
        }
    }

    fn teardown(&mut self) {
        if let Err(err) = self.egl.make_current(self.display, None, None, None) {
            debug!("Releasing current context failed: {}", err);
        }
        if let Some(context) = self.context.take() {
            if let Err(err) = self.egl.destroy_context(self.display, context) {
                warn!("⚠️ eglDestroyContext failed: {}", err);
            }
        }
        if let Err(err) = self.egl.terminate(self.display) {
            warn!("⚠️ eglTerminate failed: {}", err);
        }
    }
}
