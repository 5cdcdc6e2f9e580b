//! GLSL compile and link helpers
//!
//! All functions require a current OpenGL context with loaded entry points.

use crate::error::{GlpsError, Result};
use gl::types::{GLchar, GLenum, GLint, GLuint};
use log::debug;
use std::ffi::CString;
use std::fs;
use std::path::Path;

const INFO_LOG_LEN: usize = 512;

fn read_source(path: &Path) -> Result<CString> {
    let source = fs::read_to_string(path).map_err(|source| GlpsError::ShaderIo {
        path: path.display().to_string(),
        source,
    })?;
    CString::new(source).map_err(|_| GlpsError::Shader {
        name: path.display().to_string(),
        log: "source contains a NUL byte".to_string(),
    })
}

/// Compiles one shader stage from a source file.
pub fn compile_file(kind: GLenum, path: &Path) -> Result<GLuint> {
    let source = read_source(path)?;
    let name = path.display().to_string();

    // SAFETY: a context is current; `source` outlives the ShaderSource call
    unsafe {
        let shader = gl::CreateShader(kind);
        gl::ShaderSource(shader, 1, &source.as_ptr(), std::ptr::null());
        gl::CompileShader(shader);

        let mut success: GLint = 0;
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut success);
        if success == 0 {
            let log = shader_log(shader);
            gl::DeleteShader(shader);
            return Err(GlpsError::Shader { name, log });
        }

        debug!("🔧 Compiled shader {}", name);
        Ok(shader)
    }
}

/// Links `shaders` into a new program. The shaders stay owned by the caller.
pub fn link(name: &str, shaders: &[GLuint]) -> Result<GLuint> {
    // SAFETY: a context is current and every id names a compiled shader
    unsafe {
        let program = gl::CreateProgram();
        for shader in shaders {
            gl::AttachShader(program, *shader);
        }
        gl::LinkProgram(program);

        let mut success: GLint = 0;
        gl::GetProgramiv(program, gl::LINK_STATUS, &mut success);
        if success == 0 {
            let log = program_log(program);
            gl::DeleteProgram(program);
            return Err(GlpsError::Shader {
                name: name.to_string(),
                log,
            });
        }

        for shader in shaders {
            gl::DetachShader(program, *shader);
        }
        Ok(program)
    }
}

unsafe fn shader_log(shader: GLuint) -> String {
    let mut buffer = vec![0u8; INFO_LOG_LEN];
    let mut written: GLint = 0;
    gl::GetShaderInfoLog(
        shader,
        INFO_LOG_LEN as GLint,
        &mut written,
        buffer.as_mut_ptr() as *mut GLchar,
    );
    buffer.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buffer).into_owned()
}

unsafe fn program_log(program: GLuint) -> String {
    let mut buffer = vec![0u8; INFO_LOG_LEN];
    let mut written: GLint = 0;
    gl::GetProgramInfoLog(
        program,
        INFO_LOG_LEN as GLint,
        &mut written,
        buffer.as_mut_ptr() as *mut GLchar,
    );
    buffer.truncate(written.max(0) as usize);
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_source_reports_path() {
        let err = read_source(Path::new("/nonexistent/shape_vertex.glsl")).unwrap_err();
        assert!(matches!(err, GlpsError::ShaderIo { .. }));
        assert!(err.to_string().contains("/nonexistent/shape_vertex.glsl"));
    }

    #[test]
    fn test_source_with_nul_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"void main() {}\0").unwrap();
        let err = read_source(file.path()).unwrap_err();
        assert!(matches!(err, GlpsError::Shader { .. }));
    }

    #[test]
    fn test_bundled_shaders_are_readable() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let paths = crate::config::ShaderPaths::default();
        for path in [
            &paths.text_vertex,
            &paths.text_fragment,
            &paths.shape_vertex,
            &paths.shape_fragment,
        ] {
            let source = read_source(&root.join(path)).unwrap();
            assert!(source.to_bytes().starts_with(b"#version"));
        }
    }
}
