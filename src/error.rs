//! Error types for the GLPS backend
//!
//! Setup failures (missing globals, EGL, shaders) are fatal for a running
//! process but are still returned as values so the binary decides how to exit.
//! Capacity and stale-ID errors are recoverable for the caller.

use crate::window::WindowId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GlpsError>;

#[derive(Debug, Error)]
pub enum GlpsError {
    /// A global the backend cannot run without was not advertised.
    #[error("required Wayland global `{0}` is not advertised by the compositor")]
    MissingGlobal(&'static str),

    #[error("window table is full ({capacity} windows)")]
    CapacityExceeded { capacity: usize },

    #[error("no window with id {0}")]
    UnknownWindow(WindowId),

    /// The slot behind this ID was destroyed (and possibly reused).
    #[error("window id {0} refers to a destroyed window")]
    StaleWindow(WindowId),

    #[error("failed to connect to the Wayland display: {0}")]
    Connect(#[from] wayland_client::ConnectError),

    #[error("Wayland dispatch failed: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),

    #[error("failed to enumerate Wayland globals: {0}")]
    Globals(#[from] wayland_client::globals::GlobalError),

    #[error("failed to bind `{interface}`: {source}")]
    Bind {
        interface: &'static str,
        #[source]
        source: wayland_client::globals::BindError,
    },

    #[error("Wayland transport error: {0}")]
    Transport(#[from] wayland_client::backend::WaylandError),

    #[error("EGL {operation} failed: {reason}")]
    Egl {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to create the native EGL window: {0}")]
    EglWindow(#[from] wayland_egl::Error),

    #[error("shader {name}: {log}")]
    Shader { name: String, log: String },

    #[error("failed to read shader source {path}: {source}")]
    ShaderIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("keymap could not be compiled")]
    Keymap,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("the window manager has been shut down")]
    ShutDown,
}

impl GlpsError {
    pub(crate) fn egl(operation: &'static str, reason: impl ToString) -> Self {
        Self::Egl {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Whether the process can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::UnknownWindow(_) | Self::StaleWindow(_)
        )
    }
}
