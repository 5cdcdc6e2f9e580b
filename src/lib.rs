//! # GLPS Wayland backend
//!
//! Client-side windowing for GUI toolkits: xdg toplevel windows on a Wayland
//! compositor, all rendered through one shared EGL/OpenGL context, with input
//! coalesced per device frame and delivered through callbacks.
//!
//! ## Architecture
//!
//! - `wayland`: connection, protocol dispatch and the public [`WindowManager`]
//! - `manager`: window lifecycle core shared by the backend and the tests
//! - `window`: generational window table and reverse surface lookup
//! - `renderer`: graphics seam, EGL backend and a headless backend
//! - `frame`: one outstanding frame callback per window, FPS counting
//! - `input`: pointer, touch and keyboard accumulators
//! - `data_transfer`: clipboard and drag-and-drop bookkeeping
//! - `protocol`: global census and seat capabilities
//! - `config`: TOML configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use glps::{GlpsConfig, WindowManager, WindowProperties};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = GlpsConfig::default();
//!     let mut manager = WindowManager::connect(&config)?;
//!     manager
//!         .callbacks()
//!         .on_window_close(|id| println!("window {} closed", id));
//!     manager.create_window(WindowProperties::new("hello", 640, 480))?;
//!     manager.run()?;
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod data_transfer;
pub mod error;
pub mod frame;
pub mod input;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod renderer;
pub mod wayland;
pub mod window;

pub use callbacks::Callbacks;
pub use config::GlpsConfig;
pub use data_transfer::TransferPayload;
pub use error::{GlpsError, Result};
pub use input::{ButtonState, KeyEvent, MouseButton, ScrollEvent, TouchEvent};
pub use manager::WindowSystem;
pub use renderer::{Canvas, Vertex, DEMO_QUAD};
pub use wayland::WindowManager;
pub use window::{WindowId, WindowProperties};

/// Version information for GLPS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
