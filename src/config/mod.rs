//! Configuration management for GLPS
//!
//! Settings are read from a TOML file. Every section is optional and falls
//! back to its defaults, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data_transfer::mime_types;
use crate::window::{WindowProperties, DEFAULT_CAPACITY, MAX_TITLE_LEN};

/// Main configuration struct containing all GLPS settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GlpsConfig {
    /// Window defaults and table size
    #[serde(default)]
    pub window: WindowConfig,

    /// EGL/OpenGL context and shader settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Input and data transfer preferences
    #[serde(default)]
    pub input: InputConfig,

    /// Settings shared by every window
    #[serde(default)]
    pub general: GeneralConfig,

    /// Debug helpers
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    /// Title used when the caller does not supply one
    pub default_title: String,

    pub default_width: u32,

    pub default_height: u32,

    /// Maximum number of simultaneously open windows
    pub capacity: usize,

    /// xdg_toplevel app id
    #[serde(default = "WindowConfig::default_app_id")]
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Requested OpenGL major version
    pub gl_major: i32,

    /// Requested OpenGL minor version
    pub gl_minor: i32,

    /// Request a core profile context
    pub core_profile: bool,

    /// RGBA clear color applied at the start of every frame
    pub clear_color: [f32; 4],

    /// GLSL sources compiled once for all windows
    #[serde(default)]
    pub shaders: ShaderPaths,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShaderPaths {
    pub text_vertex: PathBuf,
    pub text_fragment: PathBuf,
    pub shape_vertex: PathBuf,
    pub shape_fragment: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Mime types accepted from drag-and-drop and clipboard offers, best first
    pub preferred_mime_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Font used by the text renderer of every window
    pub font_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DebugConfig {
    /// Log per-window FPS once per second
    pub enable_fps_counter: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_title: "GLPS Window".to_string(),
            default_width: 640,
            default_height: 480,
            capacity: DEFAULT_CAPACITY,
            app_id: Self::default_app_id(),
        }
    }
}

impl WindowConfig {
    fn default_app_id() -> String {
        "org.glps.app".to_string()
    }

    /// Window properties built from the configured defaults
    pub fn default_properties(&self) -> WindowProperties {
        WindowProperties::new(
            self.default_title.clone(),
            self.default_width,
            self.default_height,
        )
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gl_major: 4,
            gl_minor: 5,
            core_profile: true,
            clear_color: [0.2, 0.3, 0.3, 1.0],
            shaders: ShaderPaths::default(),
        }
    }
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            text_vertex: PathBuf::from("shaders/text/text_vertex.glsl"),
            text_fragment: PathBuf::from("shaders/text/text_fragment.glsl"),
            shape_vertex: PathBuf::from("shaders/shape/shape_vertex.glsl"),
            shape_fragment: PathBuf::from("shaders/shape/shape_fragment.glsl"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            preferred_mime_types: vec![
                mime_types::TEXT_PLAIN_UTF8.to_string(),
                mime_types::TEXT_PLAIN.to_string(),
                mime_types::TEXT_URI_LIST.to_string(),
            ],
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            font_path: "/usr/share/fonts/TTF/DejaVuSans.ttf".to_string(),
        }
    }
}

/// Expands a leading `~` to `$HOME`.
fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };
    let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
    Ok(Path::new(&home).join(rest))
}

impl GlpsConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: GlpsConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.window.capacity == 0 {
            anyhow::bail!("Invalid window capacity: must be at least 1");
        }

        if self.window.default_width == 0 || self.window.default_height == 0 {
            anyhow::bail!(
                "Invalid default window size {}x{}: both sides must be non-zero",
                self.window.default_width,
                self.window.default_height
            );
        }

        if self.window.default_title.len() > MAX_TITLE_LEN {
            anyhow::bail!("Invalid default title: longer than {} bytes", MAX_TITLE_LEN);
        }

        if self.render.gl_major < 2 {
            anyhow::bail!("Invalid GL version {}.{}", self.render.gl_major, self.render.gl_minor);
        }

        if self.render.gl_minor < 0 {
            anyhow::bail!("Invalid GL minor version {}", self.render.gl_minor);
        }

        if self
            .render
            .clear_color
            .iter()
            .any(|c| !(0.0..=1.0).contains(c))
        {
            anyhow::bail!("Invalid clear color: components must be between 0.0 and 1.0");
        }

        if self.input.preferred_mime_types.iter().any(|m| m.is_empty()) {
            anyhow::bail!("Invalid preferred mime type: empty string");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod property_tests;
