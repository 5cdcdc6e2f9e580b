//! Unit tests for configuration module
//!
//! Tests parsing, validation and file round-trips.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = GlpsConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.window.capacity, DEFAULT_CAPACITY);
    assert_eq!((config.render.gl_major, config.render.gl_minor), (4, 5));
    assert!(!config.debug.enable_fps_counter);
    assert_eq!(
        config.input.preferred_mime_types.first().map(String::as_str),
        Some(mime_types::TEXT_PLAIN_UTF8)
    );
}

#[test]
fn test_empty_file_uses_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("empty.toml");
    fs::write(&file_path, "")?;

    let config = GlpsConfig::load(&file_path)?;
    assert_eq!(config, GlpsConfig::default());

    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("glps.toml");

    let test_config = r#"
[window]
default_title = "Editor"
default_width = 1024
default_height = 768
capacity = 8

[render]
gl_major = 3
gl_minor = 3
core_profile = false
clear_color = [0.0, 0.0, 0.0, 1.0]

[render.shaders]
text_vertex = "/opt/glps/text.vert"
text_fragment = "/opt/glps/text.frag"
shape_vertex = "/opt/glps/shape.vert"
shape_fragment = "/opt/glps/shape.frag"

[input]
preferred_mime_types = ["text/uri-list"]

[general]
font_path = "/tmp/font.ttf"

[debug]
enable_fps_counter = true
"#;

    fs::write(&file_path, test_config)?;

    let config = GlpsConfig::load(&file_path)?;

    assert_eq!(config.window.default_title, "Editor");
    assert_eq!(config.window.capacity, 8);
    assert_eq!(config.window.app_id, "org.glps.app");
    assert_eq!(config.render.gl_major, 3);
    assert!(!config.render.core_profile);
    assert_eq!(
        config.render.shaders.shape_fragment,
        PathBuf::from("/opt/glps/shape.frag")
    );
    assert_eq!(config.input.preferred_mime_types, vec!["text/uri-list"]);
    assert_eq!(config.general.font_path, "/tmp/font.ttf");
    assert!(config.debug.enable_fps_counter);

    let props = config.window.default_properties();
    assert_eq!((props.width, props.height), (1024, 768));

    Ok(())
}

#[test]
fn test_invalid_values_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("bad.toml");

    fs::write(
        &file_path,
        r#"
[window]
default_title = "x"
default_width = 640
default_height = 480
capacity = 0
"#,
    )?;
    assert!(GlpsConfig::load(&file_path).is_err());

    let mut config = GlpsConfig::default();
    config.render.clear_color = [1.5, 0.0, 0.0, 1.0];
    assert!(config.validate().is_err());

    let mut config = GlpsConfig::default();
    config.window.default_height = 0;
    assert!(config.validate().is_err());

    let mut config = GlpsConfig::default();
    config.input.preferred_mime_types.push(String::new());
    assert!(config.validate().is_err());

    Ok(())
}

#[test]
fn test_malformed_toml_reports_error() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("broken.toml");
    fs::write(&file_path, "[window\ncapacity = ")?;

    let err = GlpsConfig::load(&file_path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));

    Ok(())
}

#[test]
fn test_missing_file_reports_path() {
    let err = GlpsConfig::load("/nonexistent/glps/config.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/glps/config.toml"));
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = GlpsConfig::default();
    config.window.capacity = 3;
    config.debug.enable_fps_counter = true;
    config.save(&file_path)?;

    let reloaded = GlpsConfig::load(&file_path)?;
    assert_eq!(reloaded, config);

    Ok(())
}

#[test]
fn test_home_expansion() -> Result<()> {
    if let Ok(home) = std::env::var("HOME") {
        let expanded = expand_home(Path::new("~/.config/glps/glps.toml"))?;
        assert_eq!(expanded, Path::new(&home).join(".config/glps/glps.toml"));
    }

    let untouched = expand_home(Path::new("/etc/glps.toml"))?;
    assert_eq!(untouched, PathBuf::from("/etc/glps.toml"));

    Ok(())
}
