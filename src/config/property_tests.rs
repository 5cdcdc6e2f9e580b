//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! validation invariants and TOML round-trips.

use super::*;
use proptest::prelude::*;

prop_compose! {
    fn valid_window_config()(
        default_title in "[A-Za-z0-9 ]{1,40}",
        default_width in 1u32..8192u32,
        default_height in 1u32..8192u32,
        capacity in 1usize..512usize,
    ) -> WindowConfig {
        WindowConfig {
            default_title,
            default_width,
            default_height,
            capacity,
            app_id: "org.glps.test".to_string(),
        }
    }
}

prop_compose! {
    fn valid_render_config()(
        gl_major in 2i32..5i32,
        gl_minor in 0i32..7i32,
        core_profile in any::<bool>(),
        r in 0.0f32..=1.0f32,
        g in 0.0f32..=1.0f32,
        b in 0.0f32..=1.0f32,
    ) -> RenderConfig {
        RenderConfig {
            gl_major,
            gl_minor,
            core_profile,
            clear_color: [r, g, b, 1.0],
            shaders: ShaderPaths::default(),
        }
    }
}

prop_compose! {
    fn valid_config()(
        window in valid_window_config(),
        render in valid_render_config(),
        enable_fps_counter in any::<bool>(),
        mimes in proptest::collection::vec("[a-z]{1,8}/[a-z0-9.+-]{1,12}", 0..4),
    ) -> GlpsConfig {
        GlpsConfig {
            window,
            render,
            input: InputConfig { preferred_mime_types: mimes },
            general: GeneralConfig::default(),
            debug: DebugConfig { enable_fps_counter },
        }
    }
}

proptest! {
    #[test]
    fn prop_valid_configs_pass_validation(config in valid_config()) {
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn prop_toml_roundtrip_preserves_config(config in valid_config()) {
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: GlpsConfig = toml::from_str(&text).unwrap();
        prop_assert_eq!(parsed, config);
    }

    #[test]
    fn prop_out_of_range_clear_color_rejected(
        config in valid_config(),
        bad in prop_oneof![-10.0f32..-0.01f32, 1.01f32..10.0f32],
        channel in 0usize..4usize,
    ) {
        let mut config = config;
        config.render.clear_color[channel] = bad;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn prop_zero_capacity_rejected(config in valid_config()) {
        let mut config = config;
        config.window.capacity = 0;
        prop_assert!(config.validate().is_err());
    }
}
