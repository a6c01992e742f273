use std::{collections::HashMap, env, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
        }
    }
}

/// Loads settings from `server.toml` (if present) with environment-variable
/// overrides. Nothing about the generated images is configurable; the visual
/// parameters are a fixed contract.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("bind_addr") {
            settings.server_bind = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_is_loopback() {
        assert_eq!(Settings::default().server_bind, "127.0.0.1:8080");
    }

    #[test]
    fn file_override_applies() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "bind_addr = \"0.0.0.0:9000\"\n");
        assert_eq!(settings.server_bind, "0.0.0.0:9000");
    }

    #[test]
    fn malformed_file_is_ignored() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "bind_addr = [not toml");
        assert_eq!(settings.server_bind, Settings::default().server_bind);
    }
}
