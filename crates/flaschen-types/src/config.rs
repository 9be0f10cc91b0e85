use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{raster::ImageOptions, FlaschenError, Result};

pub const DEFAULT_PORT: u16 = 1337;
pub const DEFAULT_PLAYER_LAYER: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_display_layer")]
    pub layer: i32,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
}

impl DisplayConfig {
    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            width: self.width,
            height: self.height,
            layer: self.layer,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_player_layer")]
    pub layer: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            width: ImageOptions::DEFAULT_WIDTH,
            height: ImageOptions::DEFAULT_HEIGHT,
            layer: DEFAULT_PLAYER_LAYER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub capture_dir: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            capture_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaschenConfig {
    pub display: DisplayConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_width() -> u32 {
    ImageOptions::DEFAULT_WIDTH
}

fn default_height() -> u32 {
    ImageOptions::DEFAULT_HEIGHT
}

fn default_display_layer() -> i32 {
    ImageOptions::DEFAULT_LAYER
}

fn default_player_layer() -> i32 {
    DEFAULT_PLAYER_LAYER
}

impl FlaschenConfig {
    /// Configuration pointing at a display on `host` with every other value defaulted.
    pub fn for_host(host: impl Into<String>) -> Self {
        let defaults = ImageOptions::default();
        Self {
            display: DisplayConfig {
                host: host.into(),
                port: DEFAULT_PORT,
                width: defaults.width,
                height: defaults.height,
                layer: defaults.layer,
                offset_x: defaults.offset_x,
                offset_y: defaults.offset_y,
            },
            player: PlayerConfig::default(),
            ops: OpsConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            FlaschenError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            FlaschenError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.display.host.trim().is_empty() {
            return Err(FlaschenError::Configuration(
                "display.host must not be empty".into(),
            ));
        }
        if self.display.port == 0 {
            return Err(FlaschenError::Configuration(
                "display.port must be a valid port (>0)".into(),
            ));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(FlaschenError::Configuration(
                "display.width and display.height must be greater than zero".into(),
            ));
        }
        if self.player.width == 0 || self.player.height == 0 {
            return Err(FlaschenError::Configuration(
                "player.width and player.height must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_flaschen_config_from_file() {
        let temp_path = std::env::temp_dir().join("flaschen-config-test.toml");
        let mut config = FlaschenConfig::for_host("ft.local");
        config.display.port = 1400;
        config.player.width = 45;
        config.ops.capture_dir = Some("captures".into());

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = FlaschenConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.display.host, "ft.local");
        assert_eq!(loaded.display.port, 1400);
        assert_eq!(loaded.player.width, 45);
        assert_eq!(loaded.ops.capture_dir.as_deref(), Some("captures"));
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: FlaschenConfig =
            toml::from_str("[display]\nhost = \"10.0.0.7\"\n").expect("parse minimal config");
        assert_eq!(config.display.port, DEFAULT_PORT);
        assert_eq!(config.display.image_options(), ImageOptions::default());
        assert_eq!(config.player.layer, DEFAULT_PLAYER_LAYER);
        assert_eq!(config.ops.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = FlaschenConfig::for_host("");
        assert!(config.validate().is_err());
        config.display.host = "localhost".into();
        config.display.port = 0;
        assert!(config.validate().is_err());
        config.display.port = DEFAULT_PORT;
        config.display.width = 0;
        assert!(config.validate().is_err());
        config.display.width = 32;
        config.player.height = 0;
        assert!(config.validate().is_err());
        config.player.height = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unreadable_file_is_configuration_error() {
        let missing = std::env::temp_dir().join("flaschen-config-missing.toml");
        assert!(matches!(
            FlaschenConfig::from_file(missing),
            Err(FlaschenError::Configuration(_))
        ));
    }
}
