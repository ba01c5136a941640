//! Window and demo settings, loadable from a TOML file.
//!
//! Every field is optional in the file; missing ones take the defaults below.
//!
//! ```toml
//! title = "Ice prism"
//! width = 1280
//! height = 720
//! demo = "ice-prism"
//! msaa = 4
//! volume = "hsl"
//! volume_size = 64
//! vsync = true
//! background = "assets/dots.png"
//! log_filter = "glassworks=debug"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::demo::Demo;
use crate::error::{Error, Result};
use crate::volume::VolumeKind;

/// Configuration for the app window and the demo it runs.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub title: String,
    /// Logical window width.
    pub width: u32,
    /// Logical window height.
    pub height: u32,
    pub demo: Demo,
    /// MSAA sample count for the color passes: 1 or 4.
    pub msaa: u32,
    pub volume: VolumeKind,
    /// Edge length of the cubic volume texture.
    pub volume_size: u32,
    pub vsync: bool,
    /// Equirectangular environment image; a generated dot grid when unset.
    pub background: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Glassworks".to_string(),
            width: 800,
            height: 600,
            demo: Demo::default(),
            msaa: 4,
            volume: VolumeKind::default(),
            volume_size: 128,
            vsync: true,
            background: None,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no backend can honor.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !matches!(self.msaa, 1 | 4) {
            return Err(Error::Config(format!(
                "msaa must be 1 or 4, got {}",
                self.msaa
            )));
        }
        if !(2..=256).contains(&self.volume_size) {
            return Err(Error::Config(format!(
                "volume_size must be between 2 and 256, got {}",
                self.volume_size
            )));
        }
        Ok(())
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn demo(mut self, demo: Demo) -> Self {
        self.demo = demo;
        self
    }

    pub fn msaa(mut self, samples: u32) -> Self {
        self.msaa = samples;
        self
    }

    pub fn background(mut self, path: impl Into<PathBuf>) -> Self {
        self.background = Some(path.into());
        self
    }
}

/// Parse a `WIDTHxHEIGHT` size such as `1280x720`.
pub fn parse_size(text: &str) -> std::result::Result<(u32, u32), String> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid size '{text}': {e}"))
    };
    Ok((parse(width)?, parse(height)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = AppConfig::from_toml_str(
            r#"
            width = 1280
            height = 720
            demo = "ice-cube"
            volume = "hsl"
            background = "env.png"
            "#,
        )
        .unwrap();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.demo, Demo::IceCube);
        assert_eq!(config.volume, VolumeKind::Hsl);
        assert_eq!(config.background, Some(PathBuf::from("env.png")));
        assert_eq!(config.msaa, 4);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for text in ["msaa = 2", "width = 0", "volume_size = 1024", "demo = \"teapot\"", "colour = 1"] {
            assert!(
                matches!(AppConfig::from_toml_str(text), Err(Error::Config(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title = \"Prism\"\nvsync = false").unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.title, "Prism");
        assert!(!config.vsync);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn builder_methods() {
        let config = AppConfig::new().title("T").size(10, 20).demo(Demo::IceCube).msaa(1);
        assert_eq!(config.title, "T");
        assert_eq!((config.width, config.height), (10, 20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("800X600"), Ok((800, 600)));
        assert!(parse_size("800").is_err());
        assert!(parse_size("axb").is_err());
    }
}
