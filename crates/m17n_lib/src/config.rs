use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ibus_utils::{TableOrientation, Underline};
use log::info;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::session::SessionStyle;

pub const CONFIG_FILE_NAME: &str = "config.yml";
const APP_DIR: &str = "ibus-m17n";
const SYSTEM_TABLE_DIR: &str = "/usr/share/ibus-m17n/tables";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("page_size must be positive")]
    InvalidPageSize,
}

/// An RGB color, written either as an integer or as `"#rrggbb"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ColorVisitor;

        impl Visitor<'_> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an RGB integer or a \"#rrggbb\" string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Color, E> {
                if v > 0xffffff {
                    return Err(E::custom(format!("color {:#x} out of range", v)));
                }
                Ok(Color(v as u32))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Color, E> {
                let v = u64::try_from(v).map_err(|_| E::custom("negative color"))?;
                self.visit_u64(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Color, E> {
                let hex = v
                    .strip_prefix('#')
                    .filter(|hex| hex.len() == 6)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))?;
                u32::from_str_radix(hex, 16)
                    .map(Color)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(ColorVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderlineStyle {
    None,
    Single,
    Double,
    Low,
    Error,
}

impl From<UnderlineStyle> for Underline {
    fn from(style: UnderlineStyle) -> Self {
        match style {
            UnderlineStyle::None => Underline::None,
            UnderlineStyle::Single => Underline::Single,
            UnderlineStyle::Double => Underline::Double,
            UnderlineStyle::Low => Underline::Low,
            UnderlineStyle::Error => Underline::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    System,
}

impl From<Orientation> for TableOrientation {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => TableOrientation::Horizontal,
            Orientation::Vertical => TableOrientation::Vertical,
            Orientation::System => TableOrientation::System,
        }
    }
}

/// Presentation keys; every key is optional so engine overrides can be
/// layered on top of the global values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleOverrides {
    #[serde(default)]
    pub preedit_foreground: Option<Color>,
    #[serde(default)]
    pub preedit_background: Option<Color>,
    #[serde(default)]
    pub preedit_underline: Option<UnderlineStyle>,
    #[serde(default)]
    pub lookup_table_orientation: Option<Orientation>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl StyleOverrides {
    fn apply(&self, style: &mut SessionStyle) {
        if let Some(Color(rgb)) = self.preedit_foreground {
            style.preedit_foreground = rgb;
        }
        if let Some(Color(rgb)) = self.preedit_background {
            style.preedit_background = rgb;
        }
        if let Some(underline) = self.preedit_underline {
            style.preedit_underline = underline.into();
        }
        if let Some(orientation) = self.lookup_table_orientation {
            style.orientation = orientation.into();
        }
        if let Some(page_size) = self.page_size {
            style.page_size = page_size;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == Some(0) {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub preedit_foreground: Option<Color>,
    #[serde(default)]
    pub preedit_background: Option<Color>,
    #[serde(default)]
    pub preedit_underline: Option<UnderlineStyle>,
    #[serde(default)]
    pub lookup_table_orientation: Option<Orientation>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub table_dirs: Vec<PathBuf>,
    /// Keyed by engine name, `m17n:<lang>:<name>`.
    #[serde(default)]
    pub engines: HashMap<String, StyleOverrides>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Load `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults; an explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_owned(), true),
            None => match Config::default_path() {
                Some(path) => (path, false),
                None => return Ok(Config::default()),
            },
        };
        if !required && !path.exists() {
            info!("no config file at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        let source = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!("loaded config from {:?}", path);
        Config::parse(&source, &path)
    }

    pub fn parse(source: &str, path: &Path) -> Result<Config, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config =
            serde_yaml_ng::from_str(source).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;
        config.global().validate()?;
        for overrides in config.engines.values() {
            overrides.validate()?;
        }
        Ok(config)
    }

    fn global(&self) -> StyleOverrides {
        StyleOverrides {
            preedit_foreground: self.preedit_foreground,
            preedit_background: self.preedit_background,
            preedit_underline: self.preedit_underline,
            lookup_table_orientation: self.lookup_table_orientation,
            page_size: self.page_size,
        }
    }

    pub fn style_for(&self, engine_name: &str) -> SessionStyle {
        let mut style = SessionStyle::default();
        self.global().apply(&mut style);
        if let Some(overrides) = self.engines.get(engine_name) {
            overrides.apply(&mut style);
        }
        style
    }

    /// Table directories in search order: `extra` first, then the config,
    /// the user data directory and the system directory.
    pub fn table_dirs(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = extra.to_vec();
        dirs.extend(self.table_dirs.iter().cloned());
        if let Some(data) = dirs::data_dir() {
            dirs.push(data.join(APP_DIR).join("tables"));
        }
        dirs.push(PathBuf::from(SYSTEM_TABLE_DIR));
        dirs
    }
}
