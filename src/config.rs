use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::warn;

use crate::sync::SyncMode;

pub const MIN_WIDTH: u16 = 300;
pub const MAX_WIDTH: u16 = 600;

/// Every key of the string-keyed configuration surface.
pub const KEYS: [&str; 7] = [
    "preview-width",
    "preview-sync",
    "preview-font-size",
    "preview-confirm-external-links",
    "preview-lazy-images",
    "preview-debounce-ms",
    "preview-settle-ms",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// One configuration layer (file, local override or command line).
///
/// Unset keys fall through to the next layer in [`ConfigFlags::union`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub width: Option<u16>,
    pub sync: Option<SyncMode>,
    pub font_size: Option<u16>,
    pub confirm_external_links: Option<bool>,
    pub lazy_images: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub settle_ms: Option<u64>,
}

impl ConfigFlags {
    /// Merge two layers; values set in `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            width: other.width.or(self.width),
            sync: other.sync.or(self.sync),
            font_size: other.font_size.or(self.font_size),
            confirm_external_links: other
                .confirm_external_links
                .or(self.confirm_external_links),
            lazy_images: other.lazy_images.or(self.lazy_images),
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            settle_ms: other.settle_ms.or(self.settle_ms),
        }
    }

    /// Read a key as a string. `Ok(None)` means the key is unset in this layer.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownKey`] for keys outside [`KEYS`].
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(match key {
            "preview-width" => self.width.map(|v| v.to_string()),
            "preview-sync" => self.sync.map(|v| v.to_string()),
            "preview-font-size" => self.font_size.map(|v| v.to_string()),
            "preview-confirm-external-links" => {
                self.confirm_external_links.map(|v| v.to_string())
            }
            "preview-lazy-images" => self.lazy_images.map(|v| v.to_string()),
            "preview-debounce-ms" => self.debounce_ms.map(|v| v.to_string()),
            "preview-settle-ms" => self.settle_ms.map(|v| v.to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        })
    }

    /// Set a key from its string form.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for unknown keys or values that do not parse
    /// or fall outside the key's range.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |expected| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };
        match key {
            "preview-width" => {
                let width = value
                    .parse::<u16>()
                    .ok()
                    .filter(|w| (MIN_WIDTH..=MAX_WIDTH).contains(w))
                    .ok_or_else(|| invalid("an integer in 300..=600"))?;
                self.width = Some(width);
            }
            "preview-sync" => {
                self.sync = Some(value.parse().map_err(|()| {
                    invalid("source-driven, preview-driven, independent or bidirectional")
                })?);
            }
            "preview-font-size" => {
                let size = value
                    .parse::<u16>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| invalid("a positive integer"))?;
                self.font_size = Some(size);
            }
            "preview-confirm-external-links" => {
                self.confirm_external_links =
                    Some(parse_bool(value).ok_or_else(|| invalid("true or false"))?);
            }
            "preview-lazy-images" => {
                self.lazy_images = Some(parse_bool(value).ok_or_else(|| invalid("true or false"))?);
            }
            "preview-debounce-ms" => {
                self.debounce_ms = Some(value.parse().map_err(|_| invalid("milliseconds"))?);
            }
            "preview-settle-ms" => {
                self.settle_ms = Some(value.parse().map_err(|_| invalid("milliseconds"))?);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Fill unset keys with defaults.
    pub fn resolve(&self) -> PreviewConfig {
        let defaults = PreviewConfig::default();
        PreviewConfig {
            width: self.width.unwrap_or(defaults.width),
            sync: self.sync.unwrap_or(defaults.sync),
            font_size: self.font_size.unwrap_or(defaults.font_size),
            confirm_external_links: self
                .confirm_external_links
                .unwrap_or(defaults.confirm_external_links),
            lazy_images: self.lazy_images.unwrap_or(defaults.lazy_images),
            debounce_ms: self.debounce_ms.unwrap_or(defaults.debounce_ms),
            settle_ms: self.settle_ms.unwrap_or(defaults.settle_ms),
        }
    }
}

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewConfig {
    pub width: u16,
    pub sync: SyncMode,
    /// Base font size in px; zoom is relative to it.
    pub font_size: u16,
    pub confirm_external_links: bool,
    pub lazy_images: bool,
    pub debounce_ms: u64,
    pub settle_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 400,
            sync: SyncMode::SourceDriven,
            font_size: 16,
            confirm_external_links: true,
            lazy_images: true,
            debounce_ms: 50,
            settle_ms: 50,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn is_bool_key(key: &str) -> bool {
    matches!(
        key,
        "preview-confirm-external-links" | "preview-lazy-images"
    )
}

/// Directory holding the global config and the persisted session.
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("marksync");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("marksync");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("marksync");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("marksync");
        }
    }

    PathBuf::from(".marksync")
}

pub fn global_config_path() -> PathBuf {
    config_dir().join("config")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".marksyncrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# marksync defaults (saved with --save)".to_string());
    for key in KEYS {
        if let Ok(Some(value)) = flags.get(key) {
            lines.push(format!("--{key} {value}"));
        }
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract config flags from command-line style tokens.
///
/// Accepts `--key value` and `--key=value`; boolean keys may appear bare.
/// Tokens that are not config keys are skipped, invalid values are logged
/// and skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let Some(body) = tokens[i].strip_prefix("--") else {
            i += 1;
            continue;
        };
        let (key, value) = match body.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None if !KEYS.contains(&body) => {
                i += 1;
                continue;
            }
            None if is_bool_key(body) => match tokens.get(i + 1) {
                Some(next) if parse_bool(next).is_some() => {
                    i += 1;
                    (body, Some(next.clone()))
                }
                _ => (body, Some("true".to_string())),
            },
            None => {
                i += 1;
                (body, tokens.get(i).cloned())
            }
        };
        if KEYS.contains(&key) {
            match value {
                Some(value) => {
                    if let Err(err) = flags.set(key, &value) {
                        warn!(%err, "skipping config flag");
                    }
                }
                None => warn!(key, "config flag is missing its value"),
            }
        }
        i += 1;
    }
    flags
}
