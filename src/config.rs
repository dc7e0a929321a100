//! Interface configuration and user config file loading.
//!
//! Settings are resolved in layers, lowest first:
//! - built-in defaults ([`InterfaceConfig::default`])
//! - backend defaults (e.g. `echo://` turns on `convert_eol`)
//! - URI query parameters (`?rows=30&convertEol=1`)
//! - a caller-supplied [`ConfigPatch`], usually loaded from `~/.vtty/config.toml`
//!
//! # Configuration File
//!
//! ```toml
//! rows = 30
//! cols = 100
//! title = "vtty"
//! convert_eol = true
//! auto_shutdown = true
//! scrollback_size = 5000
//! buffer_uri = "line://"
//!
//! [extra]
//! local_echo = "0"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, VttyError};
use crate::uri::ParsedUri;

pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_SCROLLBACK: usize = 10_000;
pub const DEFAULT_BUFFER_URI: &str = "terminal://";

/// Fully resolved settings for one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Geometry used until the first client attaches
    pub rows: u16,
    pub cols: u16,
    pub title: String,
    /// Turn a bare `\n` into `\r\n` on the way to clients
    pub convert_eol: bool,
    /// Shut down when the last client detaches
    pub auto_shutdown: bool,
    pub scrollback_size: usize,
    /// Scheme selecting the scroll-back buffer
    pub buffer_uri: String,
    /// Unrecognised parameters, passed through to the backend
    pub extra: BTreeMap<String, String>,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            title: String::new(),
            convert_eol: false,
            auto_shutdown: true,
            scrollback_size: DEFAULT_SCROLLBACK,
            buffer_uri: DEFAULT_BUFFER_URI.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl InterfaceConfig {
    /// Resolve the full layer stack for `uri`
    pub fn resolve(backend: &ConfigPatch, uri: &ParsedUri, overrides: &ConfigPatch) -> Result<Self> {
        let mut config = Self::default();
        config.apply(backend);
        config.apply(&ConfigPatch::from_uri(uri)?);
        config.apply(overrides);
        Ok(config)
    }

    /// Overlay every field `patch` sets
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(rows) = patch.rows {
            self.rows = rows.max(1);
        }
        if let Some(cols) = patch.cols {
            self.cols = cols.max(1);
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(convert_eol) = patch.convert_eol {
            self.convert_eol = convert_eol;
        }
        if let Some(auto_shutdown) = patch.auto_shutdown {
            self.auto_shutdown = auto_shutdown;
        }
        if let Some(size) = patch.scrollback_size {
            self.scrollback_size = size;
        }
        if let Some(buffer) = &patch.buffer_uri {
            self.buffer_uri = buffer.clone();
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Boolean extra parameter, `default` when absent or unparsable
    pub fn extra_flag(&self, key: &str, default: bool) -> bool {
        self.extra
            .get(key)
            .and_then(|v| parse_bool(v))
            .unwrap_or(default)
    }
}

/// A partial configuration; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub rows: Option<u16>,
    pub cols: Option<u16>,
    pub title: Option<String>,
    pub convert_eol: Option<bool>,
    pub auto_shutdown: Option<bool>,
    pub scrollback_size: Option<usize>,
    pub buffer_uri: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl ConfigPatch {
    /// Settings carried in a URI's query string
    pub fn from_uri(uri: &ParsedUri) -> Result<Self> {
        let mut patch = Self::default();
        for (key, value) in &uri.query {
            match key.as_str() {
                "rows" => set_once(&mut patch.rows, positive(uri, key, value)?),
                "cols" => set_once(&mut patch.cols, positive(uri, key, value)?),
                "scrollback_size" => set_once(&mut patch.scrollback_size, positive(uri, key, value)?),
                "title" => set_once(&mut patch.title, value.clone()),
                "buffer" => set_once(&mut patch.buffer_uri, value.clone()),
                "convertEol" | "convert_eol" => set_once(&mut patch.convert_eol, flag(uri, key, value)?),
                "auto_shutdown" => set_once(&mut patch.auto_shutdown, flag(uri, key, value)?),
                _ => {
                    patch.extra.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        Ok(patch)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| VttyError::Config(e.to_string()))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The user's config file, or an empty patch when there is none
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_file(&path) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn with_rows(mut self, rows: u16) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_cols(mut self, cols: u16) -> Self {
        self.cols = Some(cols);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_convert_eol(mut self, convert_eol: bool) -> Self {
        self.convert_eol = Some(convert_eol);
        self
    }

    pub fn with_auto_shutdown(mut self, auto_shutdown: bool) -> Self {
        self.auto_shutdown = Some(auto_shutdown);
        self
    }

    pub fn with_scrollback_size(mut self, size: usize) -> Self {
        self.scrollback_size = Some(size);
        self
    }

    pub fn with_buffer(mut self, buffer_uri: impl Into<String>) -> Self {
        self.buffer_uri = Some(buffer_uri.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn positive<T>(uri: &ParsedUri, key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(VttyError::malformed(
            &uri.raw,
            format!("{} must be a positive integer, got {:?}", key, value),
        )),
    }
}

fn flag(uri: &ParsedUri, key: &str, value: &str) -> Result<bool> {
    parse_bool(value).ok_or_else(|| {
        VttyError::malformed(&uri.raw, format!("{} must be a boolean, got {:?}", key, value))
    })
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `~/.vtty`, created on demand
pub fn config_dir() -> Option<PathBuf> {
    let dir = home_dir()?.join(".vtty");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

pub fn log_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("vtty.log"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(text: &str) -> ParsedUri {
        ParsedUri::parse(text).unwrap()
    }

    #[test]
    fn test_layering_order() {
        let backend = ConfigPatch::default().with_convert_eol(true).with_rows(10);
        let overrides = ConfigPatch::default().with_rows(40);
        let config = InterfaceConfig::resolve(
            &backend,
            &uri("echo://?rows=20&cols=100&convertEol=off&shell=zsh&shell=bash"),
            &overrides,
        )
        .unwrap();

        assert_eq!(config.rows, 40);
        assert_eq!(config.cols, 100);
        assert!(!config.convert_eol);
        assert!(config.auto_shutdown);
        assert_eq!(config.buffer_uri, DEFAULT_BUFFER_URI);
        assert_eq!(config.extra.get("shell").map(String::as_str), Some("zsh"));
    }

    #[test]
    fn test_invalid_query_values() {
        for bad in ["echo://?rows=0", "echo://?cols=-3", "echo://?auto_shutdown=maybe", "echo://?scrollback_size=x"] {
            assert!(matches!(
                ConfigPatch::from_uri(&uri(bad)),
                Err(VttyError::MalformedUri { .. })
            ));
        }
    }

    #[test]
    fn test_toml_patch() {
        let patch = ConfigPatch::from_toml_str(
            "rows = 30\nbuffer_uri = \"raw://\"\n[extra]\nlocal_echo = \"0\"\n",
        )
        .unwrap();
        let mut config = InterfaceConfig::default();
        config.apply(&patch);

        assert_eq!(config.rows, 30);
        assert_eq!(config.cols, DEFAULT_COLS);
        assert_eq!(config.buffer_uri, "raw://");
        assert!(!config.extra_flag("local_echo", true));
        assert!(config.extra_flag("missing", true));

        assert!(matches!(
            ConfigPatch::from_toml_str("rows = \"many\""),
            Err(VttyError::Config(_))
        ));
    }
}
