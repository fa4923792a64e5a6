//! Reads the monitor settings and alert list from TOML.
//!
//! `run` and `config validate` both go through [`ConfigLoader::load`]. An
//! explicit `--config` path must exist; the XDG location may be absent, in
//! which case the monitor starts with no alerts and default `[monitor]` values.

use std::fs;
use std::path::Path;

use crate::config::error::ConfigError;
use crate::config::schema::Config;
use crate::config::xdg;

/// Entry points for reading a [`Config`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the file given with `--config`.
    ///
    /// A missing file is [`ConfigError::NotFound`]; a file that exists but
    /// cannot be read is [`ConfigError::ReadError`]. Alerts are only parsed
    /// here, their events and intervals are checked when bindings are built.
    pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::parse_toml(&content, path)
    }

    /// Reads `$XDG_CONFIG_HOME/session-watch/config.toml`, or returns an empty
    /// alert list when nothing has been written there yet.
    pub fn load_default() -> Result<Config, ConfigError> {
        let path = xdg::config_path();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, monitoring without alerts");
            Ok(Config::default())
        }
    }

    /// Reads `path` when given, the XDG location otherwise.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_default(),
        }
    }

    /// Parses TOML text; errors carry the 1-based line and column so a broken
    /// `[[alerts]]` entry can be found in the file.
    pub(crate) fn parse_toml(content: &str, path: &Path) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|e| {
            let (line, column) = e
                .span()
                .map(|span| line_column(content, span.start))
                .unwrap_or((0, 0));
            ConfigError::ParseError {
                path: path.to_path_buf(),
                line,
                column,
                message: e.message().to_string(),
            }
        })
    }
}

/// One-based line and column of a byte offset into `content`.
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    (line, before.len() - line_start + 1)
}
