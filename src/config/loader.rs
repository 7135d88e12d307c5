//! Reading patch configs from TOML.
//!
//! A config loaded from a file is anchored to that file: `meta.root` is
//! resolved against the config's directory, and when it is absent the
//! directory itself becomes the root. Configs parsed from a string are left
//! as written.

use crate::config::schema::{PatchConfig, ValidationError};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label used in errors for configs that did not come from a file.
const INLINE_ORIGIN: &str = "<inline config>";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read patch config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{origin}: malformed TOML: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml_edit::de::Error,
    },

    /// Every validation issue found, not just the first
    #[error("{origin} is not a valid patch config:\n{source}")]
    Invalid {
        origin: String,
        #[source]
        source: ValidationError,
    },
}

fn parse(input: &str, origin: &str) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    config.validate().map_err(|source| ConfigError::Invalid {
        origin: origin.to_string(),
        source,
    })?;
    Ok(config)
}

/// Parse and validate a config. `meta.root`, if any, is kept as written.
pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, INLINE_ORIGIN)
}

/// Parse and validate a config file, anchoring its root to the file's directory.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse(&contents, &path.display().to_string())?;
    anchor_root(&mut config, path);
    debug!(
        "loaded '{}' from {} ({} rules)",
        config.display_name(),
        path.display(),
        config.rules.len()
    );
    Ok(config)
}

fn anchor_root(config: &mut PatchConfig, config_path: &Path) {
    let config_dir = match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // join keeps an absolute root as is
    config.meta.root = Some(match config.meta.root.take() {
        Some(root) => config_dir.join(root),
        None => config_dir,
    });
}
