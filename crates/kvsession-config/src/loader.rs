//! Reading a config file from disk.

use std::path::Path;

use tracing::debug;

use crate::{ConfigError, KvSessionConfig, Result};

/// Read, parse, and validate the config file at `path`.
pub fn load_config_file(path: &Path) -> Result<KvSessionConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = KvSessionConfig::from_toml(&contents)?;
    config.validate()?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}
