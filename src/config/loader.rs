//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with POLYSCOUT_)
/// 2. Configuration file (TOML format)
/// 3. Default values
///
/// The loaded configuration is validated before it is returned; malformed
/// values fail here, not deep in the pipeline.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("POLYSCOUT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ExchangeKind, TradingMode};

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = load_config(None).expect("defaults should load");
        assert_eq!(cfg.mode, TradingMode::Paper);
        assert_eq!(cfg.exchange, ExchangeKind::Paper);
        assert_eq!(cfg.interval_seconds, 600);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        assert!(load_config(Some("does-not-exist.toml")).is_ok());
    }
}
