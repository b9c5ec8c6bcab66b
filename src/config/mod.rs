//! Application configuration

pub mod prompts;
pub mod widget;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use prompts::builtin as prompts_builtin;
pub use widget::{ConfigError, DispatchPolicy, StorageBackend, WidgetConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub widget_config_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            data_dir: env::var("GLOBALSYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            widget_config_path: env::var("GLOBALSYNC_WIDGET_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Load the widget config from the configured TOML file, or defaults
    pub fn widget(&self) -> Result<WidgetConfig, ConfigError> {
        let config = match &self.widget_config_path {
            Some(path) => WidgetConfig::from_file(path)?,
            None => WidgetConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }
}
