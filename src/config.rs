use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ViewError};

/// Names the TOML config file to load.
pub const CONFIG_ENV: &str = "SPACESCOUT_CONFIG";
/// Overrides the backend command line (whitespace separated).
pub const BACKEND_ENV: &str = "SPACESCOUT_BACKEND";

/// Runtime configuration for the desktop view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Backend program and its arguments.
    pub backend: Vec<String>,
    pub window_width: f32,
    pub window_height: f32,
    /// Initial value of the "Min size (KB)" field.
    pub default_min_size_kb: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            backend: vec!["spacescout-backend".to_string()],
            window_width: 1200.0,
            window_height: 800.0,
            default_min_size_kb: 0,
        }
    }
}

impl ViewConfig {
    /// Load from `SPACESCOUT_CONFIG` if set, then apply `SPACESCOUT_BACKEND`.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(cmd) = std::env::var(BACKEND_ENV) {
            config.apply_backend_override(&cmd)?;
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_backend_override(&mut self, cmd: &str) -> Result<()> {
        let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(ViewError::Config(format!("{BACKEND_ENV} is empty")));
        }
        self.backend = argv;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.backend.is_empty() {
            return Err(ViewError::Config("backend command must not be empty".into()));
        }
        if !(self.window_width > 0.0 && self.window_height > 0.0) {
            return Err(ViewError::Config(format!(
                "window size must be positive, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        Ok(())
    }
}
