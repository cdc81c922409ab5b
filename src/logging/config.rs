use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration, embedded in [`crate::config::AlignConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    pub console_output: bool,

    /// Directory for daily-rolling JSON logs (None = no file logging)
    pub log_directory: Option<PathBuf>,

    pub include_file_location: bool,

    /// Level for rough/precision alignment and hit classification
    pub engine_level: String,

    /// Level for the multi-field driver
    pub driver_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            engine_level: "info".to_string(),
            driver_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose console logging with source locations.
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            engine_level: "trace".to_string(),
            driver_level: "debug".to_string(),
        }
    }

    /// File-only logging for unattended batch runs.
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: false,
            engine_level: "info".to_string(),
            driver_level: "info".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("engine_level", &self.engine_level),
            ("driver_level", &self.driver_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Module path suffix and level for every component with its own level.
    pub fn component_levels(&self) -> [(&'static str, &str); 2] {
        [("engine", &self.engine_level), ("driver", &self.driver_level)]
    }

    /// Override every level for repeated `-v` flags.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "debug",
            _ => "trace",
        };
        self.global_level = level.to_string();
        self.engine_level = level.to_string();
        self.driver_level = level.to_string();
        self
    }
}
