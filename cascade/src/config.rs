// Configuration management with layered configuration (file, env)

use crate::scheduler::LocalSchedulerConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for hosts that run the in-process scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub tick_interval_ms: u64,
    pub max_firings_per_tick: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Settings {
    /// Load settings from `config/` files overlaid with `CASCADE__` env vars
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let builder = Config::builder()
            .set_default("scheduler.tick_interval_ms", defaults.scheduler.tick_interval_ms)?
            .set_default(
                "scheduler.max_firings_per_tick",
                defaults.scheduler.max_firings_per_tick as u64,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.json_logs", defaults.observability.json_logs)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("CASCADE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.tick_interval_ms == 0 {
            return Err("Scheduler tick_interval_ms must be greater than 0".to_string());
        }
        if self.scheduler.max_firings_per_tick == 0 {
            return Err("Scheduler max_firings_per_tick must be greater than 0".to_string());
        }
        if self.observability.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> LocalSchedulerConfig {
        LocalSchedulerConfig {
            tick_interval_ms: self.scheduler.tick_interval_ms,
            max_firings_per_tick: self.scheduler.max_firings_per_tick,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let scheduler = LocalSchedulerConfig::default();
        Self {
            scheduler: SchedulerSettings {
                tick_interval_ms: scheduler.tick_interval_ms,
                max_firings_per_tick: scheduler.max_firings_per_tick,
            },
            observability: ObservabilitySettings {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}
