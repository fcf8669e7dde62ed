//! Settings for the `zeina` binary.
//!
//! Values are read, in increasing priority, from built-in defaults, an
//! optional `settings.toml` in the working directory and `ZEINA_*` environment
//! variables (`ZEINA_DATABASE__URL`, `ZEINA_FACTORY__STEP`, ...).
//!
//! A plain `DATABASE_URL` only replaces the built-in database default, so
//! `ZEINA_DATABASE__URL` always wins over it. The migration binary resolves
//! the URL the same way.
use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite:./zeina.db?mode=rwc";

#[derive(Debug, Deserialize)]
pub struct App {
    /// `tracing` level applied to the workspace crates.
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Factory {
    /// Account numbers reserved per counter round trip.
    pub step: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub factory: Factory,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Some("settings"), None)
    }

    /// Build the settings from `file` (optional, without extension) and the
    /// process environment, or `vars` in its place when given.
    fn load(file: Option<&str>, vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let fallback_url = match &vars {
            Some(vars) => vars.get("DATABASE_URL").cloned(),
            None => std::env::var("DATABASE_URL").ok(),
        }
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let mut builder = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.url", fallback_url)?
            .set_default("factory.step", engine::DEFAULT_STEP)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("ZEINA")
                    .prefix_separator("_")
                    .separator("__")
                    .source(vars),
            )
            .build()?
            .try_deserialize()
    }
}
