use crate::error::{ConfigError, Result as AppResult};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// How often every room receives a full `gameState` snapshot.
    pub tick_rate_hz: u32,
}

#[derive(Debug, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.port", 3000)?
        .set_default("server.cors_origins", Vec::<String>::new())?
        .set_default("server.tick_rate_hz", 30)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> AppResult<AppSettings> {
    let settings: AppSettings = builder
        .build()
        .and_then(Config::try_deserialize)
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    if settings.server.tick_rate_hz == 0 {
        return Err(
            ConfigError::InvalidValue("server.tick_rate_hz must be at least 1".to_string()).into(),
        );
    }
    Ok(settings)
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = with_defaults(Config::builder())
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("CREWQUARTERS")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );
    finish(builder)
}
