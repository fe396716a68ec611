use sea_orm::DbErr;
use thiserror::Error;

/// Raised by the startup schema gate.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("database schema is behind the code: {} pending migration(s): {}", .0.len(), .0.join(", "))]
    Pending(Vec<String>),

    #[error("failed to inspect or migrate schema: {0}")]
    Database(#[from] DbErr),
}

/// Raised while loading [`crate::config::EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
