use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}: {source}")]
    EnvParse {
        name: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
