//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a placer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON content could not be parsed into a string map.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required key is missing from the configuration map.
    #[error("missing required configuration key: '{0}'")]
    MissingKey(String),

    /// A configuration value could not be interpreted.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The dump directory could not be created.
    #[error("failed to create dump directory '{0}'")]
    DumpDirectory(String),
}
