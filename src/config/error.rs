//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file: \"{0}\": {1}")]
    Toml(PathBuf, #[source] toml::de::Error),

    #[error("config file: \"{0}\": {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),

    #[error("{0}")]
    Validation(String),

    #[error("missing root configuration file")]
    MissingRoot,
}

impl ConfigError {
    /// Attach the offending config file to a validation failure.
    pub fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            Self::Validation(msg) => {
                Self::Validation(format!("config file: \"{}\": {msg}", file.display()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};
    use std::path::Path;

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("config.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("config.toml"));

        let validation_err = ConfigError::Validation("illegal id: sometimes".to_string());
        assert_eq!(format!("{validation_err}"), "illegal id: sometimes");
    }

    #[test]
    fn test_in_file() {
        let err = ConfigError::Validation("illegal paginate value: x".into())
            .in_file(Path::new("/t/config.yaml"));
        assert_eq!(
            err.to_string(),
            "config file: \"/t/config.yaml\": illegal paginate value: x"
        );
        assert_eq!(
            ConfigError::MissingRoot.in_file(Path::new("x")).to_string(),
            "missing root configuration file"
        );
    }
}
