//! Deployment environment detection.

use super::ConfigError;
use std::env;

/// Execution mode of the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppEnvironment {
    Production,
    #[default]
    Development,
    Test,
}

impl AppEnvironment {
    /// Read `APP_ENV`.
    ///
    /// A deployed process that never sets it runs as production; a value
    /// that names no known environment is a configuration error.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("APP_ENV") {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::Production),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidValue {
                name: "APP_ENV",
                reason: format!("unknown environment {other:?}"),
            }),
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}
