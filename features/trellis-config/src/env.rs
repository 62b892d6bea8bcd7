use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable read by [`Env::from_env`]
pub const ENV_VAR: &str = "TRELLIS_ENV";

/// The environment profile the application runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Production,
    #[default]
    Development,
    Test,
}

impl Env {
    /// Reads the profile from `TRELLIS_ENV`, falling back to development
    pub fn from_env() -> Self {
        let Ok(value) = std::env::var(ENV_VAR) else {
            return Env::default();
        };
        value.parse().unwrap_or_else(|error| {
            warn!("{error} in {ENV_VAR}, using {}", Env::default());
            Env::default()
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Env::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Production => "production",
            Env::Development => "development",
            Env::Test => "test",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown environment profile '{0}'")]
pub struct ParseEnvError(pub String);

impl FromStr for Env {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Env::Production),
            "dev" | "development" => Ok(Env::Development),
            "test" => Ok(Env::Test),
            other => Err(ParseEnvError(other.to_string())),
        }
    }
}
