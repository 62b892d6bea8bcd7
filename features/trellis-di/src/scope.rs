use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Lifecycle policy of a provider inside one container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderScope {
    /// Constructed once per container during `build()`
    #[default]
    Singleton,
    /// Constructed once per logical request, shared through the request locals
    Request,
    /// Constructed on every resolution, never cached
    Instance,
}

impl ProviderScope {
    /// Request and instance scoped providers are constructed again instead of
    /// reusing a cached instance
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, ProviderScope::Request | ProviderScope::Instance)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderScope::Singleton => "singleton",
            ProviderScope::Request => "request",
            ProviderScope::Instance => "instance",
        }
    }
}

impl fmt::Display for ProviderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown provider scope '{0}'")]
pub struct ParseScopeError(pub String);

impl FromStr for ProviderScope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singleton" => Ok(ProviderScope::Singleton),
            "request" => Ok(ProviderScope::Request),
            "instance" => Ok(ProviderScope::Instance),
            other => Err(ParseScopeError(other.to_string())),
        }
    }
}

/// Category of a provider, used for bulk queries, registry settings and
/// default scopes. Independent from the construction strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ProviderType {
    #[default]
    Provider,
    Service,
    Factory,
    Value,
    Controller,
    Middleware,
    Converter,
    Custom(Cow<'static, str>),
}

impl ProviderType {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderType::Provider => "provider",
            ProviderType::Service => "service",
            ProviderType::Factory => "factory",
            ProviderType::Value => "value",
            ProviderType::Controller => "controller",
            ProviderType::Middleware => "middleware",
            ProviderType::Converter => "converter",
            ProviderType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ProviderType {
    fn from(name: &str) -> Self {
        match name {
            "provider" => ProviderType::Provider,
            "service" => ProviderType::Service,
            "factory" => ProviderType::Factory,
            "value" => ProviderType::Value,
            "controller" => ProviderType::Controller,
            "middleware" => ProviderType::Middleware,
            "converter" => ProviderType::Converter,
            other => ProviderType::Custom(Cow::Owned(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("singleton", ProviderScope::Singleton)]
    #[case("REQUEST", ProviderScope::Request)]
    #[case("instance", ProviderScope::Instance)]
    fn parses_scopes(#[case] input: &str, #[case] expected: ProviderScope) {
        assert_eq!(input.parse::<ProviderScope>().unwrap(), expected);
    }

    #[test]
    fn only_request_and_instance_rebuild() {
        assert!(!ProviderScope::Singleton.requires_rebuild());
        assert!(ProviderScope::Request.requires_rebuild());
        assert!(ProviderScope::Instance.requires_rebuild());
    }

    #[test]
    fn provider_types_round_trip_through_names() {
        assert_eq!(ProviderType::from("controller"), ProviderType::Controller);
        assert_eq!(
            ProviderType::from("graphql-resolver").as_str(),
            "graphql-resolver"
        );
        assert_eq!(ProviderType::Middleware.to_string(), "middleware");
    }
}
