use std::{collections::HashMap, ops::Deref, time::Duration};

use trellis_config::{ConfigError, Settings};

use crate::{
    component::{Component, Dependencies},
    scope::{ProviderScope, ProviderType},
    types::DynError,
};

pub const SCOPES: &str = "scopes";
pub const HOOK_TIMEOUT: &str = "hook_timeout";
pub const EMIT_TIMEOUT: &str = "emit_timeout";

const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_millis(2000);

/// The container settings, registered as a singleton provider of every
/// container.
///
/// Derefs to [`Settings`] for plain values; adds the default scope table and
/// the lifecycle hook timeouts.
#[derive(Debug, Default)]
pub struct SettingsService {
    settings: Settings,
}

impl SettingsService {
    pub fn new() -> Self {
        SettingsService {
            settings: Settings::new(),
        }
    }

    pub fn from_settings(settings: Settings) -> Self {
        SettingsService { settings }
    }

    /// Default scope per provider type
    pub fn scopes(&self) -> HashMap<String, ProviderScope> {
        self.settings
            .get(SCOPES)
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Default scope of providers of `provider_type` without an explicit
    /// scope, singleton when not configured
    pub fn scope_of(&self, provider_type: &ProviderType) -> ProviderScope {
        self.scopes()
            .get(provider_type.as_str())
            .copied()
            .unwrap_or_default()
    }

    pub fn set_scope_of(
        &self,
        provider_type: &ProviderType,
        scope: ProviderScope,
    ) -> Result<(), ConfigError> {
        let mut scopes = self.scopes();
        scopes.insert(provider_type.as_str().to_string(), scope);
        self.settings.set(SCOPES, scopes)
    }

    /// Budget of a single pending lifecycle hook
    pub fn hook_timeout(&self) -> Duration {
        self.millis(HOOK_TIMEOUT).unwrap_or(DEFAULT_HOOK_TIMEOUT)
    }

    /// Budget of all pending hooks of one emitted event
    pub fn emit_timeout(&self) -> Duration {
        self.millis(EMIT_TIMEOUT).unwrap_or(DEFAULT_EMIT_TIMEOUT)
    }

    pub fn set_hook_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.settings.set(HOOK_TIMEOUT, millis)
    }

    pub fn set_emit_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.settings.set(EMIT_TIMEOUT, millis)
    }

    fn millis(&self, path: &str) -> Option<Duration> {
        self.settings
            .get::<u64>(path)
            .ok()
            .flatten()
            .map(Duration::from_millis)
    }
}

impl Deref for SettingsService {
    type Target = Settings;

    fn deref(&self) -> &Self::Target {
        &self.settings
    }
}

impl Component for SettingsService {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(SettingsService::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_default_to_singleton() {
        let settings = SettingsService::from_settings(Settings::empty());
        assert_eq!(settings.scope_of(&ProviderType::Controller), ProviderScope::Singleton);

        settings
            .set_scope_of(&ProviderType::Controller, ProviderScope::Request)
            .unwrap();

        assert_eq!(settings.scope_of(&ProviderType::Controller), ProviderScope::Request);
        assert_eq!(settings.scope_of(&ProviderType::Service), ProviderScope::Singleton);
        assert_eq!(
            settings.get_value("scopes.controller"),
            Some(serde_json::json!("request"))
        );
    }

    #[test]
    fn timeouts_are_configurable() {
        let settings = SettingsService::from_settings(Settings::empty());
        assert_eq!(settings.hook_timeout(), Duration::from_millis(1000));
        assert_eq!(settings.emit_timeout(), Duration::from_millis(2000));

        settings.set_hook_timeout(Duration::from_millis(50)).unwrap();
        settings.set(EMIT_TIMEOUT, 75).unwrap();

        assert_eq!(settings.hook_timeout(), Duration::from_millis(50));
        assert_eq!(settings.emit_timeout(), Duration::from_millis(75));
    }

    #[test]
    fn oversized_timeouts_saturate() {
        let settings = SettingsService::from_settings(Settings::empty());

        settings.set_hook_timeout(Duration::MAX).unwrap();
        settings.set_emit_timeout(Duration::MAX).unwrap();

        assert_eq!(settings.hook_timeout(), Duration::from_millis(u64::MAX));
        assert_eq!(settings.emit_timeout(), Duration::from_millis(u64::MAX));
    }
}
