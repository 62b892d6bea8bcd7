use std::{collections::HashMap, future::Future, path::PathBuf, sync::Arc, time::Duration};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};
use trellis_config::{ConfigError, Env};

use crate::{
    dependency_graph::DependencyGraphErrors,
    errors::InitError,
    injector::Injector,
    provider::ProviderDescriptor,
    registry::ProviderRegistry,
    scope::{ProviderScope, ProviderType},
    settings::SettingsService,
    types::DynError,
};

/// Settings applied when a [`Bootstrap`] is created
#[derive(Clone, Default)]
pub struct BootstrapSettings {
    pub root_dir: Option<PathBuf>,
    pub env: Option<Env>,
    /// Default scope per provider type
    pub scopes: HashMap<ProviderType, ProviderScope>,
    pub hook_timeout: Option<Duration>,
    pub emit_timeout: Option<Duration>,
    /// Additional settings, keys may be dotted paths
    pub values: Map<String, Value>,
    /// Providers added to the container, overriding registry templates
    pub providers: Vec<ProviderDescriptor>,
}

impl BootstrapSettings {
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn provider(mut self, descriptor: impl Into<ProviderDescriptor>) -> Self {
        self.providers.push(descriptor.into());
        self
    }
}

/// Creates a container and fills it from the provider registry.
///
/// ```rust
/// use std::sync::Arc;
/// use trellis_di::{Bootstrap, BootstrapSettings, ProviderRegistry, Token};
///
/// let registry = Arc::new(ProviderRegistry::new());
/// registry.register_value("greeting", "hello");
///
/// let mut bootstrap = Bootstrap::with_registry(registry, BootstrapSettings::default()).unwrap();
/// futures::executor::block_on(bootstrap.load_injector()).unwrap();
///
/// let greeting = bootstrap.injector().get::<&str>(&Token::name("greeting"));
/// assert_eq!(greeting.as_deref(), Some(&"hello"));
/// ```
pub struct Bootstrap {
    injector: Injector,
    waiters: Vec<BoxFuture<'static, Result<(), DynError>>>,
    loaded_from_registry: bool,
}

impl Bootstrap {
    /// Bootstraps from the process wide registry
    pub fn new(settings: BootstrapSettings) -> Result<Self, InitError> {
        Self::with_registry(ProviderRegistry::global(), settings)
    }

    pub fn with_registry(
        registry: Arc<ProviderRegistry>,
        settings: BootstrapSettings,
    ) -> Result<Self, InitError> {
        let bootstrap = Bootstrap {
            injector: Injector::new(registry),
            waiters: Vec::new(),
            loaded_from_registry: false,
        };
        bootstrap.set_settings(settings)?;
        Ok(bootstrap)
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        self.injector.settings()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.injector.registry()
    }

    fn set_settings(&self, settings: BootstrapSettings) -> Result<(), InitError> {
        let BootstrapSettings {
            root_dir,
            env,
            scopes,
            hook_timeout,
            emit_timeout,
            values,
            providers,
        } = settings;
        let service = self.settings();

        if let Some(root_dir) = root_dir {
            service.set_root_dir(root_dir);
        }
        if let Some(env) = env {
            service.set_env(env);
        }
        for (provider_type, scope) in scopes {
            service
                .set_scope_of(&provider_type, scope)
                .map_err(invalid_settings)?;
        }
        if let Some(timeout) = hook_timeout {
            service.set_hook_timeout(timeout).map_err(invalid_settings)?;
        }
        if let Some(timeout) = emit_timeout {
            service.set_emit_timeout(timeout).map_err(invalid_settings)?;
        }
        service.merge(values).map_err(invalid_settings)?;

        self.add_providers(providers);
        Ok(())
    }

    pub fn add_providers(&self, providers: impl IntoIterator<Item = ProviderDescriptor>) {
        for descriptor in providers {
            self.injector.add_provider(descriptor);
        }
    }

    /// Registers a task to await before the container is loaded, for
    /// providers registered asynchronously
    pub fn add_waiter<F>(&mut self, waiter: F)
    where
        F: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.waiters.push(waiter.boxed());
    }

    /// Adds every registry template missing from the container. Aliases are
    /// added after the providers they point to. Runs once.
    pub fn load_from_global_registry(&mut self) {
        if self.loaded_from_registry {
            return;
        }
        self.loaded_from_registry = true;

        let entries = self.registry().entries();
        let (aliases, providers): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(token, provider)| provider.is_alias() && provider.provide() != token);

        for (token, _) in providers {
            if !self.injector.has_provider(&token) {
                self.injector.add_provider(token);
            }
        }

        for (alias, provider) in aliases {
            if self.injector.has_provider(&alias) {
                continue;
            }
            if !self.injector.create_alias(provider.provide(), alias.clone()) {
                warn!("Alias {alias} points to {} which is not registered", provider.provide());
            }
        }
        debug!("Loaded {} providers from the registry", self.injector.len());
    }

    /// Awaits the registration tasks, merges the registry, checks the
    /// dependency graph and loads the container.
    pub async fn load_injector(&mut self) -> Result<(), InitError> {
        let waiters = std::mem::take(&mut self.waiters);
        future::try_join_all(waiters)
            .await
            .map_err(|origin| InitError::Waiter(Arc::from(origin)))
            .inspect_err(|error| error!("{error}"))?;

        self.load_from_global_registry();
        self.check_dependency_graph()
            .inspect_err(|error| error!("{error}"))?;

        self.injector
            .load()
            .await
            .inspect_err(|error| error!("{error}"))?;
        Ok(())
    }

    /// Cycles fail the bootstrap. Missing dependencies only warn, as they
    /// can still be supplied through locals when invoked.
    fn check_dependency_graph(&self) -> Result<(), DependencyGraphErrors> {
        let Err(DependencyGraphErrors { errors }) = self.injector.dependency_graph().check() else {
            return Ok(());
        };

        let (missing, errors): (Vec<_>, Vec<_>) = errors.into_iter().partition(|error| error.is_missing());
        for missing in missing {
            warn!("{missing}");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DependencyGraphErrors { errors })
        }
    }
}

fn invalid_settings(error: ConfigError) -> InitError {
    InitError::Settings(Arc::new(error))
}
