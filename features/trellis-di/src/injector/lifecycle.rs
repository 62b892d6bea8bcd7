use std::{
    future::Future,
    sync::Arc,
    thread::{self, sleep},
    time::Duration,
};

use futures::future::{self, BoxFuture, Either};
use futures_channel::oneshot;
use tracing::{debug, warn};

use crate::{
    errors::{InitError, InjectionError, LifecycleError},
    hooks::{HookOutput, ON_DESTROY, ON_INIT, ON_INJECTOR_READY},
    injector::{read, write, Injector},
    locals::LocalsContainer,
    scope::ProviderScope,
    settings::SettingsService,
    token::Token,
    types::{DynError, Instance},
};

impl Injector {
    /// Constructs every buildable singleton, in registration order.
    ///
    /// Providers without an explicit scope get the default scope of their
    /// type first. Returns the locals shared by all constructions.
    pub fn build(&self) -> Result<LocalsContainer, InjectionError> {
        let mut locals = LocalsContainer::new();
        let settings = self.settings();

        for (token, provider) in self.entries() {
            if Self::is_self(&token) {
                continue;
            }

            let (provide, scope, buildable, constructed) = {
                let mut provider = write(&provider);
                if provider.explicit_scope().is_none() {
                    let scope = settings.scope_of(provider.provider_type());
                    provider.set_default_scope(scope);
                }
                (
                    provider.provide().clone(),
                    provider.scope(),
                    self.registry()
                        .registry_settings(provider.provider_type())
                        .buildable,
                    provider.instance().cloned(),
                )
            };

            if scope != ProviderScope::Singleton || !buildable {
                continue;
            }

            let instance = match (constructed, locals.get(&provide).cloned()) {
                (Some(instance), _) => instance,
                (None, Some(instance)) => instance,
                (None, None) => {
                    debug!("Building {provide}");
                    self.invoke(provide.clone(), &mut locals, Default::default())?
                }
            };

            write(&provider).set_instance(Some(instance.clone()));
            locals.insert(provide, instance);
        }

        Ok(locals)
    }

    /// Builds the container, then emits `$onInit`
    pub async fn load(&self) -> Result<LocalsContainer, InitError> {
        let locals = self.build()?;
        self.emit(ON_INIT, Vec::new()).await?;
        Ok(locals)
    }

    /// Emits `$onDestroy`, then drops every cached instance but the settings.
    ///
    /// Instances holding the container (through `Token::of::<Injector>()`)
    /// keep it alive until destroyed.
    pub async fn destroy(&self) -> Result<(), LifecycleError> {
        let emitted = self.emit(ON_DESTROY, Vec::new()).await;

        for provider in self.get_providers(None) {
            let mut provider = write(&provider);
            if provider.provide() != &Token::of::<SettingsService>() {
                provider.set_instance(None);
            }
        }
        emitted
    }

    /// Calls the `event` hooks of every constructed instance.
    ///
    /// Pending hooks are awaited concurrently, each within the hook timeout
    /// and all of them within the emit timeout. A timeout is logged as a
    /// warning, and fails the emit in production.
    pub async fn emit(&self, event: &str, args: Vec<Instance>) -> Result<(), LifecycleError> {
        debug!("Call hook {event}");

        let settings = self.settings();
        let production = settings.env().is_production();
        let hook_timeout = settings.hook_timeout();

        let mut pending = Vec::new();
        for provider in self.get_providers(None) {
            let (instance, service) = {
                let provider = read(&provider);
                match provider.instance() {
                    Some(instance) => (instance.clone(), provider.class_name()),
                    None => continue,
                }
            };

            let Some(store) = self.registry().metadata().get(instance.info.type_id) else {
                continue;
            };
            let hooks = store.hooks(event);
            if hooks.is_empty() {
                continue;
            }
            if event == ON_INJECTOR_READY {
                warn!("{ON_INJECTOR_READY} hook is deprecated, use {ON_INIT} instead ({service})");
            }

            for hook in hooks {
                if let HookOutput::Pending(future) = hook(&instance, args.as_slice()) {
                    pending.push(settle(
                        event.to_string(),
                        service.clone(),
                        future,
                        hook_timeout,
                        production,
                    ));
                }
            }
        }

        if pending.is_empty() {
            return Ok(());
        }
        debug!("Call hook {event}: {} pending", pending.len());

        match with_timeout(future::join_all(pending), settings.emit_timeout()).await {
            Some(results) => results.into_iter().collect(),
            None => check_timeout(event, None, production),
        }
    }
}

/// Awaits one hook within its budget
async fn settle(
    event: String,
    service: String,
    future: BoxFuture<'static, Result<(), DynError>>,
    timeout: Duration,
    production: bool,
) -> Result<(), LifecycleError> {
    match with_timeout(future, timeout).await {
        Some(Ok(())) => Ok(()),
        Some(Err(origin)) => Err(LifecycleError::HookFailed {
            event,
            service,
            origin: Arc::from(origin),
        }),
        None => check_timeout(&event, Some(service), production),
    }
}

fn check_timeout(
    event: &str,
    service: Option<String>,
    production: bool,
) -> Result<(), LifecycleError> {
    let error = LifecycleError::Timeout {
        event: event.to_string(),
        service,
    };
    if production {
        return Err(error);
    }
    warn!("{error}. In production, the warning will stop the application!");
    Ok(())
}

/// Resolves `None` if `future` did not settle within `timeout`. The future
/// is dropped, not cancelled: work it spawned keeps running.
async fn with_timeout<F: Future>(future: F, timeout: Duration) -> Option<F::Output> {
    match future::select(Box::pin(future), timer(timeout)).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(_) => None,
    }
}

fn timer(timeout: Duration) -> oneshot::Receiver<()> {
    let (timeout_tx, timeout_rx) = oneshot::channel::<()>();
    // Never joined, the thread ends once the timer fired
    thread::spawn(move || {
        sleep(timeout);
        let _ = timeout_tx.send(());
    });
    timeout_rx
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use tracing_test::traced_test;
    use trellis_config::Env;

    use super::*;
    use crate::{
        component::{Component, Dependencies},
        metadata::ClassMetadata,
        registry::ProviderRegistry,
    };

    struct Sleeper;
    impl Component for Sleeper {
        fn construct(_: Dependencies) -> Result<Self, DynError> {
            Ok(Sleeper)
        }

        fn metadata(meta: &mut ClassMetadata<Self>) {
            meta.on(ON_INIT, |_, _| HookOutput::pending(future::pending()))
                .on(ON_INJECTOR_READY, |_, _| ());
        }
    }

    fn sleeper_injector(env: Env) -> Injector {
        let injector = Injector::new(Arc::new(ProviderRegistry::new()));
        injector.add_class::<Sleeper>();
        let settings = injector.settings();
        settings.set_env(env);
        settings.set_hook_timeout(Duration::from_millis(20)).unwrap();
        settings.set_emit_timeout(Duration::from_millis(100)).unwrap();
        injector
    }

    #[test]
    #[traced_test]
    fn unsettled_hooks_warn_outside_production() {
        let injector = sleeper_injector(Env::Test);

        block_on(injector.load()).unwrap();

        assert!(logs_contain("Timeout on $onInit hook: unsettled future on service Sleeper"));
        assert!(logs_contain("In production, the warning will stop the application!"));
    }

    #[test]
    #[traced_test]
    fn deprecated_hooks_still_run_with_a_warning() {
        let injector = sleeper_injector(Env::Test);
        injector.build().unwrap();

        block_on(injector.emit(ON_INJECTOR_READY, Vec::new())).unwrap();

        assert!(logs_contain("$onInjectorReady hook is deprecated"));
    }

    #[test]
    fn settles_before_the_timer() {
        let output = block_on(with_timeout(async { 7 }, Duration::from_secs(5)));
        assert_eq!(output, Some(7));
    }

    #[test]
    fn times_out_pending_futures() {
        let output = block_on(with_timeout(
            future::pending::<()>(),
            Duration::from_millis(20),
        ));
        assert_eq!(output, None);
    }
}
