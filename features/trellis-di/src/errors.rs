use std::sync::Arc;

use thiserror::Error;

use crate::{
    dependency_graph::DependencyGraphErrors,
    scope::ProviderScope,
    token::Token,
    types::{DynError, SharedError},
};

/// Errors while resolving or constructing a component
#[derive(Error, Debug, Clone)]
pub enum InjectionError {
    /// A dependency has no provider in the container
    #[error("{requester} > {dependency} not found")]
    NotFound { requester: Token, dependency: Token },
    /// The provider type of a dependency opted out of injection
    #[error("{requester} > {dependency} not injectable")]
    NotInjectable { requester: Token, dependency: Token },
    /// Constructing a dependency failed, `origin` holds the cause
    #[error("{requester} > {dependency} injection failed: {origin}")]
    Failed {
        requester: Token,
        dependency: Token,
        origin: SharedError,
    },
    #[error(transparent)]
    Scope(#[from] InjectionScopeError),
    /// The invoked target is neither registered nor constructible
    #[error("{0} component not found in the injector")]
    ComponentNotFound(Token),
    /// The provider has no class, factory or value to construct from
    #[error("{0} has no construction strategy")]
    NoStrategy(Token),
    /// A singleton was requested before the container was built
    #[error("{0} has not been constructed yet")]
    NotConstructed(Token),
    /// The token is already being constructed further up the chain
    #[error("Circular dependency on {token} through {}", format_chain(.chain))]
    CircularDependency { token: Token, chain: Vec<Token> },
    /// The constructor, factory or method body returned an error
    #[error("{token} construction failed: {origin}")]
    Construction { token: Token, origin: SharedError },
    #[error(transparent)]
    Require(#[from] RequireError),
    /// A bound property or method outlived its container or instance
    #[error("'{0}' is not bound to a live container")]
    Unbound(String),
    #[error("Settings value '{expression}' could not be written: {origin}")]
    Settings {
        expression: String,
        origin: SharedError,
    },
}

impl InjectionError {
    pub(crate) fn construction(token: Token, error: DynError) -> Self {
        InjectionError::Construction {
            token,
            origin: Arc::from(error),
        }
    }

    /// The direct cause of a wrapped injection failure
    pub fn origin(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            InjectionError::Failed { origin, .. } | InjectionError::Construction { origin, .. } => {
                Some(origin.as_ref())
            }
            _ => None,
        }
    }

    /// Follows nested injection failures down to the error that started them
    pub fn root_origin(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        let mut current = self.origin()?;
        while let Some(next) = current
            .downcast_ref::<InjectionError>()
            .and_then(InjectionError::origin)
        {
            current = next;
        }
        Some(current)
    }

    /// The cause to keep when this error is wrapped by a dependent.
    /// Constructor failures are kept unmodified.
    pub(crate) fn into_origin(self) -> SharedError {
        match self {
            InjectionError::Construction { origin, .. } => origin,
            other => Arc::new(other),
        }
    }
}

fn format_chain(chain: &[Token]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" > ")
}

fn on_service(service: &Option<String>) -> String {
    service
        .as_ref()
        .map(|service| format!(" on service {service}"))
        .unwrap_or_default()
}

/// A request or instance scoped provider was resolved outside an active
/// scoped invocation
#[derive(Error, Debug, Clone)]
#[error("{dependency} is {scope} scoped and cannot be injected into {requester} outside of a scoped invocation")]
pub struct InjectionScopeError {
    pub dependency: Token,
    pub requester: Token,
    pub scope: ProviderScope,
}

/// Errors when reading resolved dependencies
#[derive(Error, Debug, Clone)]
pub enum RequireError {
    /// Fewer dependencies were resolved than the constructor reads
    #[error("Dependency #{0} was not resolved")]
    ArgumentMissing(usize),

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors while emitting lifecycle hooks
#[derive(Error, Debug, Clone)]
pub enum LifecycleError {
    /// A hook did not settle within its budget (production only)
    #[error("Timeout on {event} hook: unsettled future{}", on_service(.service))]
    Timeout {
        event: String,
        service: Option<String>,
    },
    /// A hook future resolved with an error
    #[error("{event} hook failed on service {service}: {origin}")]
    HookFailed {
        event: String,
        service: String,
        origin: SharedError,
    },
}

/// Errors while bootstrapping or loading a container
#[derive(Error, Debug, Clone)]
pub enum InitError {
    #[error(transparent)]
    Injection(#[from] InjectionError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// There are issues with the dependency graph
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphErrors),
    /// A pending registration task failed
    #[error("Registration task failed: {0}")]
    Waiter(SharedError),
    /// The bootstrap settings could not be applied
    #[error("Invalid settings: {0}")]
    Settings(SharedError),
}
