//! Helpers for tests of components.
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_di::{testing, Component, Dependencies, DynError, ProviderRegistry, Token};
//!
//! struct Greeter {
//!     name: Arc<String>,
//! }
//! impl Component for Greeter {
//!     fn dependencies() -> Vec<Token> {
//!         vec![Token::name("name")]
//!     }
//!     fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
//!         Ok(Greeter { name: deps.take()? })
//!     }
//! }
//!
//! let injector = futures::executor::block_on(testing::load_injector(Arc::new(
//!     ProviderRegistry::new(),
//! )))
//! .unwrap();
//!
//! let greeter = testing::invoke::<Greeter>(
//!     &injector,
//!     [testing::Override::new("name", String::from("Ada"))],
//! )
//! .unwrap();
//! assert_eq!(*greeter.name, "Ada");
//! ```

use std::{borrow::Cow, sync::Arc};

use trellis_config::Env;

use crate::{
    bootstrap::{Bootstrap, BootstrapSettings},
    component::{ClassDef, Component, Dependencies},
    errors::{InitError, InjectionError, RequireError},
    injector::{
        invoke::{InvokeMethodOptions, InvokeOptions},
        Injector,
    },
    locals::LocalsContainer,
    registry::ProviderRegistry,
    token::Token,
    types::{DynError, Injectable, Instance},
};

/// Bootstraps and loads a container in the test environment
pub async fn load_injector(registry: Arc<ProviderRegistry>) -> Result<Injector, InitError> {
    let settings = BootstrapSettings {
        env: Some(Env::Test),
        ..Default::default()
    };
    let mut bootstrap = Bootstrap::with_registry(registry, settings)?;
    bootstrap.load_injector().await?;
    Ok(bootstrap.injector().clone())
}

/// An instance used in place of the registered provider
#[derive(Debug, Clone)]
pub struct Override {
    pub provide: Token,
    pub instance: Instance,
}

impl Override {
    pub fn new<T: Injectable>(provide: impl Into<Token>, value: T) -> Self {
        Override {
            provide: provide.into(),
            instance: Instance::new(value),
        }
    }
}

/// Constructs `C`, resolving the overridden tokens to the given instances
pub fn invoke<C: Component>(
    injector: &Injector,
    overrides: impl IntoIterator<Item = Override>,
) -> Result<Arc<C>, InjectionError> {
    let mut locals = LocalsContainer::new();
    for Override { provide, instance } in overrides {
        locals.insert(provide, instance);
    }

    injector
        .invoke(ClassDef::of::<C>(), &mut locals, InvokeOptions::default())?
        .downcast::<C>()
        .map_err(|actual_type| {
            RequireError::DowncastFailed {
                required_type: std::any::type_name::<C>(),
                actual_type,
            }
            .into()
        })
}

/// Runs `body` with `deps` resolved from the container
pub fn inject<R>(
    injector: &Injector,
    deps: Vec<Token>,
    body: impl FnOnce(Dependencies) -> Result<R, DynError>,
) -> Result<R, InjectionError> {
    let options = InvokeMethodOptions {
        target: Token::name("inject"),
        method_name: Cow::Borrowed("body"),
        deps,
    };
    injector.invoke_method(body, &mut LocalsContainer::new(), options)
}
