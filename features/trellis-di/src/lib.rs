//! Trellis DI is a dependency injection container for components with
//! scoped lifetimes.
//!
//! Trellis DI is split into four parts:
//! 1. Providers: how to produce the value behind a [`Token`], from a class,
//!    a factory or a plain value
//! 2. ProviderRegistry: process wide provider templates, collected before a
//!    container exists
//! 3. Injector: the container. Forks templates into providers, resolves
//!    dependencies, builds singletons and emits lifecycle hooks
//! 4. Bootstrap: applies settings, merges the registry and loads an injector
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_di::{
//!     Bootstrap, BootstrapSettings, ClassMetadata, Component, Dependencies, DynError,
//!     ProviderRegistry, ProviderScope, Token, ON_INIT,
//! };
//!
//! struct Database {
//!     url: String,
//! }
//! impl Component for Database {
//!     fn construct(_: Dependencies) -> Result<Self, DynError> {
//!         Ok(Database { url: "postgres://localhost".to_string() })
//!     }
//! }
//!
//! struct UserRepository {
//!     database: Arc<Database>,
//! }
//! impl Component for UserRepository {
//!     fn dependencies() -> Vec<Token> {
//!         vec![Token::of::<Database>()]
//!     }
//!     fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
//!         Ok(UserRepository { database: deps.take()? })
//!     }
//! }
//!
//! struct RequestContext;
//! impl Component for RequestContext {
//!     fn construct(_: Dependencies) -> Result<Self, DynError> {
//!         Ok(RequestContext)
//!     }
//!     fn metadata(meta: &mut ClassMetadata<Self>) {
//!         meta.scope(ProviderScope::Request).on(ON_INIT, |_, _| ());
//!     }
//! }
//!
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register_service::<Database>();
//! registry.register_service::<UserRepository>();
//! registry.register_service::<RequestContext>();
//!
//! let mut bootstrap = Bootstrap::with_registry(registry, BootstrapSettings::default()).unwrap();
//! futures::executor::block_on(bootstrap.load_injector()).unwrap();
//! let injector = bootstrap.injector();
//!
//! // Singletons are built once
//! let repository = injector.get::<UserRepository>(&Token::of::<UserRepository>()).unwrap();
//! let database = injector.get::<Database>(&Token::of::<Database>()).unwrap();
//! assert!(Arc::ptr_eq(&repository.database, &database));
//! assert_eq!(database.url, "postgres://localhost");
//!
//! // Request scoped providers are built per request
//! assert!(injector.get_instance(&Token::of::<RequestContext>()).is_none());
//! ```

pub mod bootstrap;
pub mod component;
pub mod dependency_graph;
pub mod errors;
pub mod hooks;
pub mod injector;
pub mod locals;
pub mod metadata;
pub mod provider;
pub mod registry;
pub mod scope;
pub mod settings;
pub mod testing;
pub mod token;
pub mod types;
pub mod view;

pub use bootstrap::{Bootstrap, BootstrapSettings};
pub use component::{ClassDef, Component, Dependencies};
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use errors::{
    InitError, InjectionError, InjectionScopeError, LifecycleError, RequireError,
};
pub use hooks::{HookOutput, ON_DESTROY, ON_INIT, ON_INJECTOR_READY};
pub use injector::{
    bindings::{Constant, Inject, InjectedMethod, Value},
    invoke::{InvokeMethodOptions, InvokeOptions, InvokeTarget},
    Injector, WeakInjector,
};
pub use locals::LocalsContainer;
pub use metadata::{BindingKind, ClassMetadata, MetadataStore, Store};
pub use provider::{ParentProvider, Provider, ProviderDescriptor, ProviderRef, UseValue};
pub use registry::{ProviderRegistry, RegistrySettings};
pub use scope::{ProviderScope, ProviderType};
pub use settings::SettingsService;
pub use token::{Symbol, Token};
pub use types::{DynError, Injectable, Instance, SharedError, TypeInfo};
pub use view::ProviderView;

pub use trellis_config::{ConfigError, Env, Settings};
