use std::sync::Arc;

use futures::executor::block_on;
use trellis_di::{
    testing, Bootstrap, BootstrapSettings, ClassMetadata, Component, Dependencies, DynError,
    Injector, InvokeOptions, LocalsContainer, ParentProvider, Provider, ProviderDescriptor,
    ProviderRegistry, ProviderScope, ProviderType, RegistrySettings, Token,
};

#[test]
fn value_providers_resolve_to_the_value() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_value("token", "Value");

    let injector = block_on(testing::load_injector(registry)).unwrap();

    assert_eq!(
        injector.get::<&str>(&Token::from("token")).as_deref(),
        Some(&"Value")
    );
}

#[test]
fn callable_values_are_called_on_construction() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(ProviderDescriptor::value_fn("port", || 8080_u16));

    let injector = block_on(testing::load_injector(registry)).unwrap();

    assert_eq!(injector.get::<u16>(&Token::from("port")).as_deref(), Some(&8080));
}

fn double(value: u32) -> u32 {
    value * 2
}

type Doubler = fn(u32) -> u32;

struct Calculator {
    double: Arc<Doubler>,
}
impl Component for Calculator {
    fn dependencies() -> Vec<Token> {
        vec![Token::from("double")]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(Calculator {
            double: deps.take()?,
        })
    }
}

#[test]
fn factories_returning_functions_inject_the_function_itself() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_factory("double", Vec::new(), |_| Ok(double as Doubler));
    registry.register_service::<Calculator>();

    let injector = block_on(testing::load_injector(registry)).unwrap();
    let calculator = injector
        .get::<Calculator>(&Token::of::<Calculator>())
        .unwrap();

    assert_eq!((calculator.double)(21), 42);
}

#[test]
fn factories_receive_their_dependencies() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_value("base_url", String::from("http://localhost"));
    registry.register_factory(
        "users_url",
        vec![Token::from("base_url")],
        |mut deps: Dependencies| {
            let base = deps.take::<String>()?;
            Ok(format!("{base}/users"))
        },
    );

    let injector = block_on(testing::load_injector(registry)).unwrap();

    assert_eq!(
        injector.get::<String>(&Token::from("users_url")).as_deref(),
        Some(&String::from("http://localhost/users"))
    );
}

struct Logger {
    owner: Token,
}
impl Component for Logger {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<ParentProvider>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        let parent = deps.take_provider()?;
        let owner = parent.read().map(|provider| provider.provide().clone());
        Ok(Logger {
            owner: owner.map_err(|error| error.to_string())?,
        })
    }

    fn metadata(meta: &mut ClassMetadata<Self>) {
        meta.scope(ProviderScope::Instance);
    }
}

struct OrderService {
    logger: Arc<Logger>,
}
impl Component for OrderService {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<Logger>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(OrderService {
            logger: deps.take()?,
        })
    }
}

#[test]
fn parent_provider_resolves_to_the_requesting_provider() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<Logger>();
    registry.register_service::<OrderService>();

    let injector = block_on(testing::load_injector(registry)).unwrap();
    let orders = injector
        .get::<OrderService>(&Token::of::<OrderService>())
        .unwrap();

    assert_eq!(orders.logger.owner, Token::of::<OrderService>());
}

struct SelfAware {
    provide: Token,
    injector: Arc<Injector>,
}
impl Component for SelfAware {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<Provider>(), Token::of::<Injector>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        let provider = deps.take_provider()?;
        let provide = provider
            .read()
            .map(|provider| provider.provide().clone())
            .map_err(|error| error.to_string())?;
        Ok(SelfAware {
            provide,
            injector: deps.take()?,
        })
    }
}

#[test]
fn provider_and_injector_tokens_resolve_to_the_container() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_class::<SelfAware>();

    let injector = block_on(testing::load_injector(registry)).unwrap();
    let component = injector.get::<SelfAware>(&Token::of::<SelfAware>()).unwrap();

    assert_eq!(component.provide, Token::of::<SelfAware>());
    assert!(component.injector.has(&Token::of::<SelfAware>()));
}

struct Cache;
impl Component for Cache {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(Cache)
    }
}

#[test]
fn aliases_resolve_to_the_same_instance() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<Cache>();
    assert!(registry.register_alias(&Token::of::<Cache>(), "cache"));
    assert!(!registry.register_alias(&Token::from("missing"), "other"));

    let injector = block_on(testing::load_injector(registry)).unwrap();
    let cache = injector.get::<Cache>(&Token::of::<Cache>()).unwrap();
    let alias = injector.get::<Cache>(&Token::from("cache")).unwrap();

    assert!(Arc::ptr_eq(&cache, &alias));
    assert_eq!(
        injector.get_providers(Some(&ProviderType::Service)).len(),
        1
    );
}

#[test]
fn container_aliases_share_the_provider() {
    let injector = Injector::new(Arc::new(ProviderRegistry::new()));
    injector.add_class::<Cache>();
    assert!(injector.create_alias(&Token::of::<Cache>(), "cache"));
    injector.build().unwrap();

    assert!(injector
        .get_instance(&Token::of::<Cache>())
        .unwrap()
        .ptr_eq(&injector.get_instance(&Token::from("cache")).unwrap()));
}

#[test]
fn cloned_providers_are_independent() {
    let mut provider = Provider::new("repository");
    provider.set_deps(vec![Token::from("database")]);
    provider.set_instance(Some(trellis_di::Instance::new(1_u8)));

    let mut copy = provider.clone();
    copy.deps_mut().push(Token::from("cache"));

    assert_eq!(provider.deps(), Some(&[Token::from("database")][..]));
    assert_eq!(copy.deps().map(<[Token]>::len), Some(2));
    assert!(copy.instance().is_none());
    assert!(provider.instance().is_some());
}

#[test]
fn containers_own_their_copies_of_templates() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<Cache>();

    let first = block_on(testing::load_injector(registry.clone())).unwrap();
    let second = block_on(testing::load_injector(registry.clone())).unwrap();

    let token = Token::of::<Cache>();
    assert!(!first
        .get_instance(&token)
        .unwrap()
        .ptr_eq(&second.get_instance(&token).unwrap()));
    assert!(registry
        .get(&token)
        .is_some_and(|template| template.instance().is_none()));
}

#[test]
fn bootstrap_providers_override_registry_templates() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_value("greeting", "hello");
    let settings = BootstrapSettings::default()
        .provider(ProviderDescriptor::value("greeting", "bonjour"));

    let mut bootstrap = Bootstrap::with_registry(registry.clone(), settings).unwrap();
    block_on(bootstrap.load_injector()).unwrap();

    assert_eq!(
        bootstrap
            .injector()
            .get::<&str>(&Token::from("greeting"))
            .as_deref(),
        Some(&"bonjour")
    );
    let template = registry.get(&Token::from("greeting")).unwrap();
    let instance = template
        .construct(Dependencies::new(Vec::new()))
        .unwrap()
        .downcast::<&str>()
        .unwrap();
    assert_eq!(*instance, "hello");
}

#[test]
fn invoke_uses_overridden_dependencies() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_value("base_url", String::from("http://localhost"));
    registry.register_value("other_url", String::from("http://example.com"));
    registry.register_factory(
        "users_url",
        vec![Token::from("base_url")],
        |mut deps: Dependencies| Ok(format!("{}/users", deps.take::<String>()?)),
    );
    let injector = block_on(testing::load_injector(registry)).unwrap();

    let instance = injector
        .invoke(
            Token::from("users_url"),
            &mut LocalsContainer::new(),
            InvokeOptions {
                deps: Some(vec![Token::from("other_url")]),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(
        *instance.downcast::<String>().unwrap(),
        "http://example.com/users"
    );
}

struct Job;
impl Component for Job {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(Job)
    }
}

#[test]
fn providers_of_unbuildable_types_are_not_constructed() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.create_registry(
        ProviderType::from("job"),
        RegistrySettings {
            injectable: true,
            buildable: false,
        },
    );
    registry.register(
        ProviderDescriptor::class::<Job>().provider_type(ProviderType::from("job")),
    );

    let injector = block_on(testing::load_injector(registry)).unwrap();

    assert!(injector.has_provider(&Token::of::<Job>()));
    assert!(!injector.has(&Token::of::<Job>()));
}
