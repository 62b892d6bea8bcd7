//! Trellis Config provides the settings store shared by the rest of the
//! framework.
//!
//! Trellis Config is split into three parts:
//! 1. Settings: JSON values addressed by dotted paths, with `${root_dir}`
//!    interpolation and typed configs
//! 2. ConfigProvider: a registry of typed configs, keyed by type
//! 3. Env: the environment profile (production, development, test)
//!
//! # Examples
//!
//! ```rust
//! use trellis_config::{settings::Settings, env::Env};
//!
//! #[derive(Clone)]
//! struct AppConfig {
//!     app_name: String,
//! }
//!
//! let settings = Settings::empty();
//! settings.set_root_dir("/srv/app");
//! settings.set("server.port", 8080).unwrap();
//! settings.set("server.static", "${root_dir}/public").unwrap();
//! settings.set_env(Env::Test);
//!
//! assert_eq!(settings.get::<u16>("server.port").unwrap(), Some(8080));
//! assert_eq!(
//!     settings.get::<String>("server.static").unwrap().as_deref(),
//!     Some("/srv/app/public")
//! );
//!
//! settings
//!     .add_config(AppConfig { app_name: "My Awesome App".to_string() })
//!     .unwrap();
//! let config = settings.require_config::<AppConfig>().unwrap();
//! assert_eq!(config.app_name, "My Awesome App");
//! ```

pub mod env;
pub mod errors;
pub mod provider;
pub mod settings;

pub use env::Env;
pub use errors::ConfigError;
pub use provider::ConfigProvider;
pub use settings::Settings;
