use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{env::Env, errors::ConfigError, provider::ConfigProvider};

pub const ROOT_DIR: &str = "root_dir";
pub const ENV: &str = "env";

const ROOT_DIR_PLACEHOLDER: &str = "${root_dir}";

/// Application settings.
///
/// Values are JSON and addressed by dotted paths (`"server.port"`). Strings
/// read back have `${root_dir}` replaced by the configured root directory.
/// Typed configs live next to the JSON values in a [`ConfigProvider`].
pub struct Settings {
    values: RwLock<Map<String, Value>>,
    configs: RwLock<ConfigProvider>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Settings").field("values", &*values).finish()
    }
}

impl Settings {
    /// Settings seeded with the current directory as `root_dir` and the
    /// profile from `TRELLIS_ENV`
    pub fn new() -> Self {
        let settings = Self::empty();
        let root_dir = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| ".".to_string());

        settings.insert_top_level(ROOT_DIR, Value::String(root_dir));
        settings.insert_top_level(ENV, Value::String(Env::from_env().as_str().to_string()));
        settings
    }

    /// Settings without any value
    pub fn empty() -> Self {
        Settings {
            values: RwLock::new(Map::new()),
            configs: RwLock::new(ConfigProvider::new()),
        }
    }

    /// Returns the resolved value stored at `path`
    pub fn get_value(&self, path: &str) -> Option<Value> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let root_dir = root_dir_of(&values);
        lookup(&values, path).map(|value| resolve(value.clone(), &root_dir))
    }

    /// Returns the value at `path` converted into `T`
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ConfigError> {
        self.get_value(path)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| ConfigError::Conversion {
                    path: path.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Stores `value` at `path`, creating intermediate objects
    pub fn set<T: Serialize>(&self, path: &str, value: T) -> Result<(), ConfigError> {
        let value = serde_json::to_value(value).map_err(|source| ConfigError::Conversion {
            path: path.to_string(),
            source,
        })?;
        self.set_value(path, value)
    }

    pub fn set_value(&self, path: &str, value: Value) -> Result<(), ConfigError> {
        let segments = split_path(path)?;
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::InvalidPath(path.to_string()))?;

        let mut current = &mut *values;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry
                .as_object_mut()
                .ok_or_else(|| ConfigError::InvalidPath(path.to_string()))?;
        }

        trace!("Setting {path}");
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Sets every entry of `values`; keys may be dotted paths
    pub fn merge(&self, values: Map<String, Value>) -> Result<(), ConfigError> {
        for (key, value) in values {
            self.set_value(&key, value)?;
        }
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&values, path).is_some()
    }

    /// Snapshot of all top level entries, resolved
    pub fn entries(&self) -> Vec<(String, Value)> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let root_dir = root_dir_of(&values);
        values
            .iter()
            .map(|(key, value)| (key.clone(), resolve(value.clone(), &root_dir)))
            .collect()
    }

    pub fn root_dir(&self) -> PathBuf {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        PathBuf::from(root_dir_of(&values))
    }

    pub fn set_root_dir(&self, root_dir: impl Into<PathBuf>) {
        let root_dir = root_dir.into().display().to_string();
        self.insert_top_level(ROOT_DIR, Value::String(root_dir));
    }

    pub fn env(&self) -> Env {
        self.get_value(ENV)
            .and_then(|value| value.as_str().and_then(|env| env.parse().ok()))
            .unwrap_or_default()
    }

    pub fn set_env(&self, env: Env) {
        self.insert_top_level(ENV, Value::String(env.as_str().to_string()));
    }

    /// Registers a typed config, failing if one of the same type exists
    pub fn add_config<T: Send + Sync + 'static>(&self, config: T) -> Result<(), ConfigError> {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        configs.insert(config)?;
        Ok(())
    }

    pub fn get_config<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        configs.get()
    }

    pub fn require_config<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        configs.require()
    }

    fn insert_top_level(&self, key: &str, value: Value) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, ConfigError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(ConfigError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn lookup<'a>(values: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn root_dir_of(values: &Map<String, Value>) -> String {
    values
        .get(ROOT_DIR)
        .and_then(Value::as_str)
        .unwrap_or(".")
        .to_string()
}

fn resolve(value: Value, root_dir: &str) -> Value {
    match value {
        Value::String(text) if text.contains(ROOT_DIR_PLACEHOLDER) => {
            Value::String(text.replace(ROOT_DIR_PLACEHOLDER, root_dir))
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| resolve(item, root_dir))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, resolve(item, root_dir)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_and_writes_dotted_paths() {
        let settings = Settings::empty();
        settings.set("server.port", 8080).unwrap();
        settings.set("server.host", "localhost").unwrap();

        assert_eq!(settings.get::<u16>("server.port").unwrap(), Some(8080));
        assert_eq!(
            settings.get_value("server").unwrap(),
            json!({"port": 8080, "host": "localhost"})
        );
        assert!(settings.get_value("server.missing").is_none());
        assert!(settings.get_value("missing.port").is_none());
    }

    #[test]
    fn interpolates_root_dir_in_strings() {
        let settings = Settings::empty();
        settings.set_root_dir("/srv/app");
        settings
            .set("mount", json!(["${root_dir}/controllers", "static"]))
            .unwrap();

        assert_eq!(
            settings.get_value("mount").unwrap(),
            json!(["/srv/app/controllers", "static"])
        );
    }

    #[test]
    fn rejects_paths_through_scalars() {
        let settings = Settings::empty();
        settings.set("port", 8080).unwrap();

        assert!(matches!(
            settings.set("port.inner", 1),
            Err(ConfigError::InvalidPath(_))
        ));
        assert!(matches!(
            settings.set("a..b", 1),
            Err(ConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn conversion_errors_name_the_path() {
        let settings = Settings::empty();
        settings.set("port", "not a number").unwrap();

        let error = settings.get::<u16>("port").unwrap_err();
        assert!(error.to_string().contains("'port'"));
    }

    #[test]
    fn env_round_trips() {
        let settings = Settings::empty();
        assert_eq!(settings.env(), Env::Development);

        settings.set_env(Env::Production);
        assert_eq!(settings.env(), Env::Production);
    }

    #[test]
    fn merges_maps() {
        let settings = Settings::empty();
        let values = json!({"logger.level": "debug", "name": "app"});
        settings
            .merge(values.as_object().cloned().unwrap_or_default())
            .unwrap();

        assert_eq!(settings.get::<String>("logger.level").unwrap().unwrap(), "debug");
        assert!(settings.contains("name"));
    }

    #[test]
    fn keeps_typed_configs() {
        let settings = Settings::empty();
        settings.add_config(42_u32).unwrap();

        assert_eq!(settings.get_config::<u32>().as_deref(), Some(&42));
        assert!(settings.add_config(7_u32).is_err());
        assert!(settings.require_config::<u64>().is_err());
    }
}
