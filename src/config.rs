//! Configuration for the injector.
//!
//! Options are read from an ordered list of configuration sources:
//! environment variables (optionally prefixed), JSON files behind the
//! `config` feature, or any custom [`ConfigSource`].

use std::collections::HashMap;
use std::env;

use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::type_index::DEFAULT_UNWRAP_DEPTH;
use crate::{DiError, DiResult};

/// Prefix used by [`InjectorOptions::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_LOCATOR";

/// Configuration provider reading from sources in priority order.
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<HashMap<String, ConfigValue>>,
}

impl std::fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("sources", &self.sources)
            .field("cache", &self.cache.read().len())
            .finish()
    }
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_string(&self) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(DiError::Configuration(format!("expected a string, got {:?}", other))),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(DiError::Configuration(format!("expected an integer, got {:?}", other))),
        }
    }

    /// Booleans, plus the integers 0 and 1.
    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::Integer(0) => Ok(false),
            ConfigValue::Integer(1) => Ok(true),
            other => Err(DiError::Configuration(format!("expected a boolean, got {:?}", other))),
        }
    }

    pub fn as_usize(&self) -> DiResult<usize> {
        let value = self.as_i64()?;
        usize::try_from(value)
            .map_err(|_| DiError::Configuration(format!("{} is not a valid count", value)))
    }
}

/// A source of configuration values.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Value for a dotted key such as `injector.max_depth`.
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// Every key this source knows about.
    fn keys(&self) -> Vec<String>;
}

/// Environment variables; `injector.max_depth` with prefix `APP` is read
/// from `APP_INJECTOR_MAX_DEPTH`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn variable_name(&self, key: &str) -> String {
        let key = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable_name(key)).ok().map(|value| {
            if let Ok(int_val) = value.parse::<i64>() {
                ConfigValue::Integer(int_val)
            } else if let Ok(float_val) = value.parse::<f64>() {
                ConfigValue::Float(float_val)
            } else if let Ok(bool_val) = value.parse::<bool>() {
                ConfigValue::Boolean(bool_val)
            } else {
                ConfigValue::String(value)
            }
        })
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// JSON configuration, flat or nested.
///
/// Nested objects are addressed with dotted keys: `{"injector": {"max_depth": 8}}`
/// answers `injector.max_depth`.
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    values: HashMap<String, ConfigValue>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> DiResult<Self> {
        let parsed: HashMap<String, ConfigValue> = serde_json::from_str(json)
            .map_err(|e| DiError::Configuration(format!("invalid JSON configuration: {}", e)))?;
        let mut values = HashMap::new();
        flatten(String::new(), parsed, &mut values);
        Ok(Self { values })
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> DiResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DiError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

#[cfg(feature = "config")]
fn flatten(prefix: String, values: HashMap<String, ConfigValue>, out: &mut HashMap<String, ConfigValue>) {
    for (key, value) in values {
        let full = if prefix.is_empty() { key } else { format!("{}.{}", prefix, key) };
        match value {
            ConfigValue::Object(nested) => flatten(full, nested, out),
            value => {
                out.insert(full, value);
            }
        }
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a source; earlier sources take priority.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// First value for `key`, checking sources in priority order.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.cache.read().get(key) {
            return Some(value.clone());
        }
        let value = self.sources.iter().find_map(|source| source.get(key))?;
        self.cache.write().insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn get_bool(&self, key: &str) -> DiResult<bool> {
        self.require(key)?.as_bool()
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str) -> DiResult<usize> {
        self.require(key)?.as_usize()
    }

    pub fn get_usize_or(&self, key: &str, default: usize) -> usize {
        self.get_usize(key).unwrap_or(default)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.require(key)
            .and_then(|value| value.as_string().map(str::to_string))
            .unwrap_or_else(|_| default.to_string())
    }

    fn require(&self, key: &str) -> DiResult<ConfigValue> {
        self.get(key)
            .ok_or_else(|| DiError::Configuration(format!("key not found: {}", key)))
    }

    /// Forces the next reads to go back to the sources.
    pub fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|s| s.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        let mut provider = Self::new();
        provider.add_source(Box::new(EnvironmentConfigSource::with_prefix(ENV_PREFIX)));
        provider
    }
}

/// Switches and limits of the injection pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InjectorOptions {
    /// Resolve constructor parameters as services. When off, only
    /// parameterless constructors are used.
    pub constructor_injection: bool,
    /// Consult the external asset catalog for catalog-keyed declarations.
    pub catalog_lookup: bool,
    /// Warn when several scoped providers are equally near.
    pub ambiguity_warnings: bool,
    /// Treat every failed scene lookup as silent.
    pub suppress_missing_scene_warnings: bool,
    /// Indirection steps followed when converting located objects.
    pub max_unwrap_depth: usize,
    /// Nested construction depth before giving up.
    pub max_depth: usize,
    pub log_service_creation: bool,
    pub log_lazy_init: bool,
    pub log_cross_injection: bool,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        Self {
            constructor_injection: true,
            catalog_lookup: true,
            ambiguity_warnings: true,
            suppress_missing_scene_warnings: false,
            max_unwrap_depth: DEFAULT_UNWRAP_DEPTH,
            max_depth: 64,
            log_service_creation: false,
            log_lazy_init: false,
            log_cross_injection: false,
        }
    }
}

impl InjectorOptions {
    /// Loads options from a config provider; missing keys keep defaults.
    pub fn load(config: &ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            constructor_injection: config
                .get_bool_or("injector.constructor_injection", defaults.constructor_injection),
            catalog_lookup: config.get_bool_or("injector.catalog_lookup", defaults.catalog_lookup),
            ambiguity_warnings: config
                .get_bool_or("injector.ambiguity_warnings", defaults.ambiguity_warnings),
            suppress_missing_scene_warnings: config.get_bool_or(
                "injector.suppress_missing_scene_warnings",
                defaults.suppress_missing_scene_warnings,
            ),
            max_unwrap_depth: config.get_usize_or("injector.max_unwrap_depth", defaults.max_unwrap_depth),
            max_depth: config.get_usize_or("injector.max_depth", defaults.max_depth).max(1),
            log_service_creation: config
                .get_bool_or("debug.log_service_creation", defaults.log_service_creation),
            log_lazy_init: config.get_bool_or("debug.log_lazy_init", defaults.log_lazy_init),
            log_cross_injection: config
                .get_bool_or("debug.log_cross_injection", defaults.log_cross_injection),
        }
    }

    /// Options from `FERROUS_LOCATOR_*` environment variables.
    pub fn from_env() -> Self {
        Self::load(&ConfigProvider::default())
    }
}
