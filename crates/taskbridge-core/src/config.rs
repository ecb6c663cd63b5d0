//! Configuration tree and `CelerySettings`.
//!
//! The tree is plain JSON. Typed sections are bound by dotted prefix:
//!
//! ```ignore
//! let config = Configuration::from_json_str(r#"{"celery": {"broker_url": "memory://", "backend_url": "rpc://"}}"#)?
//!     .with_process_env();
//! let settings = CelerySettings::from_config(&config)?;
//! ```
//!
//! Environment overrides use `__` as the path separator: `CELERY__BROKER_URL`
//! sets `celery.broker_url`.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration section '{0}' is missing")]
    MissingSection(String),

    #[error("configuration section '{prefix}' is invalid: {source}")]
    Invalid {
        prefix: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("unsupported broker url: {0}")]
    UnsupportedBroker(String),

    #[error("unsupported result backend url: {0}")]
    UnsupportedBackend(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    tree: Value,
}

impl Configuration {
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    pub fn from_value(tree: Value) -> Self {
        Self { tree }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map(Self::from_value).map_err(ConfigError::Parse)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Apply `SECTION__KEY=value` overrides. Names without `__` are ignored.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, raw) in vars {
            let name = name.as_ref();
            if !name.contains("__") {
                continue;
            }
            let path: Vec<String> = name.split("__").map(str::to_lowercase).collect();
            if path.iter().any(String::is_empty) {
                continue;
            }
            set_path(&mut self.tree, &path, parse_scalar(raw.as_ref()));
        }
        self
    }

    pub fn with_process_env(self) -> Self {
        self.with_env_overrides(std::env::vars())
    }

    /// Value at a dotted path (`"celery.broker_url"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.tree, |node, segment| node.get(segment))
    }

    /// Deserialize the section under `prefix`.
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigError> {
        let section = self
            .get(prefix)
            .ok_or_else(|| ConfigError::MissingSection(prefix.to_string()))?;
        T::deserialize(section).map_err(|source| ConfigError::Invalid {
            prefix: prefix.to_string(),
            source,
        })
    }
}

fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

fn set_path(tree: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.clone(), value);
    }
}

/// Settings needed to create the task-queue application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelerySettings {
    pub broker_url: String,
    pub backend_url: String,
    #[serde(default = "default_track_started")]
    pub task_track_started: bool,
}

fn default_track_started() -> bool {
    true
}

impl CelerySettings {
    pub const PREFIX: &'static str = "celery";

    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        config.bind(Self::PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn base() -> Configuration {
        Configuration::from_value(json!({
            "celery": {
                "broker_url": "memory://",
                "backend_url": "rpc://"
            }
        }))
    }

    #[test]
    fn binds_settings_with_defaults() {
        let settings = CelerySettings::from_config(&base()).unwrap();
        assert_eq!(settings.broker_url, "memory://");
        assert_eq!(settings.backend_url, "rpc://");
        assert!(settings.task_track_started);
    }

    #[test]
    fn missing_section_is_reported() {
        let err = CelerySettings::from_config(&Configuration::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection(p) if p == "celery"));
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let config = Configuration::from_value(json!({ "celery": { "broker_url": "memory://" } }));
        let err = CelerySettings::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("backend_url"));
    }

    #[test]
    fn env_overrides_replace_and_create_keys() {
        let config = base().with_env_overrides([
            ("CELERY__BROKER_URL", "memory://other"),
            ("CELERY__TASK_TRACK_STARTED", "false"),
            ("WORKER__CONCURRENCY", "4"),
            ("PATH", "/usr/bin"),
        ]);

        let settings = CelerySettings::from_config(&config).unwrap();
        assert_eq!(settings.broker_url, "memory://other");
        assert!(!settings.task_track_started);
        assert_eq!(config.get("worker.concurrency"), Some(&json!(4)));
        assert_eq!(config.get("path"), None);
    }

    #[rstest]
    #[case("true", json!(true))]
    #[case("false", json!(false))]
    #[case("42", json!(42))]
    #[case("-1", json!(-1))]
    #[case("redis://localhost", json!("redis://localhost"))]
    fn scalars_are_parsed(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(parse_scalar(raw), expected);
    }

    #[test]
    fn parses_json_source() {
        let config = Configuration::from_json_str(r#"{"celery": {"broker_url": "a", "backend_url": "b", "task_track_started": false}}"#).unwrap();
        let settings = CelerySettings::from_config(&config).unwrap();
        assert!(!settings.task_track_started);
        assert!(Configuration::from_json_str("{not json").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("taskbridge-missing-{}.json", ulid::Ulid::new()));
        let err = Configuration::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn reads_json_file() {
        let path = std::env::temp_dir().join(format!("taskbridge-config-{}.json", ulid::Ulid::new()));
        std::fs::write(&path, r#"{"celery": {"broker_url": "memory://", "backend_url": "memory://"}}"#).unwrap();

        let loaded = Configuration::from_json_file(&path);
        std::fs::remove_file(&path).unwrap();

        let settings = CelerySettings::from_config(&loaded.unwrap()).unwrap();
        assert_eq!(settings.broker_url, "memory://");
        assert_eq!(settings.backend_url, "memory://");
    }

    #[test]
    fn process_env_overrides_the_tree() {
        // このテスト専用の変数名なので他のテストとは干渉しない
        let name = format!("TASKBRIDGE_{}__BROKER_URL", ulid::Ulid::new());
        // SAFETY: the variable is unique to this test and only read through std::env.
        unsafe { std::env::set_var(&name, "memory://from-env") };

        let config = Configuration::new().with_process_env();
        let section = name.split("__").next().unwrap().to_lowercase();

        unsafe { std::env::remove_var(&name) };
        assert_eq!(
            config.get(&format!("{section}.broker_url")),
            Some(&json!("memory://from-env"))
        );
    }
}
