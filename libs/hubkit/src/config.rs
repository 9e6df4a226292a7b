//! Hub configuration.
//!
//! [`HubConfig`] is layered with figment: defaults, then an optional YAML file,
//! then `HUBKIT__*` environment variables (`__` separates nesting levels).
//!
//! Per-module settings live under `modules.<ModuleName>.config` and are read by
//! module constructors through [`HubServices::module_config`](crate::HubServices::module_config):
//! - lenient ([`module_config_or_default`]): a missing module, non-object entry or
//!   missing `config` key yields `T::default()`
//! - strict ([`module_config_required`]): each of those is an error

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "HUBKIT__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("module '{module}' not found")]
    ModuleNotFound { module: String },
    #[error("module '{module}' config must be an object")]
    InvalidModuleStructure { module: String },
    #[error("missing 'config' section in module '{module}'")]
    MissingConfigSection { module: String },
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to load hub config: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns raw JSON section for the module, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `hubkit=debug,info`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Outbound queue length per connection in the local transport.
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub logging: LoggingConfig,
    pub transport: TransportConfig,
    /// Raw per-module sections keyed by module name.
    pub modules: BTreeMap<String, serde_json::Value>,
}

impl HubConfig {
    /// Layered load: defaults, YAML file (if given), `HUBKIT__*` environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] if a layer cannot be read or does not match the schema.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(HubConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }
}

impl ConfigProvider for HubConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}

fn parse_section<T: DeserializeOwned>(
    module_name: &str,
    section: &serde_json::Value,
) -> Result<T, ConfigError> {
    serde_json::from_value(section.clone()).map_err(|source| ConfigError::InvalidConfig {
        module: module_name.to_owned(),
        source,
    })
}

/// Lenient loader: falls back to `T::default()` unless a `config` section exists and is invalid.
///
/// # Errors
/// Returns `ConfigError::InvalidConfig` if the config section exists but cannot be deserialized.
pub fn module_config_or_default<T: DeserializeOwned + Default>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    match provider
        .get_module_config(module_name)
        .and_then(serde_json::Value::as_object)
        .and_then(|obj| obj.get("config"))
    {
        Some(section) => parse_section(module_name, section),
        None => Ok(T::default()),
    }
}

/// Strict loader: the module entry, its object shape and its `config` key must all exist.
///
/// # Errors
/// Returns `ConfigError` if the module is not found, has invalid structure, or config is invalid.
pub fn module_config_required<T: DeserializeOwned>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    let raw = provider
        .get_module_config(module_name)
        .ok_or_else(|| ConfigError::ModuleNotFound {
            module: module_name.to_owned(),
        })?;
    let obj = raw
        .as_object()
        .ok_or_else(|| ConfigError::InvalidModuleStructure {
            module: module_name.to_owned(),
        })?;
    let section = obj
        .get("config")
        .ok_or_else(|| ConfigError::MissingConfigSection {
            module: module_name.to_owned(),
        })?;
    parse_section(module_name, section)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[derive(Debug, PartialEq, Deserialize, Default)]
    struct ChatCfg {
        #[serde(default)]
        max_length: usize,
        #[serde(default)]
        greeting: String,
    }

    fn provider() -> HubConfig {
        let mut cfg = HubConfig::default();
        cfg.modules.insert(
            "ChatHub".to_owned(),
            json!({"config": {"max_length": 280, "greeting": "hi"}}),
        );
        cfg.modules
            .insert("WeatherHub".to_owned(), json!({"other": true}));
        cfg.modules.insert("Broken".to_owned(), json!("not an object"));
        cfg.modules.insert(
            "BadTypes".to_owned(),
            json!({"config": {"max_length": "long"}}),
        );
        cfg
    }

    #[test]
    fn lenient_reads_present_section() {
        let cfg: ChatCfg = module_config_or_default(&provider(), "ChatHub").unwrap();
        assert_eq!(cfg.max_length, 280);
        assert_eq!(cfg.greeting, "hi");
    }

    #[test]
    fn lenient_defaults_when_absent_or_malformed() {
        let p = provider();
        for name in ["Nope", "WeatherHub", "Broken"] {
            let cfg: ChatCfg = module_config_or_default(&p, name).unwrap();
            assert_eq!(cfg, ChatCfg::default(), "module {name}");
        }
    }

    #[test]
    fn lenient_rejects_invalid_section() {
        let result: Result<ChatCfg, _> = module_config_or_default(&provider(), "BadTypes");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidConfig { ref module, .. }) if module == "BadTypes"
        ));
    }

    #[test]
    fn strict_reports_each_failure_kind() {
        let p = provider();
        assert!(matches!(
            module_config_required::<ChatCfg>(&p, "Nope"),
            Err(ConfigError::ModuleNotFound { .. })
        ));
        assert!(matches!(
            module_config_required::<ChatCfg>(&p, "Broken"),
            Err(ConfigError::InvalidModuleStructure { .. })
        ));
        assert!(matches!(
            module_config_required::<ChatCfg>(&p, "WeatherHub"),
            Err(ConfigError::MissingConfigSection { .. })
        ));
        assert!(module_config_required::<ChatCfg>(&p, "ChatHub").is_ok());
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let cfg = HubConfig::load(None).unwrap();
        assert_eq!(cfg.transport.channel_capacity, 64);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.modules.is_empty());
    }

    #[test]
    fn load_merges_yaml_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "transport:\n  channel_capacity: 8\nmodules:\n  ChatHub:\n    config:\n      max_length: 10\n"
        )
        .unwrap();

        let cfg = HubConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.transport.channel_capacity, 8);
        assert!(!cfg.logging.json);
        let chat: ChatCfg = module_config_required(&cfg, "ChatHub").unwrap();
        assert_eq!(chat.max_length, 10);
    }

    #[test]
    fn error_messages_name_the_module() {
        let e = ConfigError::MissingConfigSection {
            module: "ChatHub".to_owned(),
        };
        assert_eq!(e.to_string(), "missing 'config' section in module 'ChatHub'");
    }
}
