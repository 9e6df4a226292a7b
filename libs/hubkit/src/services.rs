//! Shared services handed to module constructors.
//!
//! Modules are instantiated once per connection, so anything that must outlive a
//! connection (stores, clocks, external API clients) is registered here once at
//! host startup and fetched by interface type inside the module constructor.
//!
//! Implementation details:
//! - Key = `type_name::<T>()`, which works for `T = dyn Trait`.
//! - Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on read).
//! - Re-registering overwrites the previous value; existing `Arc`s stay valid.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use crate::config::{ConfigError, ConfigProvider, module_config_or_default, module_config_required};

/// Stable type key for trait objects.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service not registered: type={type_key:?}")]
    NotFound { type_key: TypeKey },

    #[error("type mismatch in services for type={type_key:?}")]
    TypeMismatch { type_key: TypeKey },
}

type Boxed = Box<dyn Any + Send + Sync>;

struct EmptyConfig;

impl ConfigProvider for EmptyConfig {
    fn get_module_config(&self, _module_name: &str) -> Option<&serde_json::Value> {
        None
    }
}

/// Type-safe registry of shared services plus module configuration.
pub struct HubServices {
    map: RwLock<HashMap<TypeKey, Boxed>>,
    config: Arc<dyn ConfigProvider>,
}

impl HubServices {
    #[must_use]
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a service under the interface type `T`.
    /// `T` can be a trait object like `dyn my_app::ForecastStore`.
    pub fn register<T>(&self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.map.write().insert(TypeKey::of::<T>(), Box::new(service));
    }

    /// Fetch a service by interface type `T`.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotFound`] if nothing is registered under `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_key = TypeKey::of::<T>();
        let r = self.map.read();
        let boxed = r.get(&type_key).ok_or(ServiceError::NotFound { type_key })?;

        // Stored value is exactly `Arc<T>`.
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ServiceError::TypeMismatch { type_key })
    }

    /// Remove a service; returns it if it was present.
    pub fn remove<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let boxed = self.map.write().remove(&TypeKey::of::<T>())?;
        boxed.downcast::<Arc<T>>().ok().map(|b| *b)
    }

    /// Typed `modules.<name>.config` section, or `T::default()` when absent.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidConfig`] if the section exists but does not parse.
    pub fn module_config<T: DeserializeOwned + Default>(
        &self,
        module_name: &str,
    ) -> Result<T, ConfigError> {
        module_config_or_default(&*self.config, module_name)
    }

    /// Typed `modules.<name>.config` section that must be present.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the section is missing or invalid.
    pub fn module_config_required<T: DeserializeOwned>(
        &self,
        module_name: &str,
    ) -> Result<T, ConfigError> {
        module_config_required(&*self.config, module_name)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Default for HubServices {
    fn default() -> Self {
        Self::new(Arc::new(EmptyConfig))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed(u64);
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn register_and_get_dyn_trait() {
        let services = HubServices::default();
        let clock: Arc<dyn Clock> = Arc::new(Fixed(7));
        services.register::<dyn Clock>(clock.clone());

        let got = services.get::<dyn Clock>().unwrap();
        assert_eq!(got.now(), 7);
        assert!(Arc::ptr_eq(&clock, &got));
    }

    #[test]
    fn missing_service_names_the_type() {
        let services = HubServices::default();
        match services.get::<dyn Clock>() {
            Err(ServiceError::NotFound { type_key }) => {
                assert!(format!("{type_key:?}").contains("Clock"));
            }
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn re_registering_overwrites_and_remove_takes_it_out() {
        let services = HubServices::default();
        services.register::<dyn Clock>(Arc::new(Fixed(1)));
        services.register::<dyn Clock>(Arc::new(Fixed(2)));
        assert_eq!(services.len(), 1);
        assert_eq!(services.get::<dyn Clock>().unwrap().now(), 2);

        let removed = services.remove::<dyn Clock>().unwrap();
        assert_eq!(removed.now(), 2);
        assert!(services.is_empty());
        assert!(services.remove::<dyn Clock>().is_none());
    }

    struct OneModule(serde_json::Value);
    impl ConfigProvider for OneModule {
        fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
            (module_name == "WeatherHub").then_some(&self.0)
        }
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct WeatherCfg {
        #[serde(default)]
        interval_secs: u64,
    }

    #[test]
    fn module_config_reads_section_or_defaults() {
        let services = HubServices::new(Arc::new(OneModule(
            json!({"config": {"interval_secs": 30}}),
        )));

        let cfg: WeatherCfg = services.module_config("WeatherHub").unwrap();
        assert_eq!(cfg.interval_secs, 30);

        let other: WeatherCfg = services.module_config("ChatHub").unwrap();
        assert_eq!(other, WeatherCfg::default());

        assert!(
            services
                .module_config_required::<WeatherCfg>("ChatHub")
                .is_err()
        );
    }
}
