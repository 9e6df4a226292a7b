//! Weather subscriptions.
//!
//! A connection subscribes to a city and joins the `weather:<city>` group;
//! forecasts published for that city reach every subscriber through
//! `ReceiveWeatherUpdate`.

use hubkit::{
    HubClients, HubServices, HubState, ModuleHub, ProxyError, StateError, TransportError,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub id: Uuid,
    pub city: String,
    pub celsius: f64,
    pub summary: String,
}

impl Forecast {
    pub fn new(city: impl Into<String>, celsius: f64, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            city: city.into(),
            celsius,
            summary: summary.into(),
        }
    }
}

#[hubkit::client_interface]
pub trait WeatherClient {
    #[hub(name = "ReceiveWeatherUpdate")]
    async fn receive_weather_update(&self, forecast: Forecast) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// Cities peers may subscribe to.
    pub cities: Vec<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            cities: vec!["Oslo".to_owned(), "Lima".to_owned()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("city '{0}' is not served by this hub")]
    UnknownCity(String),
    #[error(transparent)]
    Detached(#[from] StateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

pub fn city_group(city: &str) -> String {
    format!("weather:{city}")
}

/// Push `forecast` to every subscriber of its city.
///
/// # Errors
/// Fails if the proxy cannot be resolved or the transport rejects the message.
pub async fn publish(
    clients: &HubClients<dyn WeatherClient>,
    forecast: Forecast,
) -> Result<(), WeatherError> {
    tracing::info!(city = %forecast.city, id = %forecast.id, "publishing forecast");
    clients
        .group(city_group(&forecast.city))?
        .receive_weather_update(forecast)
        .await?;
    Ok(())
}

#[hubkit::module_hub(ctor = WeatherHub::from_services)]
pub struct WeatherHub {
    state: HubState<dyn WeatherClient>,
    config: WeatherConfig,
    subscriptions: Mutex<BTreeSet<String>>,
}

#[hubkit::hub_methods]
impl WeatherHub {
    fn from_services(services: &HubServices) -> Self {
        let config = services
            .module_config::<WeatherConfig>(Self::NAME)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid weather config; using defaults");
                WeatherConfig::default()
            });
        Self {
            state: HubState::new(),
            config,
            subscriptions: Mutex::default(),
        }
    }

    pub fn cities(&self) -> Vec<String> {
        self.config.cities.clone()
    }

    pub async fn subscribe(&self, city: String) -> Result<(), WeatherError> {
        if !self.config.cities.contains(&city) {
            return Err(WeatherError::UnknownCity(city));
        }
        self.caller()?.groups().add(&city_group(&city)).await?;
        self.subscriptions.lock().insert(city);
        Ok(())
    }

    pub async fn unsubscribe(&self, city: String) -> Result<(), WeatherError> {
        if self.subscriptions.lock().remove(&city) {
            self.caller()?.groups().remove(&city_group(&city)).await?;
        }
        Ok(())
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().iter().cloned().collect()
    }

    async fn on_disconnected(&self, _cause: Option<&anyhow::Error>) -> Result<(), WeatherError> {
        let cities = std::mem::take(&mut *self.subscriptions.lock());
        let caller = self.caller()?;
        for city in cities {
            caller.groups().remove(&city_group(&city)).await?;
        }
        Ok(())
    }
}
