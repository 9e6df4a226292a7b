// A client interface with a renamed message resolves to its generated proxy.

use hubkit::{ClientSender, HubMessage, MessageSender, ProxyRegistry, Target, TransportError};
use std::sync::Arc;

#[derive(serde::Serialize)]
pub struct Forecast {
    pub city: String,
    pub celsius: i32,
}

#[hubkit::client_interface]
pub trait WeatherClient {
    #[hub(name = "ReceiveWeatherUpdate")]
    async fn receive_weather_update(&self, forecast: Forecast) -> Result<(), TransportError>;

    async fn alert(&self, level: u8, text: String) -> Result<(), TransportError>;
}

#[hubkit::client_interface]
trait Silent {}

struct Discard;

#[async_trait::async_trait]
impl MessageSender for Discard {
    async fn send(&self, _target: &Target, _message: HubMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let registry = ProxyRegistry::from_inventory();
    let sender = ClientSender::new(Arc::new(Discard), Target::All);
    let client: Arc<dyn WeatherClient> = registry.resolve::<dyn WeatherClient>(sender.clone()).unwrap();
    client
        .receive_weather_update(Forecast { city: "Oslo".into(), celsius: -3 })
        .await
        .unwrap();
    client.alert(2, "ice".into()).await.unwrap();

    let _: Arc<dyn Silent> = registry.resolve::<dyn Silent>(sender.clone()).unwrap();
    let _direct = WeatherClientProxy::new(sender);
}
