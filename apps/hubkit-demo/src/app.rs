//! The demo entry hub and a scripted session over the in-process transport.

use hubkit::backends::LocalTransport;
use hubkit::{HubConfig, HubEntry, HubHost, HubMessage, ModuleHub, config::module_config_or_default};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chat::{ChatConfig, ChatHub, ChatHubDispatch};
use crate::weather::{self, Forecast, WeatherClient, WeatherConfig, WeatherHub, WeatherHubDispatch};

#[hubkit::entry_hub(modules(WeatherHub), modules(ChatHub))]
pub struct AppHub;

/// A message one simulated peer received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub connection_id: String,
    #[serde(flatten)]
    pub message: HubMessage,
}

/// Validate every module section against the modules `AppHub` attaches.
///
/// # Errors
/// Fails on a section for an unknown module or one that does not parse.
pub fn check_modules(config: &HubConfig) -> anyhow::Result<()> {
    if let Some(unknown) = config
        .modules
        .keys()
        .find(|name| !AppHub::MODULES.iter().any(|m| m.name == name.as_str()))
    {
        anyhow::bail!("config names module '{unknown}', which {} does not attach", AppHub::NAME);
    }
    module_config_or_default::<WeatherConfig>(config, WeatherHub::NAME)?;
    module_config_or_default::<ChatConfig>(config, ChatHub::NAME)?;
    Ok(())
}

struct Peer {
    connection_id: &'static str,
    inbox: mpsc::Receiver<HubMessage>,
}

impl Peer {
    fn drain(&mut self, out: &mut Vec<Delivery>) {
        while let Ok(message) = self.inbox.try_recv() {
            out.push(Delivery {
                connection_id: self.connection_id.to_owned(),
                message,
            });
        }
    }
}

/// Two peers subscribe to a city and share a chat room; one forecast is
/// published from outside any connection. Returns what each peer received.
///
/// # Errors
/// Fails if the host cannot be built or any hub call fails.
pub async fn run_session(config: HubConfig) -> anyhow::Result<Vec<Delivery>> {
    let transport = Arc::new(LocalTransport::from_config(&config.transport));
    let cities = module_config_or_default::<WeatherConfig>(&config, WeatherHub::NAME)?.cities;
    let city = cities
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("weather config lists no cities"))?;
    let host = HubHost::<AppHub>::builder()
        .transport(transport.clone())
        .config(Arc::new(config))
        .build::<AppHub>()?;
    tracing::info!(routes = ?AppHub::routes(), "hub ready");

    let mut peers = Vec::new();
    let mut entries = Vec::new();
    for (connection_id, user_id) in [("conn-alice", "alice"), ("conn-bob", "bob")] {
        let inbox = transport.connect(connection_id, Some(user_id));
        entries.push(host.connect(connection_id, Some(user_id)).await?);
        peers.push(Peer {
            connection_id,
            inbox,
        });
    }
    let [alice, bob] = entries.as_slice() else {
        anyhow::bail!("expected two simulated connections");
    };

    alice.WeatherHub_subscribe(city.clone()).await?;
    bob.WeatherHub_subscribe(city.clone()).await?;
    alice.ChatHub_join_room("lobby".to_owned()).await?;
    bob.ChatHub_join_room("lobby".to_owned()).await?;

    weather::publish(
        &host.clients::<dyn WeatherClient>(),
        Forecast::new(city.as_str(), 4.5, "light snow"),
    )
    .await?;

    alice
        .ChatHub_send_message("lobby".to_owned(), format!("snow in {city} again"))
        .await?;
    // Same call as a remote peer would issue it: route name plus positional JSON.
    bob.invoke(
        "ChatHub_send_message",
        vec![json!("lobby"), json!("bring a scarf")],
    )
    .await?;

    for entry in entries {
        host.disconnect(entry, None).await?;
    }
    for peer in &peers {
        transport.disconnect(peer.connection_id);
    }

    let mut deliveries = Vec::new();
    for peer in &mut peers {
        peer.drain(&mut deliveries);
    }
    Ok(deliveries)
}
