// Modules with and without a client interface, attached to generated and manual entry hubs.

use hubkit::{
    EntryLifecycle, HubConnection, HubEntry, HubServices, HubState, LifecycleError, ModuleHub,
    ModuleMethods, TransportError,
};

#[hubkit::client_interface]
pub trait ChatClient {
    async fn receive_message(&self, from: String, text: String) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
#[error("message too long")]
pub struct TooLong;

#[hubkit::module_hub]
#[derive(Default)]
pub struct ChatHub {
    state: HubState<dyn ChatClient>,
    limit: usize,
}

#[hubkit::hub_methods]
impl ChatHub {
    pub async fn send_message(&self, text: String) -> Result<usize, TooLong> {
        if self.limit > 0 && text.len() > self.limit {
            return Err(TooLong);
        }
        Ok(text.len())
    }

    pub fn history_len(&self) -> usize {
        0
    }

    async fn on_connected(&self) -> anyhow::Result<()> {
        let _ = self.caller()?;
        Ok(())
    }

    async fn on_disconnected(&self, _cause: Option<&anyhow::Error>) -> anyhow::Result<()> {
        Ok(())
    }
}

fn counter_from(services: &HubServices) -> Counter {
    let _ = services.len();
    Counter {
        state: HubState::new(),
    }
}

#[hubkit::module_hub(ctor = counter_from)]
pub struct Counter {
    state: hubkit::HubState,
}

#[hubkit::hub_methods]
impl Counter {
    pub fn new() -> Self {
        Counter {
            state: HubState::new(),
        }
    }

    pub async fn bump(&self, by: u32) -> u32 {
        by
    }
}

#[hubkit::entry_hub(modules(ChatHub), modules(Counter))]
pub struct AppHub;

#[hubkit::entry_hub(modules(Counter), lifecycle = manual)]
pub struct ManualHub {
    conn: HubConnection,
    greeting: String,
}

#[async_trait::async_trait]
impl EntryLifecycle for ManualHub {
    async fn on_connected(&self) -> Result<(), LifecycleError> {
        let _ = &self.greeting;
        self.modules_on_connected().await
    }
}

fn main() {
    assert_eq!(<ChatHub as ModuleHub>::NAME, "ChatHub");
    assert_eq!(
        <ChatHub as ModuleMethods>::ROUTES,
        &["ChatHub_send_message", "ChatHub_history_len"]
    );
    assert_eq!(<Counter as ModuleMethods>::ROUTES, &["Counter_bump"]);
    assert_eq!(AppHub::routes().len(), 3);
    assert_eq!(<ManualHub as HubEntry>::MODULES.len(), 1);
    let _ = Counter::new();
}
