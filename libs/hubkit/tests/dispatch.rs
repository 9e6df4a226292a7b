#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Forwarding methods, dynamic routing and client callbacks through the local transport.

use hubkit::backends::LocalTransport;
use hubkit::{
    HubEntry, HubHost, HubServices, HubState, InvokeError, ModuleHub, TransportError,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[hubkit::client_interface]
pub trait ChatClient {
    #[hub(name = "ReceiveMessage")]
    async fn receive_message(&self, from: String, text: String) -> Result<(), TransportError>;
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("message is empty")]
    Empty,
    #[error("message exceeds {0} characters")]
    TooLong(usize),
}

/// Counts module constructions per host.
#[derive(Default)]
struct Instances(AtomicUsize);

#[hubkit::module_hub(ctor = ChatHub::from_services)]
pub struct ChatHub {
    state: HubState<dyn ChatClient>,
    max_length: usize,
}

#[hubkit::hub_methods]
impl ChatHub {
    fn from_services(services: &HubServices) -> Self {
        if let Ok(instances) = services.get::<Instances>() {
            instances.0.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            state: HubState::new(),
            max_length: 16,
        }
    }

    pub async fn send_message(&self, text: String) -> Result<String, ChatError> {
        if text.is_empty() {
            return Err(ChatError::Empty);
        }
        if text.len() > self.max_length {
            return Err(ChatError::TooLong(self.max_length));
        }
        let caller = self.caller().unwrap();
        caller
            .clients()
            .others()
            .unwrap()
            .receive_message(caller.connection_id().to_owned(), text.clone())
            .await
            .unwrap();
        Ok(text.to_uppercase())
    }

    pub async fn join_room(&self, room: String) -> anyhow::Result<()> {
        self.caller()?.groups().add(&room).await?;
        Ok(())
    }

    pub async fn say_in_room(&self, room: String, text: String) -> anyhow::Result<()> {
        let caller = self.caller()?;
        caller
            .clients()
            .others_in_group(room)?
            .receive_message(caller.connection_id().to_owned(), text)
            .await?;
        Ok(())
    }

    pub fn limit(&self) -> usize {
        self.max_length
    }
}

#[hubkit::entry_hub(modules(ChatHub))]
pub struct AppHub;

struct Fixture {
    transport: Arc<LocalTransport>,
    host: HubHost<AppHub>,
    instances: Arc<Instances>,
}

fn fixture() -> Fixture {
    let transport = Arc::new(LocalTransport::new(8));
    let services = Arc::new(HubServices::default());
    let instances = Arc::new(Instances::default());
    services.register::<Instances>(instances.clone());
    let host = HubHost::<AppHub>::builder()
        .transport(transport.clone())
        .services(services)
        .build()
        .unwrap();
    Fixture {
        transport,
        host,
        instances,
    }
}

#[tokio::test]
async fn forwarding_method_returns_the_module_result_unchanged() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();

    let reply = entry.ChatHub_send_message("hello".to_owned()).await.unwrap();

    assert_eq!(reply, "HELLO");
}

#[tokio::test]
async fn forwarding_method_propagates_the_domain_error_verbatim() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();

    let err = entry
        .ChatHub_send_message("this one is far too long".to_owned())
        .await
        .unwrap_err();

    assert_eq!(err, ChatError::TooLong(16));
}

#[tokio::test]
async fn two_forwarding_methods_share_one_attached_instance() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();
    // on_connected fan-out already resolved the module once.
    assert_eq!(f.instances.0.load(Ordering::SeqCst), 1);

    entry.ChatHub_send_message("hi".to_owned()).await.unwrap();
    assert_eq!(entry.ChatHub_limit(), 16);
    entry.ChatHub_join_room("lobby".to_owned()).await.unwrap();

    assert_eq!(f.instances.0.load(Ordering::SeqCst), 1);
    assert_eq!(entry.connection().module_count(), 1);
    let module = entry.connection().module::<ChatHub>();
    assert!(module.hub_state().is_attached());
}

#[tokio::test]
async fn each_connection_gets_its_own_instance() {
    let f = fixture();
    let _a = f.transport.connect("a", None);
    let _b = f.transport.connect("b", None);
    let a = f.host.connect("a", None).await.unwrap();
    let b = f.host.connect("b", None).await.unwrap();

    let ma = a.connection().module::<ChatHub>();
    let mb = b.connection().module::<ChatHub>();

    assert!(!Arc::ptr_eq(&ma, &mb));
    assert_eq!(ma.caller().unwrap().connection_id(), "a");
    assert_eq!(mb.caller().unwrap().connection_id(), "b");
    assert_eq!(f.instances.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn callbacks_reach_peers_with_message_name_and_ordered_arguments() {
    let f = fixture();
    let mut rx_a = f.transport.connect("a", Some("alice"));
    let mut rx_b = f.transport.connect("b", Some("bob"));
    let a = f.host.connect("a", Some("alice")).await.unwrap();
    let _b = f.host.connect("b", Some("bob")).await.unwrap();

    a.ChatHub_send_message("hey".to_owned()).await.unwrap();

    let delivered = rx_b.try_recv().unwrap();
    assert_eq!(delivered.target, "ReceiveMessage");
    assert_eq!(delivered.arguments, vec![json!("a"), json!("hey")]);
    assert!(rx_a.try_recv().is_err(), "caller is excluded from others()");
}

#[tokio::test]
async fn group_messages_skip_non_members_and_the_caller() {
    let f = fixture();
    let _rx_a = f.transport.connect("a", None);
    let mut rx_b = f.transport.connect("b", None);
    let mut rx_c = f.transport.connect("c", None);
    let a = f.host.connect("a", None).await.unwrap();
    let b = f.host.connect("b", None).await.unwrap();
    let _c = f.host.connect("c", None).await.unwrap();

    a.ChatHub_join_room("lobby".to_owned()).await.unwrap();
    b.ChatHub_join_room("lobby".to_owned()).await.unwrap();
    a.ChatHub_say_in_room("lobby".to_owned(), "psst".to_owned())
        .await
        .unwrap();

    assert_eq!(f.transport.members("lobby"), ["a", "b"]);
    assert_eq!(rx_b.try_recv().unwrap().arguments, vec![json!("a"), json!("psst")]);
    assert!(rx_c.try_recv().is_err());
}

#[tokio::test]
async fn dynamic_invoke_routes_by_name() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();

    let value = entry
        .invoke("ChatHub_send_message", vec![json!("ping")])
        .await
        .unwrap();
    assert_eq!(value, json!("PING"));

    let unit = entry
        .invoke("ChatHub_join_room", vec![json!("lobby")])
        .await
        .unwrap();
    assert_eq!(unit, serde_json::Value::Null);

    assert_eq!(AppHub::routes(), [
        "ChatHub_send_message",
        "ChatHub_join_room",
        "ChatHub_say_in_room",
        "ChatHub_limit",
    ]);
}

#[tokio::test]
async fn dynamic_invoke_reports_routing_and_argument_errors() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();

    let unknown = entry.invoke("ChatHub_shout", vec![]).await.unwrap_err();
    assert!(matches!(
        unknown,
        InvokeError::UnknownMethod { entry: "AppHub", ref method } if method == "ChatHub_shout"
    ));

    let arity = entry
        .invoke("ChatHub_send_message", vec![])
        .await
        .unwrap_err();
    assert!(matches!(
        arity,
        InvokeError::ArgumentCount { expected: 1, actual: 0, .. }
    ));

    let bad = entry
        .invoke("ChatHub_send_message", vec![json!(42)])
        .await
        .unwrap_err();
    assert!(matches!(bad, InvokeError::InvalidArgument { index: 0, .. }));
}

#[tokio::test]
async fn dynamic_invoke_keeps_the_domain_error_downcastable() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();

    let err = entry
        .invoke("ChatHub_send_message", vec![json!("")])
        .await
        .unwrap_err();

    assert_eq!(err.downcast_ref::<ChatError>(), Some(&ChatError::Empty));
}

#[tokio::test]
async fn disconnect_closes_the_context_and_drops_modules() {
    let f = fixture();
    let _rx = f.transport.connect("c-1", None);
    let entry = f.host.connect("c-1", None).await.unwrap();
    let conn = entry.connection().clone();
    let token = conn.aborted().clone();

    f.host.disconnect(entry, None).await.unwrap();

    assert!(token.is_cancelled());
    assert_eq!(conn.module_count(), 0);
    assert_eq!(<ChatHub as ModuleHub>::NAME, "ChatHub");
}
