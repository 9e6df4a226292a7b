//! Chat rooms over hub groups.

use hubkit::{HubServices, HubState, ModuleHub, ProxyError, StateError, TransportError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room: String,
    pub from: String,
    pub text: String,
}

#[hubkit::client_interface]
pub trait ChatClient {
    #[hub(name = "ReceiveMessage")]
    async fn receive_message(&self, message: ChatMessage) -> Result<(), TransportError>;

    #[hub(name = "UserJoined")]
    async fn user_joined(&self, room: String, user: String) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 280,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message is longer than {max} characters")]
    TooLong { max: usize },
    #[error("not a member of room '{0}'")]
    NotInRoom(String),
    #[error(transparent)]
    Detached(#[from] StateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

fn room_group(room: &str) -> String {
    format!("chat:{room}")
}

#[hubkit::module_hub(ctor = ChatHub::from_services)]
pub struct ChatHub {
    state: HubState<dyn ChatClient>,
    config: ChatConfig,
    rooms: Mutex<BTreeSet<String>>,
}

#[hubkit::hub_methods]
impl ChatHub {
    fn from_services(services: &HubServices) -> Self {
        let config = services
            .module_config::<ChatConfig>(Self::NAME)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid chat config; using defaults");
                ChatConfig::default()
            });
        Self {
            state: HubState::new(),
            config,
            rooms: Mutex::default(),
        }
    }

    /// Display name of the caller: user id when authenticated, else connection id.
    fn speaker(&self) -> Result<String, ChatError> {
        let caller = self.caller()?;
        Ok(caller
            .user_id()
            .unwrap_or(caller.connection_id())
            .to_owned())
    }

    pub async fn join_room(&self, room: String) -> Result<(), ChatError> {
        let caller = self.caller()?;
        caller.groups().add(&room_group(&room)).await?;
        if !self.rooms.lock().insert(room.clone()) {
            return Ok(());
        }
        let user = self.speaker()?;
        caller
            .clients()
            .others_in_group(room_group(&room))?
            .user_joined(room, user)
            .await?;
        Ok(())
    }

    pub async fn send_message(&self, room: String, text: String) -> Result<Uuid, ChatError> {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let max = self.config.max_message_length;
        if text.chars().count() > max {
            return Err(ChatError::TooLong { max });
        }
        if !self.rooms.lock().contains(&room) {
            return Err(ChatError::NotInRoom(room));
        }

        let message = ChatMessage {
            id: Uuid::now_v7(),
            from: self.speaker()?,
            room,
            text,
        };
        let id = message.id;
        self.caller()?
            .clients()
            .group(room_group(&message.room))?
            .receive_message(message)
            .await?;
        Ok(id)
    }

    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }

    async fn on_connected(&self) -> Result<(), ChatError> {
        tracing::debug!(speaker = %self.speaker()?, "chat ready");
        Ok(())
    }

    async fn on_disconnected(&self, _cause: Option<&anyhow::Error>) -> Result<(), ChatError> {
        let rooms = std::mem::take(&mut *self.rooms.lock());
        let caller = self.caller()?;
        for room in rooms {
            caller.groups().remove(&room_group(&room)).await?;
        }
        Ok(())
    }
}
