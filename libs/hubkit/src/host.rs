//! Hub host: owns the shared runtime and drives entry hubs through the
//! connection lifecycle.
//!
//! Per connection:
//! - `connect`: open the [`HubConnection`], build the entry hub, run `on_connected`
//!   (a failure closes the context and rejects the connection)
//! - `invoke`: route `<Module>_<method>` calls (through the entry hub)
//! - `disconnect`: run `on_disconnected` with the cause, then close the context
//!
//! Closing a context fires its abort token and drops every module instance.

use std::{marker::PhantomData, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::clients::HubClients;
use crate::config::{ConfigProvider, HubConfig};
use crate::context::HubConnection;
use crate::lifecycle::LifecycleError;
use crate::module::EntryLifecycle;
use crate::proxy::{ClientInterface, ProxyRegistry};
use crate::services::HubServices;
use crate::transport::{GroupManager, MessageSender};

/// Shared handles every connection of a host sees.
pub struct HubRuntime {
    pub(crate) sender: Arc<dyn MessageSender>,
    pub(crate) groups: Arc<dyn GroupManager>,
    pub(crate) proxies: Arc<ProxyRegistry>,
    pub(crate) services: Arc<HubServices>,
    pub(crate) root_token: CancellationToken,
}

impl HubRuntime {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        groups: Arc<dyn GroupManager>,
        proxies: Arc<ProxyRegistry>,
        services: Arc<HubServices>,
    ) -> Self {
        Self {
            sender,
            groups,
            proxies,
            services,
            root_token: CancellationToken::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("hub host needs a message sender")]
    MissingSender,
    #[error("hub host needs a group manager")]
    MissingGroups,
}

/// Wires transport, groups, proxies and services into a [`HubHost`].
///
/// ```ignore
/// let transport = Arc::new(LocalTransport::new(cfg.transport.channel_capacity));
/// let host = HubHost::<AppHub>::builder()
///     .transport(transport.clone())
///     .config(Arc::new(cfg))
///     .build()?;
/// ```
#[derive(Default)]
pub struct HubHostBuilder {
    sender: Option<Arc<dyn MessageSender>>,
    groups: Option<Arc<dyn GroupManager>>,
    proxies: Option<Arc<ProxyRegistry>>,
    services: Option<Arc<HubServices>>,
    config: Option<Arc<dyn ConfigProvider>>,
}

impl HubHostBuilder {
    /// Use one value as both message sender and group manager.
    #[must_use]
    pub fn transport<T>(mut self, transport: Arc<T>) -> Self
    where
        T: MessageSender + GroupManager + 'static,
    {
        self.sender = Some(transport.clone());
        self.groups = Some(transport);
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn groups(mut self, groups: Arc<dyn GroupManager>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Defaults to [`ProxyRegistry::from_inventory`].
    #[must_use]
    pub fn proxies(mut self, proxies: Arc<ProxyRegistry>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    /// Prebuilt services; takes precedence over [`HubHostBuilder::config`].
    #[must_use]
    pub fn services(mut self, services: Arc<HubServices>) -> Self {
        self.services = Some(services);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    /// Returns [`HostError`] if the sender or group manager is missing.
    pub fn build<E: EntryLifecycle>(self) -> Result<HubHost<E>, HostError> {
        let sender = self.sender.ok_or(HostError::MissingSender)?;
        let groups = self.groups.ok_or(HostError::MissingGroups)?;
        let proxies = self
            .proxies
            .unwrap_or_else(|| Arc::new(ProxyRegistry::from_inventory()));
        let services = match (self.services, self.config) {
            (Some(services), _) => services,
            (None, Some(config)) => Arc::new(HubServices::new(config)),
            (None, None) => Arc::new(HubServices::new(Arc::new(HubConfig::default()))),
        };
        tracing::debug!(
            entry = E::NAME,
            modules = E::MODULES.len(),
            proxies = proxies.len(),
            "hub host built"
        );
        Ok(HubHost {
            runtime: Arc::new(HubRuntime::new(sender, groups, proxies, services)),
            _entry: PhantomData,
        })
    }
}

/// Connection lifecycle driver for entry hub `E`.
pub struct HubHost<E> {
    runtime: Arc<HubRuntime>,
    _entry: PhantomData<fn() -> E>,
}

impl<E> Clone for HubHost<E> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            _entry: PhantomData,
        }
    }
}

impl<E: EntryLifecycle> HubHost<E> {
    #[must_use]
    pub fn builder() -> HubHostBuilder {
        HubHostBuilder::default()
    }

    pub fn runtime(&self) -> &Arc<HubRuntime> {
        &self.runtime
    }

    /// Accept a connection: build its context and entry hub, then run `on_connected`.
    ///
    /// # Errors
    /// Returns the [`LifecycleError`] of the failing hook; the connection is rejected
    /// and its context already closed.
    pub async fn connect(
        &self,
        connection_id: impl Into<Arc<str>>,
        user_id: Option<&str>,
    ) -> Result<E, LifecycleError> {
        let connection =
            HubConnection::open(self.runtime.clone(), connection_id.into(), user_id.map(Arc::from));
        let entry = E::from_connection(connection.clone());

        if let Err(err) = entry.on_connected().await {
            tracing::warn!(
                entry = E::NAME,
                connection_id = connection.connection_id(),
                error = %err,
                "connection rejected"
            );
            connection.close();
            return Err(err);
        }

        tracing::info!(
            entry = E::NAME,
            connection_id = connection.connection_id(),
            user_id = connection.user_id(),
            "connection established"
        );
        Ok(entry)
    }

    /// Tear a connection down: run `on_disconnected`, then close the context.
    ///
    /// The context is closed even when hooks fail.
    ///
    /// # Errors
    /// Returns the [`LifecycleError`] of the disconnect hooks.
    pub async fn disconnect(
        &self,
        entry: E,
        cause: Option<anyhow::Error>,
    ) -> Result<(), LifecycleError> {
        let result = entry.on_disconnected(cause.as_ref()).await;
        let connection = entry.connection();
        connection.close();
        tracing::info!(
            entry = E::NAME,
            connection_id = connection.connection_id(),
            clean = cause.is_none(),
            "connection closed"
        );
        result
    }

    /// Address peers from outside any connection, e.g. a background task.
    pub fn clients<C: ?Sized + ClientInterface>(&self) -> HubClients<C> {
        HubClients::new(self.runtime.sender.clone(), self.runtime.proxies.clone())
    }

    /// Fire the abort token of every open connection.
    pub fn shutdown(&self) {
        tracing::info!(entry = E::NAME, "hub host shutting down");
        self.runtime.root_token.cancel();
    }
}
