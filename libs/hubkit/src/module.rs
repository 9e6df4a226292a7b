//! Contracts implemented by the hub macros.
//!
//! - [`ModuleHub`] (`#[module_hub]`): identity, construction and connection slot
//! - [`ModuleMethods`] (`#[hub_methods]`): route table, dynamic invoke, lifecycle hooks
//! - [`HubEntry`] + [`Attached`] (`#[entry_hub]`): ordered module list and fan-out helpers
//! - [`EntryLifecycle`]: the entry's connect/disconnect hooks, generated unless
//!   `lifecycle = manual`

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::{HubCaller, HubConnection, HubState, StateError};
use crate::lifecycle::{self, LifecycleError};
use crate::proxy::ClientInterface;
use crate::router::{self, InvokeError};
use crate::services::HubServices;

/// A service module that can be attached to an entry hub.
pub trait ModuleHub: Send + Sync + Sized + 'static {
    /// Type name of the module; prefix of every route it exposes.
    const NAME: &'static str;

    /// Client interface the module calls back into peers through.
    type Client: ?Sized + ClientInterface;

    /// Build the per-connection instance.
    fn create(services: &HubServices) -> Self;

    fn hub_state(&self) -> &HubState<Self::Client>;

    /// The connection this instance serves.
    ///
    /// # Errors
    /// Returns [`StateError::Detached`] if the instance was never attached.
    fn caller(&self) -> Result<&HubCaller<Self::Client>, StateError> {
        self.hub_state()
            .get()
            .ok_or(StateError::Detached { module: Self::NAME })
    }
}

#[async_trait]
pub trait ModuleMethods: ModuleHub {
    /// `<Module>_<method>` for every exposed method, in declaration order.
    const ROUTES: &'static [&'static str];

    /// Invoke the method behind `route` with positional JSON arguments.
    async fn invoke(&self, route: &str, args: Vec<Value>) -> Result<Value, InvokeError>;

    async fn hook_connected(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn hook_disconnected(&self, _cause: Option<&anyhow::Error>) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type ConnectFn = for<'a> fn(&'a HubConnection) -> BoxFuture<'a, anyhow::Result<()>>;
pub type DisconnectFn =
    for<'a> fn(&'a HubConnection, Option<&'a anyhow::Error>) -> BoxFuture<'a, anyhow::Result<()>>;
pub type InvokeFn =
    for<'a> fn(&'a HubConnection, &'a str, Vec<Value>) -> BoxFuture<'a, Result<Value, InvokeError>>;

/// Type-erased view of one module attached to an entry hub.
#[derive(Clone, Copy)]
pub struct AttachedModule {
    pub name: &'static str,
    pub routes: &'static [&'static str],
    pub(crate) connect: ConnectFn,
    pub(crate) disconnect: DisconnectFn,
    pub(crate) invoke: InvokeFn,
}

impl AttachedModule {
    pub const fn of<M: ModuleMethods>() -> Self {
        Self {
            name: M::NAME,
            routes: M::ROUTES,
            connect: connect_module::<M>,
            disconnect: disconnect_module::<M>,
            invoke: invoke_module::<M>,
        }
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.iter().any(|r| *r == route)
    }
}

impl std::fmt::Debug for AttachedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedModule")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

fn connect_module<M: ModuleMethods>(conn: &HubConnection) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        let module = conn.module::<M>();
        module.hook_connected().await
    })
}

fn disconnect_module<'a, M: ModuleMethods>(
    conn: &'a HubConnection,
    cause: Option<&'a anyhow::Error>,
) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        let module = conn.module::<M>();
        module.hook_disconnected(cause).await
    })
}

fn invoke_module<'a, M: ModuleMethods>(
    conn: &'a HubConnection,
    route: &'a str,
    args: Vec<Value>,
) -> BoxFuture<'a, Result<Value, InvokeError>> {
    Box::pin(async move {
        let module = conn.module::<M>();
        module.invoke(route, args).await
    })
}

/// The single connection endpoint aggregating attached modules.
#[async_trait]
pub trait HubEntry: Send + Sync + Sized + 'static {
    const NAME: &'static str;

    /// Attached modules in declaration order.
    const MODULES: &'static [AttachedModule];

    fn from_connection(connection: HubConnection) -> Self;

    fn connection(&self) -> &HubConnection;

    /// Every exposed route across attached modules.
    fn routes() -> Vec<&'static str> {
        Self::MODULES
            .iter()
            .flat_map(|m| m.routes.iter().copied())
            .collect()
    }

    /// Connect fan-out: each module's `on_connected` in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns [`LifecycleError::Connect`] naming the failing module.
    async fn modules_on_connected(&self) -> Result<(), LifecycleError> {
        lifecycle::connect_modules(Self::NAME, self.connection(), Self::MODULES).await
    }

    /// Disconnect fan-out: every module's `on_disconnected` in order, failures collected.
    ///
    /// # Errors
    /// Returns [`LifecycleError::Disconnect`] listing every failing module.
    async fn modules_on_disconnected(
        &self,
        cause: Option<&anyhow::Error>,
    ) -> Result<(), LifecycleError> {
        lifecycle::disconnect_modules(Self::NAME, self.connection(), Self::MODULES, cause).await
    }

    /// Dynamic dispatch of `<Module>_<method>` with positional JSON arguments.
    ///
    /// # Errors
    /// Returns [`InvokeError`]; a module error arrives as [`InvokeError::Failed`].
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        router::dispatch(Self::NAME, self.connection(), Self::MODULES, method, args).await
    }
}

/// Marks `M` as attached to this entry hub; enables `<M>Dispatch` forwarding methods.
pub trait Attached<M: ModuleHub>: HubEntry {}

/// Connection lifecycle of an entry hub.
///
/// `#[entry_hub]` emits an empty impl (fan-out only). With `lifecycle = manual`
/// the author implements it and may call the `modules_on_*` helpers explicitly.
#[async_trait]
pub trait EntryLifecycle: HubEntry {
    async fn on_connected(&self) -> Result<(), LifecycleError> {
        self.modules_on_connected().await
    }

    async fn on_disconnected(&self, cause: Option<&anyhow::Error>) -> Result<(), LifecycleError> {
        self.modules_on_disconnected(cause).await
    }
}
