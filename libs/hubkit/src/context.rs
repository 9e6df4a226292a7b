use parking_lot::Mutex;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};
use tokio_util::sync::CancellationToken;

use crate::clients::{CallerClients, HubClients};
use crate::host::HubRuntime;
use crate::module::ModuleHub;
use crate::proxy::{ClientInterface, NoClient};
use crate::transport::{GroupManager, TransportError};

/// Per-connection execution context.
///
/// Created by [`HubHost::connect`](crate::HubHost::connect) before any module
/// hook runs and closed by [`HubHost::disconnect`](crate::HubHost::disconnect)
/// after the last hook returns. Modules never see it directly; they reach their
/// connection through [`ModuleHub::caller`].
///
/// Holds:
/// - **Identity**: connection id and optional authenticated user id
/// - **Module scope**: one instance per module type, created on first use
/// - **Runtime handles**: transport, groups, proxy registry, shared services
/// - **Abort signal**: a `CancellationToken` fired when the connection closes
///
/// # Dispatch flow
/// ```ignore
/// // Generated `ChatHub_send_message` on the entry hub:
/// let module = entry.connection().module::<ChatHub>(); // scoped + attached once
/// module.send_message(text).await                      // result returned unchanged
/// ```
pub struct ConnectionContext {
    connection_id: Arc<str>,
    user_id: Option<Arc<str>>,
    runtime: Arc<HubRuntime>,
    scope: ModuleScope,
    aborted: CancellationToken,
}

/// Cheap clone handle to a [`ConnectionContext`].
#[derive(Clone)]
pub struct HubConnection(Arc<ConnectionContext>);

impl HubConnection {
    pub(crate) fn open(
        runtime: Arc<HubRuntime>,
        connection_id: Arc<str>,
        user_id: Option<Arc<str>>,
    ) -> Self {
        Self(Arc::new(ConnectionContext {
            connection_id,
            user_id,
            aborted: runtime.root_token.child_token(),
            runtime,
            scope: ModuleScope::default(),
        }))
    }

    pub fn connection_id(&self) -> &str {
        &self.0.connection_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.user_id.as_deref()
    }

    /// Fired once the connection is closed.
    pub fn aborted(&self) -> &CancellationToken {
        &self.0.aborted
    }

    pub fn is_closed(&self) -> bool {
        self.0.aborted.is_cancelled()
    }

    /// Connection-scoped instance of module `M`, attached to this connection.
    ///
    /// The first call per connection constructs the module through
    /// [`ModuleHub::create`]; every later call returns the same instance.
    /// Attachment happens at most once; repeating it is a no-op.
    pub fn module<M: ModuleHub>(&self) -> Arc<M> {
        let (instance, created) = self
            .0
            .scope
            .get_or_create(|| M::create(&self.0.runtime.services));
        if created {
            tracing::debug!(
                module = M::NAME,
                connection_id = %self.0.connection_id,
                "module instance created"
            );
        }
        if instance.hub_state().attach(|| self.caller::<M::Client>()) {
            tracing::debug!(
                module = M::NAME,
                connection_id = %self.0.connection_id,
                "module attached to connection"
            );
        }
        instance
    }

    /// Number of module instances living in this connection's scope.
    pub fn module_count(&self) -> usize {
        self.0.scope.len()
    }

    fn caller<C: ?Sized + ClientInterface>(&self) -> HubCaller<C> {
        let runtime = &self.0.runtime;
        let clients = HubClients::new(runtime.sender.clone(), runtime.proxies.clone());
        HubCaller {
            connection_id: self.0.connection_id.clone(),
            user_id: self.0.user_id.clone(),
            groups: runtime.groups.clone(),
            clients: CallerClients::new(clients, self.0.connection_id.clone()),
            aborted: self.0.aborted.clone(),
        }
    }

    /// Fire the abort signal and drop every module instance.
    pub(crate) fn close(&self) {
        self.0.aborted.cancel();
        let dropped = self.0.scope.clear();
        tracing::debug!(
            connection_id = %self.0.connection_id,
            modules = dropped,
            "connection context closed"
        );
    }
}

impl fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConnection")
            .field("connection_id", &self.0.connection_id)
            .field("user_id", &self.0.user_id)
            .field("modules", &self.0.scope.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

type ScopedInstance = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct ModuleScope {
    instances: Mutex<HashMap<TypeId, ScopedInstance>>,
}

impl ModuleScope {
    /// Construction runs under the lock so two racing callers never build twice.
    fn get_or_create<M, F>(&self, create: F) -> (Arc<M>, bool)
    where
        M: Send + Sync + 'static,
        F: FnOnce() -> M,
    {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(&TypeId::of::<M>())
            && let Ok(instance) = existing.clone().downcast::<M>()
        {
            return (instance, false);
        }
        let instance = Arc::new(create());
        instances.insert(TypeId::of::<M>(), instance.clone());
        (instance, true)
    }

    fn len(&self) -> usize {
        self.instances.lock().len()
    }

    fn clear(&self) -> usize {
        let drained: Vec<ScopedInstance> = self.instances.lock().drain().map(|(_, v)| v).collect();
        drained.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("module '{module}' is not attached to a connection")]
    Detached { module: &'static str },
}

/// Connection slot of a module, parameterized by its client interface.
///
/// Every `#[module_hub]` struct holds exactly one of these. Use `HubState`
/// (no type argument) for modules that never call back into peers. Modules
/// read it through [`ModuleHub::caller`], which names the module on failure.
pub struct HubState<C: ?Sized + ClientInterface = dyn NoClient> {
    caller: OnceLock<HubCaller<C>>,
}

impl<C: ?Sized + ClientInterface> HubState<C> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            caller: OnceLock::new(),
        }
    }

    /// Attach to a connection; returns `false` if already attached.
    pub fn attach(&self, caller: impl FnOnce() -> HubCaller<C>) -> bool {
        let mut fresh = false;
        self.caller.get_or_init(|| {
            fresh = true;
            caller()
        });
        fresh
    }

    pub fn is_attached(&self) -> bool {
        self.caller.get().is_some()
    }

    /// The connection this module instance serves, once attached.
    pub fn get(&self) -> Option<&HubCaller<C>> {
        self.caller.get()
    }
}

impl<C: ?Sized + ClientInterface> Default for HubState<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + ClientInterface> fmt::Debug for HubState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubState")
            .field("client", &C::NAME)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// What an attached module knows about its connection.
///
/// Holds shared handles only, never the [`ConnectionContext`] itself, so module
/// instances and their context do not keep each other alive.
pub struct HubCaller<C: ?Sized> {
    connection_id: Arc<str>,
    user_id: Option<Arc<str>>,
    groups: Arc<dyn GroupManager>,
    clients: CallerClients<C>,
    aborted: CancellationToken,
}

impl<C: ?Sized + ClientInterface> HubCaller<C> {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Typed addressing of peers through the module's client interface.
    pub fn clients(&self) -> &CallerClients<C> {
        &self.clients
    }

    /// Group membership of the calling connection.
    pub fn groups(&self) -> CallerGroups<'_> {
        CallerGroups {
            connection_id: &self.connection_id,
            groups: &*self.groups,
        }
    }

    pub fn aborted(&self) -> &CancellationToken {
        &self.aborted
    }
}

impl<C: ?Sized> fmt::Debug for HubCaller<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCaller")
            .field("connection_id", &self.connection_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Caller-scoped view of the [`GroupManager`].
pub struct CallerGroups<'a> {
    connection_id: &'a str,
    groups: &'a dyn GroupManager,
}

impl CallerGroups<'_> {
    /// # Errors
    /// Propagates the group manager's failure.
    pub async fn add(&self, group: &str) -> Result<(), TransportError> {
        tracing::debug!(connection_id = self.connection_id, group, "joining group");
        self.groups.add_to_group(self.connection_id, group).await
    }

    /// # Errors
    /// Propagates the group manager's failure.
    pub async fn remove(&self, group: &str) -> Result<(), TransportError> {
        tracing::debug!(connection_id = self.connection_id, group, "leaving group");
        self.groups.remove_from_group(self.connection_id, group).await
    }
}
