//! Typed addressing of connected peers through a module's client interface.

use std::{fmt, marker::PhantomData, ops::Deref, sync::Arc};

use crate::proxy::{ClientInterface, ProxyError, ProxyRegistry};
use crate::target::Target;
use crate::transport::{ClientSender, MessageSender};

fn owned<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Builds client interface `C` proxies for every addressable target.
///
/// Each call resolves the proxy through the [`ProxyRegistry`]; resolution is
/// cached there, so calling this per send is cheap.
pub struct HubClients<C: ?Sized> {
    sender: Arc<dyn MessageSender>,
    proxies: Arc<ProxyRegistry>,
    _client: PhantomData<fn() -> Arc<C>>,
}

impl<C: ?Sized> Clone for HubClients<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            proxies: self.proxies.clone(),
            _client: PhantomData,
        }
    }
}

impl<C: ?Sized> fmt::Debug for HubClients<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClients")
            .field("interface", &std::any::type_name::<C>())
            .finish_non_exhaustive()
    }
}

impl<C: ?Sized + ClientInterface> HubClients<C> {
    pub fn new(sender: Arc<dyn MessageSender>, proxies: Arc<ProxyRegistry>) -> Self {
        Self {
            sender,
            proxies,
            _client: PhantomData,
        }
    }

    /// Proxy over an arbitrary target.
    ///
    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn target(&self, target: Target) -> Result<Arc<C>, ProxyError> {
        self.proxies
            .resolve::<C>(ClientSender::new(self.sender.clone(), target))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn all(&self) -> Result<Arc<C>, ProxyError> {
        self.target(Target::All)
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn all_except<I, S>(&self, excluded_connection_ids: I) -> Result<Arc<C>, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::AllExcept(owned(excluded_connection_ids)))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn client(&self, connection_id: impl Into<String>) -> Result<Arc<C>, ProxyError> {
        self.target(Target::Client(connection_id.into()))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn clients<I, S>(&self, connection_ids: I) -> Result<Arc<C>, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::Clients(owned(connection_ids)))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn group(&self, group: impl Into<String>) -> Result<Arc<C>, ProxyError> {
        self.target(Target::Group(group.into()))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn group_except<I, S>(
        &self,
        group: impl Into<String>,
        excluded_connection_ids: I,
    ) -> Result<Arc<C>, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::GroupExcept {
            group: group.into(),
            excluded: owned(excluded_connection_ids),
        })
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn groups<I, S>(&self, groups: I) -> Result<Arc<C>, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::Groups(owned(groups)))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn user(&self, user_id: impl Into<String>) -> Result<Arc<C>, ProxyError> {
        self.target(Target::User(user_id.into()))
    }

    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn users<I, S>(&self, user_ids: I) -> Result<Arc<C>, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::Users(owned(user_ids)))
    }
}

/// [`HubClients`] seen from one connection, adding caller-relative targets.
pub struct CallerClients<C: ?Sized> {
    inner: HubClients<C>,
    caller_id: Arc<str>,
}

impl<C: ?Sized> Clone for CallerClients<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            caller_id: self.caller_id.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for CallerClients<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerClients")
            .field("caller_id", &self.caller_id)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<C: ?Sized + ClientInterface> CallerClients<C> {
    pub fn new(inner: HubClients<C>, caller_id: Arc<str>) -> Self {
        Self { inner, caller_id }
    }

    /// The connection that invoked the current method.
    ///
    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn caller(&self) -> Result<Arc<C>, ProxyError> {
        self.inner.client(&*self.caller_id)
    }

    /// Every connection except the caller.
    ///
    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn others(&self) -> Result<Arc<C>, ProxyError> {
        self.inner.all_except([&*self.caller_id])
    }

    /// Every member of `group` except the caller.
    ///
    /// # Errors
    /// Returns [`ProxyError`] if `C` has no unique generated proxy.
    pub fn others_in_group(&self, group: impl Into<String>) -> Result<Arc<C>, ProxyError> {
        self.inner.group_except(group, [&*self.caller_id])
    }
}

impl<C: ?Sized> Deref for CallerClients<C> {
    type Target = HubClients<C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
