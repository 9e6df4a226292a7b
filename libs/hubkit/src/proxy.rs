//! Runtime proxy resolution for client interfaces.
//!
//! Every `#[client_interface]` trait gets exactly one generated proxy type that
//! turns trait calls into named messages. The proxy registers itself through
//! `inventory` as a [`ProxyRegistration`]; [`ProxyRegistry`] maps the interface
//! identity to the proxy constructor and builds proxies over a [`ClientSender`].
//!
//! Implementation details:
//! - Key = `TypeId` of the interface trait object (`dyn MyClient`).
//! - Value = constructor returning `Arc<dyn MyClient>` boxed as `Box<dyn Any + Send + Sync>`
//!   (downcast on resolve).
//! - The first successful lookup per interface is cached; failures are not cached.
//! - Registering another candidate drops the cached entry, so a later resolve
//!   observes the ambiguity.

use parking_lot::RwLock;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::transport::ClientSender;

/// Marker for client interface trait objects.
///
/// Implemented by `#[client_interface]` for `dyn Trait`.
pub trait ClientInterface: Send + Sync + 'static {
    /// Interface name used in diagnostics.
    const NAME: &'static str;
}

/// Client interface of modules that never call back into peers.
pub trait NoClient: Send + Sync {}

impl ClientInterface for dyn NoClient {
    const NAME: &'static str = "NoClient";
}

pub type BoxedProxy = Box<dyn Any + Send + Sync>;

/// Static proxy registration emitted by `#[client_interface]`.
pub struct ProxyRegistration {
    interface: fn() -> TypeId,
    interface_name: &'static str,
    proxy_name: &'static str,
    construct: fn(ClientSender) -> BoxedProxy,
}

impl ProxyRegistration {
    pub const fn new(
        interface: fn() -> TypeId,
        interface_name: &'static str,
        proxy_name: &'static str,
        construct: fn(ClientSender) -> BoxedProxy,
    ) -> Self {
        Self {
            interface,
            interface_name,
            proxy_name,
            construct,
        }
    }
}

inventory::collect!(ProxyRegistration);

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no generated proxy implements client interface '{interface}'")]
    NotFound { interface: &'static str },

    #[error("client interface '{interface}' has several proxies: {candidates:?}")]
    Ambiguous {
        interface: &'static str,
        candidates: Vec<&'static str>,
    },

    #[error("proxy '{proxy}' did not produce client interface '{interface}'")]
    TypeMismatch {
        interface: &'static str,
        proxy: &'static str,
    },
}

type Construct = Arc<dyn Fn(ClientSender) -> BoxedProxy + Send + Sync>;

#[derive(Clone)]
struct Candidate {
    interface: TypeId,
    interface_name: &'static str,
    proxy_name: &'static str,
    construct: Construct,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("interface", &self.interface_name)
            .field("proxy", &self.proxy_name)
            .finish_non_exhaustive()
    }
}

/// Interface-to-proxy map with a per-interface resolution cache.
pub struct ProxyRegistry {
    candidates: RwLock<Vec<Candidate>>,
    resolved: RwLock<HashMap<TypeId, Candidate>>,
}

impl ProxyRegistry {
    /// An empty registry; populate it with [`ProxyRegistry::register`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: RwLock::new(Vec::new()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding every proxy generated in this binary.
    #[must_use]
    pub fn from_inventory() -> Self {
        let candidates = inventory::iter::<ProxyRegistration>
            .into_iter()
            .map(|reg| {
                let construct = reg.construct;
                Candidate {
                    interface: (reg.interface)(),
                    interface_name: reg.interface_name,
                    proxy_name: reg.proxy_name,
                    construct: Arc::new(construct),
                }
            })
            .collect::<Vec<_>>();
        tracing::debug!(count = candidates.len(), "collected generated client proxies");
        Self {
            candidates: RwLock::new(candidates),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Register a proxy constructor for interface `C`.
    pub fn register<C, F>(&self, proxy_name: &'static str, construct: F)
    where
        C: ?Sized + ClientInterface,
        F: Fn(ClientSender) -> Arc<C> + Send + Sync + 'static,
    {
        let interface = TypeId::of::<C>();
        // Lock order is candidates, then resolved; `lookup` follows it too.
        let mut candidates = self.candidates.write();
        candidates.push(Candidate {
            interface,
            interface_name: C::NAME,
            proxy_name,
            construct: Arc::new(move |sender| Box::new(construct(sender)) as BoxedProxy),
        });
        self.resolved.write().remove(&interface);
    }

    /// Build the proxy for interface `C` over `sender`.
    ///
    /// # Errors
    /// - [`ProxyError::NotFound`] if no proxy implements `C`
    /// - [`ProxyError::Ambiguous`] if more than one does
    pub fn resolve<C>(&self, sender: ClientSender) -> Result<Arc<C>, ProxyError>
    where
        C: ?Sized + ClientInterface,
    {
        let candidate = self.lookup(TypeId::of::<C>(), C::NAME)?;
        let boxed = (candidate.construct)(sender);
        boxed
            .downcast::<Arc<C>>()
            .map(|b| *b)
            .map_err(|_| ProxyError::TypeMismatch {
                interface: C::NAME,
                proxy: candidate.proxy_name,
            })
    }

    fn lookup(&self, key: TypeId, name: &'static str) -> Result<Candidate, ProxyError> {
        if let Some(hit) = self.resolved.read().get(&key) {
            return Ok(hit.clone());
        }

        // Held until the cache entry is written so a concurrent `register`
        // cannot slip in between counting and caching.
        let candidates = self.candidates.read();
        let matches: Vec<&Candidate> = candidates.iter().filter(|c| c.interface == key).collect();

        match matches.as_slice() {
            [] => Err(ProxyError::NotFound { interface: name }),
            [single] => {
                tracing::debug!(interface = name, proxy = single.proxy_name, "resolved client proxy");
                // Racing first resolutions insert the same candidate; keep whichever landed first.
                let mut w = self.resolved.write();
                Ok(w.entry(key).or_insert_with(|| (*single).clone()).clone())
            }
            many => Err(ProxyError::Ambiguous {
                interface: name,
                candidates: many.iter().map(|c| c.proxy_name).collect(),
            }),
        }
    }

    /// Number of registered proxy types.
    pub fn len(&self) -> usize {
        self.candidates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.read().is_empty()
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("candidates", &*self.candidates.read())
            .field("resolved", &self.resolved.read().len())
            .finish()
    }
}
