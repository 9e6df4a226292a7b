#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `hubkit` - many service modules behind one bidirectional endpoint
//!
//! A hub is one connection endpoint (the *entry hub*) that aggregates
//! independently written *modules*. Each module exposes methods peers can call
//! and may declare a *client interface*: messages the server pushes back.
//!
//! - **Client proxies** (`#[client_interface]`): one generated proxy per client
//!   interface, resolved at run time through [`ProxyRegistry`]
//! - **Dispatch** (`#[module_hub]`, `#[hub_methods]`, `#[entry_hub]`):
//!   `<Module>_<method>` forwarding methods on the entry hub plus a route table
//! - **Lifecycle fan-out**: connect/disconnect hooks of every module in
//!   declaration order
//!
//! ## Example
//!
//! ```rust,ignore
//! use hubkit::{HubState, ModuleHub, TransportError, client_interface, entry_hub, hub_methods, module_hub};
//!
//! #[client_interface]
//! pub trait ChatClient {
//!     async fn receive_message(&self, from: String, text: String) -> Result<(), TransportError>;
//! }
//!
//! #[module_hub]
//! #[derive(Default)]
//! pub struct ChatHub {
//!     state: HubState<dyn ChatClient>,
//! }
//!
//! #[hub_methods]
//! impl ChatHub {
//!     pub async fn send_message(&self, text: String) -> anyhow::Result<()> {
//!         let caller = self.caller()?;
//!         caller.clients().others()?.receive_message(caller.connection_id().to_owned(), text).await?;
//!         Ok(())
//!     }
//! }
//!
//! #[entry_hub(modules(ChatHub))]
//! pub struct AppHub;
//!
//! // entry.ChatHub_send_message("hi".into()).await?;
//! ```

// Generated code names this crate as `::hubkit`, also from inside it.
extern crate self as hubkit;

pub mod backends;
#[cfg(feature = "bootstrap")]
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod context;
pub mod host;
pub mod lifecycle;
pub mod module;
pub mod proxy;
pub mod router;
pub mod services;
pub mod target;
pub mod transport;

pub use hubkit_macros::{client_interface, entry_hub, hub_methods, module_hub};

pub use clients::{CallerClients, HubClients};
pub use config::{ConfigError, ConfigProvider, HubConfig, LoggingConfig, TransportConfig};
pub use context::{CallerGroups, HubCaller, HubConnection, HubState, StateError};
pub use host::{HostError, HubHost, HubHostBuilder, HubRuntime};
pub use lifecycle::{LifecycleError, ModuleFailure, ModuleFailures};
pub use module::{Attached, AttachedModule, EntryLifecycle, HubEntry, ModuleHub, ModuleMethods};
pub use proxy::{ClientInterface, NoClient, ProxyError, ProxyRegistration, ProxyRegistry};
pub use router::InvokeError;
pub use services::{HubServices, ServiceError};
pub use target::Target;
pub use transport::{ClientSender, GroupManager, HubMessage, MessageSender, TransportError};

/// Support items for macro-generated code. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use anyhow;
    pub use async_trait::async_trait;
    pub use inventory;
    pub use serde_json;

    pub use crate::router::{check_arity, fail, next_arg, reply};

    use crate::module::AttachedModule;

    const fn str_eq(a: &str, b: &str) -> bool {
        let (a, b) = (a.as_bytes(), b.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        let mut i = 0;
        while i < a.len() {
            if a[i] != b[i] {
                return false;
            }
            i += 1;
        }
        true
    }

    const fn route_defined_before(modules: &[AttachedModule], module: usize, route: &str) -> bool {
        let mut m = 0;
        while m < module {
            let routes = modules[m].routes;
            let mut r = 0;
            while r < routes.len() {
                if str_eq(routes[r], route) {
                    return true;
                }
                r += 1;
            }
            m += 1;
        }
        false
    }

    /// Whether no two attached modules share a route name. Evaluated in a
    /// `const` assertion emitted by `#[entry_hub]`.
    pub const fn routes_unique(modules: &[AttachedModule]) -> bool {
        let mut m = 1;
        while m < modules.len() {
            let routes = modules[m].routes;
            let mut r = 0;
            while r < routes.len() {
                if route_defined_before(modules, m, routes[r]) {
                    return false;
                }
                r += 1;
            }
            m += 1;
        }
        true
    }
}
