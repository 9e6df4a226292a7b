//! Route dispatch for `<Module>_<method>` names and the positional-argument
//! helpers generated `invoke` bodies are built from.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::context::HubConnection;
use crate::module::AttachedModule;

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("entry hub '{entry}' has no method '{method}'")]
    UnknownMethod { entry: &'static str, method: String },

    #[error("'{method}' takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("'{method}': argument {index} is invalid: {source}")]
    InvalidArgument {
        method: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{method}': result could not be serialized: {source}")]
    InvalidReturn {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The module method itself returned an error; `source` is that error.
    #[error("'{method}' failed: {source}")]
    Failed {
        method: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl InvokeError {
    /// The module's own error, for `Failed`.
    pub fn into_source(self) -> Option<anyhow::Error> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Downcast the module's own error, for `Failed`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Failed { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub(crate) async fn dispatch(
    entry: &'static str,
    conn: &HubConnection,
    modules: &'static [AttachedModule],
    route: &str,
    args: Vec<Value>,
) -> Result<Value, InvokeError> {
    let Some(module) = modules.iter().find(|m| m.has_route(route)) else {
        return Err(InvokeError::UnknownMethod {
            entry,
            method: route.to_owned(),
        });
    };
    tracing::debug!(
        entry,
        module = module.name,
        route,
        connection_id = conn.connection_id(),
        "dispatching hub method"
    );
    (module.invoke)(conn, route, args).await
}

/// # Errors
/// Returns [`InvokeError::ArgumentCount`] when `args.len() != expected`.
pub fn check_arity(method: &'static str, args: &[Value], expected: usize) -> Result<(), InvokeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(InvokeError::ArgumentCount {
            method,
            expected,
            actual: args.len(),
        })
    }
}

/// Deserialize the next positional argument.
///
/// # Errors
/// Returns [`InvokeError::InvalidArgument`] if the value does not fit `T`.
pub fn next_arg<T: DeserializeOwned>(
    method: &'static str,
    index: usize,
    args: &mut std::vec::IntoIter<Value>,
) -> Result<T, InvokeError> {
    // Arity was checked up front; a short list reads as `null`.
    let value = args.next().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|source| InvokeError::InvalidArgument {
        method,
        index,
        source,
    })
}

/// # Errors
/// Returns [`InvokeError::InvalidReturn`] if the result does not serialize.
pub fn reply<T: Serialize>(method: &'static str, value: &T) -> Result<Value, InvokeError> {
    serde_json::to_value(value).map_err(|source| InvokeError::InvalidReturn { method, source })
}

pub fn fail<E: Into<anyhow::Error>>(method: &'static str, error: E) -> InvokeError {
    InvokeError::Failed {
        method,
        source: error.into(),
    }
}
