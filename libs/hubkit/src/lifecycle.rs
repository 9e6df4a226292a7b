//! Connect/disconnect fan-out across the modules of an entry hub.
//!
//! Both directions walk the modules in declaration order and await each hook
//! before the next. Connect stops at the first failure; disconnect runs every
//! hook and reports all failures together.

use std::fmt;

use crate::context::HubConnection;
use crate::module::AttachedModule;

/// One module hook that failed during disconnect.
#[derive(Debug)]
pub struct ModuleFailure {
    pub module: &'static str,
    pub error: anyhow::Error,
}

/// Disconnect failures in declaration order; never empty.
#[derive(Debug)]
pub struct ModuleFailures(Vec<ModuleFailure>);

impl ModuleFailures {
    pub fn first(&self) -> &ModuleFailure {
        &self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleFailure> {
        self.0.iter()
    }

    /// Failures after the first.
    pub fn more(&self) -> usize {
        self.0.len() - 1
    }
}

impl fmt::Display for ModuleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.first();
        write!(f, "module '{}' failed on disconnect: {}", first.module, first.error)?;
        if self.more() > 0 {
            write!(f, " (and {} more)", self.more())?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("entry hub '{entry}': module '{module}' failed on connect: {source}")]
    Connect {
        entry: &'static str,
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("entry hub '{entry}': {failures}")]
    Disconnect {
        entry: &'static str,
        failures: ModuleFailures,
    },

    /// A hand-written entry hook failed outside the module fan-out.
    #[error("entry hub '{entry}' lifecycle hook failed: {source}")]
    Hook {
        entry: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl LifecycleError {
    /// Module whose hook caused the error, if any (the first one for disconnect).
    pub fn module(&self) -> Option<&'static str> {
        match self {
            Self::Connect { module, .. } => Some(module),
            Self::Disconnect { failures, .. } => Some(failures.first().module),
            Self::Hook { .. } => None,
        }
    }
}

pub(crate) async fn connect_modules(
    entry: &'static str,
    conn: &HubConnection,
    modules: &[AttachedModule],
) -> Result<(), LifecycleError> {
    for module in modules {
        tracing::debug!(
            entry,
            module = module.name,
            connection_id = conn.connection_id(),
            "module on_connected"
        );
        (module.connect)(conn)
            .await
            .map_err(|source| LifecycleError::Connect {
                entry,
                module: module.name,
                source,
            })?;
    }
    Ok(())
}

pub(crate) async fn disconnect_modules(
    entry: &'static str,
    conn: &HubConnection,
    modules: &[AttachedModule],
    cause: Option<&anyhow::Error>,
) -> Result<(), LifecycleError> {
    let mut failures = Vec::new();
    for module in modules {
        tracing::debug!(
            entry,
            module = module.name,
            connection_id = conn.connection_id(),
            "module on_disconnected"
        );
        if let Err(error) = (module.disconnect)(conn, cause).await {
            tracing::warn!(
                entry,
                module = module.name,
                connection_id = conn.connection_id(),
                error = %error,
                "module on_disconnected failed; continuing"
            );
            failures.push(ModuleFailure {
                module: module.name,
                error,
            });
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::Disconnect {
            entry,
            failures: ModuleFailures(failures),
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failures(names: &[&'static str]) -> ModuleFailures {
        ModuleFailures(
            names
                .iter()
                .map(|m| ModuleFailure {
                    module: m,
                    error: anyhow!("{m} broke"),
                })
                .collect(),
        )
    }

    #[test]
    fn disconnect_error_reports_first_failure_and_count() {
        let err = LifecycleError::Disconnect {
            entry: "AppHub",
            failures: failures(&["B", "C"]),
        };
        assert_eq!(
            err.to_string(),
            "entry hub 'AppHub': module 'B' failed on disconnect: B broke (and 1 more)"
        );
        assert_eq!(err.module(), Some("B"));
    }

    #[test]
    fn single_disconnect_failure_has_no_suffix() {
        let err = LifecycleError::Disconnect {
            entry: "AppHub",
            failures: failures(&["A"]),
        };
        assert_eq!(
            err.to_string(),
            "entry hub 'AppHub': module 'A' failed on disconnect: A broke"
        );
    }

    #[test]
    fn connect_error_keeps_module_error_as_source() {
        let err = LifecycleError::Connect {
            entry: "AppHub",
            module: "ChatHub",
            source: anyhow!("room full"),
        };
        assert_eq!(
            err.to_string(),
            "entry hub 'AppHub': module 'ChatHub' failed on connect: room full"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "room full");
    }
}
