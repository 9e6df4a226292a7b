//! In-process transport backend
//!
//! Every connection gets a bounded `tokio::mpsc` queue of [`HubMessage`]s; the
//! receiving half is handed back from [`LocalTransport::connect`]. Group and
//! user tables live behind one `parking_lot::RwLock` and are never held across
//! an await.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;

use crate::config::TransportConfig;
use crate::target::Target;
use crate::transport::{GroupManager, HubMessage, MessageSender, TransportError};

struct Peer {
    user_id: Option<String>,
    tx: mpsc::Sender<HubMessage>,
}

#[derive(Default)]
struct Tables {
    connections: BTreeMap<String, Peer>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl Tables {
    fn all(&self) -> BTreeSet<String> {
        self.connections.keys().cloned().collect()
    }

    fn group(&self, group: &str) -> BTreeSet<String> {
        self.groups.get(group).cloned().unwrap_or_default()
    }

    fn users<'a>(&self, users: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
        let users: BTreeSet<&String> = users.into_iter().collect();
        self.connections
            .iter()
            .filter(|(_, peer)| peer.user_id.as_ref().is_some_and(|u| users.contains(u)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn resolve(&self, target: &Target) -> BTreeSet<String> {
        let mut ids = match target {
            Target::All | Target::AllExcept(_) => self.all(),
            Target::Client(id) => BTreeSet::from([id.clone()]),
            Target::Clients(ids) => ids.iter().cloned().collect(),
            Target::Group(group) | Target::GroupExcept { group, .. } => self.group(group),
            Target::Groups(groups) => groups.iter().flat_map(|g| self.group(g)).collect(),
            Target::User(user) => self.users([user]),
            Target::Users(users) => self.users(users),
        };
        for excluded in target.excluded() {
            ids.remove(excluded);
        }
        ids
    }
}

/// In-process [`MessageSender`] + [`GroupManager`].
pub struct LocalTransport {
    capacity: usize,
    tables: RwLock<Tables>,
}

impl LocalTransport {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tables: RwLock::new(Tables::default()),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &TransportConfig) -> Self {
        Self::new(cfg.channel_capacity)
    }

    /// Register a connection; returns its inbound message queue.
    ///
    /// Re-registering an id replaces the previous queue.
    pub fn connect(
        &self,
        connection_id: impl Into<String>,
        user_id: Option<&str>,
    ) -> mpsc::Receiver<HubMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let connection_id = connection_id.into();
        tracing::debug!(connection_id = %connection_id, user_id, "local transport: connection registered");
        self.tables.write().connections.insert(
            connection_id,
            Peer {
                user_id: user_id.map(str::to_owned),
                tx,
            },
        );
        rx
    }

    /// Forget a connection and its group memberships; returns whether it was known.
    pub fn disconnect(&self, connection_id: &str) -> bool {
        let mut tables = self.tables.write();
        let known = tables.connections.remove(connection_id).is_some();
        tables.groups.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
        known
    }

    /// Members of `group`, sorted.
    pub fn members(&self, group: &str) -> Vec<String> {
        self.tables.read().group(group).into_iter().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.tables.read().connections.len()
    }
}

#[async_trait]
impl MessageSender for LocalTransport {
    async fn send(&self, target: &Target, message: HubMessage) -> Result<(), TransportError> {
        let recipients: Vec<(String, Option<mpsc::Sender<HubMessage>>)> = {
            let tables = self.tables.read();
            tables
                .resolve(target)
                .into_iter()
                .map(|id| {
                    let tx = tables.connections.get(&id).map(|p| p.tx.clone());
                    (id, tx)
                })
                .collect()
        };

        let single = matches!(target, Target::Client(_));
        for (connection_id, tx) in recipients {
            let Some(tx) = tx else {
                if single {
                    return Err(TransportError::UnknownConnection { connection_id });
                }
                tracing::debug!(%connection_id, %target, "local transport: skipping unknown connection");
                continue;
            };
            if tx.send(message.clone()).await.is_err() {
                if single {
                    return Err(TransportError::ConnectionClosed { connection_id });
                }
                tracing::warn!(
                    %connection_id,
                    %target,
                    message = %message.target,
                    "local transport: dropped delivery to closed connection"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GroupManager for LocalTransport {
    async fn add_to_group(&self, connection_id: &str, group: &str) -> Result<(), TransportError> {
        let mut tables = self.tables.write();
        if !tables.connections.contains_key(connection_id) {
            return Err(TransportError::UnknownConnection {
                connection_id: connection_id.to_owned(),
            });
        }
        tables
            .groups
            .entry(group.to_owned())
            .or_default()
            .insert(connection_id.to_owned());
        Ok(())
    }

    async fn remove_from_group(
        &self,
        connection_id: &str,
        group: &str,
    ) -> Result<(), TransportError> {
        let mut tables = self.tables.write();
        if let Some(members) = tables.groups.get_mut(group) {
            members.remove(connection_id);
            if members.is_empty() {
                tables.groups.remove(group);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn drain(rx: &mut mpsc::Receiver<HubMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.target);
        }
        out
    }

    #[tokio::test]
    async fn targets_resolve_against_connection_group_and_user_tables() {
        let transport = LocalTransport::new(16);
        let mut a = transport.connect("a", Some("alice"));
        let mut b = transport.connect("b", Some("bob"));
        let mut c = transport.connect("c", Some("alice"));
        transport.add_to_group("a", "room").await.unwrap();
        transport.add_to_group("b", "room").await.unwrap();
        transport.add_to_group("c", "lobby").await.unwrap();

        let send = |target: Target, name: &str| {
            let message = HubMessage::new(name, vec![json!(1)]);
            let transport = &transport;
            async move { transport.send(&target, message).await.unwrap() }
        };
        send(Target::All, "all").await;
        send(Target::AllExcept(vec!["b".into()]), "all_except").await;
        send(Target::Client("b".into()), "client").await;
        send(Target::Group("room".into()), "group").await;
        send(
            Target::GroupExcept {
                group: "room".into(),
                excluded: vec!["a".into()],
            },
            "group_except",
        )
        .await;
        send(Target::Groups(vec!["room".into(), "lobby".into()]), "groups").await;
        send(Target::User("alice".into()), "user").await;
        send(Target::Users(vec!["bob".into()]), "users").await;

        assert_eq!(
            drain(&mut a),
            ["all", "all_except", "group", "groups", "user"]
        );
        assert_eq!(
            drain(&mut b),
            ["all", "client", "group", "group_except", "groups", "users"]
        );
        assert_eq!(drain(&mut c), ["all", "all_except", "groups", "user"]);
    }

    #[tokio::test]
    async fn direct_send_to_unknown_connection_fails() {
        let transport = LocalTransport::new(1);
        let err = transport
            .send(&Target::Client("ghost".into()), HubMessage::new("x", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownConnection { .. }));
    }

    #[tokio::test]
    async fn broadcast_skips_closed_receivers() {
        let transport = LocalTransport::new(1);
        let rx = transport.connect("gone", None);
        drop(rx);
        let mut live = transport.connect("live", None);

        transport
            .send(&Target::All, HubMessage::new("ping", vec![]))
            .await
            .unwrap();

        assert_eq!(drain(&mut live), ["ping"]);
    }

    #[tokio::test]
    async fn disconnect_clears_group_membership() {
        let transport = LocalTransport::new(4);
        let _rx = transport.connect("a", None);
        transport.add_to_group("a", "room").await.unwrap();
        assert_eq!(transport.members("room"), ["a"]);

        assert!(transport.disconnect("a"));
        assert!(transport.members("room").is_empty());
        assert_eq!(transport.connection_count(), 0);
        assert!(transport.add_to_group("a", "room").await.is_err());
    }
}
