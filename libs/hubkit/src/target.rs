//! Addressable targets for outbound client messages.

use std::fmt;

/// Which connected peers an outbound message is delivered to.
///
/// A client proxy is always built over exactly one target; the transport
/// resolves it to concrete connections at send time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Every connection on the hub.
    All,
    /// Every connection except the listed connection ids.
    AllExcept(Vec<String>),
    /// A single connection.
    Client(String),
    /// A list of connections.
    Clients(Vec<String>),
    /// Every member of one group.
    Group(String),
    /// Every member of one group except the listed connection ids.
    GroupExcept {
        group: String,
        excluded: Vec<String>,
    },
    /// Every member of any of the listed groups (each connection at most once).
    Groups(Vec<String>),
    /// Every connection authenticated as the user.
    User(String),
    /// Every connection authenticated as any of the listed users.
    Users(Vec<String>),
}

impl Target {
    /// Connection ids this target explicitly excludes.
    #[must_use]
    pub fn excluded(&self) -> &[String] {
        match self {
            Target::AllExcept(excluded) | Target::GroupExcept { excluded, .. } => excluded,
            _ => &[],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::AllExcept(ids) => write!(f, "all except {}", ids.join(",")),
            Target::Client(id) => write!(f, "client {id}"),
            Target::Clients(ids) => write!(f, "clients {}", ids.join(",")),
            Target::Group(group) => write!(f, "group {group}"),
            Target::GroupExcept { group, excluded } => {
                write!(f, "group {group} except {}", excluded.join(","))
            }
            Target::Groups(groups) => write!(f, "groups {}", groups.join(",")),
            Target::User(user) => write!(f, "user {user}"),
            Target::Users(users) => write!(f, "users {}", users.join(",")),
        }
    }
}
