//! Transport backends implementing [`MessageSender`](crate::MessageSender) and
//! [`GroupManager`](crate::GroupManager).

pub mod local;

pub use local::LocalTransport;
