//! The database side of the edge: a thread-affined connection gateway
//! and a 2PC-capable participant wrapping Postgres's
//! native prepared-transaction support.

mod gateway;
mod participant;

pub use gateway::DbGateway;
pub use participant::DbParticipant;
