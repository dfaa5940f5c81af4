/// provide blocking replication apis.
mod connection;
#[doc(hidden)]
pub mod replicator;

pub use connection::ConnectArgs;
pub use replicator::{ConflictPolicy, FallbackConfig, Replicator};
