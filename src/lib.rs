#![feature(error_generic_member_access)]

mod blocking;
mod config;
mod error;
mod logger;
mod ns;
mod oplog;

const ADMIN_DB_NAME: &str = "admin";
const OPLOG_DB: &str = "local";
const OPLOG_COLL: &str = "oplog.rs";
const STAGING_DB: &str = "syncoplog";
const STAGING_COLL: &str = "oplog.rs";

// oplog relative keys.
const TIMESTAMP_KEY: &str = "ts";
const OP_KEY: &str = "op";
const NAMESPACE_KEY: &str = "ns";
const OBJECT_KEY: &str = "o";
const SELECTOR_KEY: &str = "o2";
const ID_KEY: &str = "_id";
const CMD_COLL: &str = "$cmd";

/// Marker the server puts in unique-key violation messages.
const DUPLICATE_KEY_SIGNATURE: &str = "E11000 duplicate key error";

pub use blocking::{ConnectArgs, ConflictPolicy, FallbackConfig, Replicator};
pub use config::MirrorConfig;
pub use error::{Result, SyncError};
pub use logger::init_logger;
pub use ns::{Ns, NsMap};
pub use oplog::{OpType, OplogEntry};
