mod bulk;
mod classify;
mod discovery;
mod full;
mod index;
mod oplog_helper;
mod replay;
mod stage;
mod status;
mod time_helper;

pub use bulk::{ConflictPolicy, FallbackConfig};

use crate::blocking::connection::ConnectArgs;
use crate::error::Result;
use bson::Timestamp;
use mongodb::sync::Client;
use std::collections::HashMap;

/// One-way replication engine bound to a source and a destination cluster.
///
/// # Example
/// ```no_run
/// use mongo_mirror::{ConflictPolicy, FallbackConfig, Replicator};
///
/// let replicator =
///     Replicator::new("mongodb://localhost:27017", "mongodb://localhost:27018").unwrap();
/// replicator
///     .copy_collection(
///         "shop.orders",
///         "shop.orders",
///         ConflictPolicy::SkipOnDuplicate,
///         false,
///         &FallbackConfig::default(),
///     )
///     .unwrap();
/// ```
pub struct Replicator {
    source: Client,
    target: Client,
}

impl Replicator {
    /// connect to both clusters by URI.
    pub fn new(src_uri: &str, dst_uri: &str) -> Result<Replicator> {
        Ok(Replicator {
            source: Client::with_uri_str(src_uri)?,
            target: Client::with_uri_str(dst_uri)?,
        })
    }

    /// connect to both clusters from connection arguments.
    pub fn connect(src: &ConnectArgs, dst: &ConnectArgs) -> Result<Replicator> {
        Ok(Replicator {
            source: src.connect()?,
            target: dst.connect()?,
        })
    }

    /// Copy every document of `src_ns` into `dst_ns`, cloning indexes first
    /// unless `skip_indexes` is set.
    pub fn copy_collection(
        &self,
        src_ns: &str,
        dst_ns: &str,
        policy: ConflictPolicy,
        skip_indexes: bool,
        fallback: &FallbackConfig,
    ) -> Result<()> {
        full::copy_collection(
            &self.source,
            &self.target,
            src_ns,
            dst_ns,
            policy,
            skip_indexes,
            fallback,
        )
    }

    /// Recreate every index of `src_ns` on `dst_ns`.
    pub fn clone_indexes(&self, src_ns: &str, dst_ns: &str) -> Result<()> {
        let src = crate::ns::Ns::parse(src_ns)?;
        let dst = crate::ns::Ns::parse(dst_ns)?;
        index::clone_indexes(&self.source, &src, &self.target, &dst)
    }

    /// Latest oplog timestamp of the source primary.
    pub fn latest_oplog_ts(&self) -> Result<Timestamp> {
        status::latest_oplog_ts(&self.source)
    }

    /// Tail the source oplog from `start_ts` into the staging namespace on
    /// the destination, for deferred replay.
    pub fn stage_oplog(&self, start_ts: Timestamp) -> Result<()> {
        stage::stage_oplog(&self.source, &self.target, start_ts)
    }

    /// Replay oplog entries against the destination.
    ///
    /// `end_ts` of `None` tails forever; `src_oplog_ns` of `None` reads the
    /// capped `local.oplog.rs`.
    pub fn replay_oplog(
        &self,
        start_ts: Timestamp,
        end_ts: Option<Timestamp>,
        src_oplog_ns: Option<&str>,
        ns_filter: &[String],
        ns_map: &HashMap<String, String>,
    ) -> Result<()> {
        replay::replay_oplog(
            &self.source,
            &self.target,
            start_ts,
            end_ts,
            src_oplog_ns,
            ns_filter,
            ns_map,
        )
    }

    /// Database names on the source, excluding `admin` and `local`.
    pub fn list_non_system_databases(&self) -> Result<Vec<String>> {
        discovery::list_non_system_databases(&self.source)
    }

    /// Collection names in `db` on the source.
    pub fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        discovery::list_collections(&self.source, db)
    }
}
