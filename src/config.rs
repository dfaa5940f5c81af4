//! mongo-mirror configuration, expressed in toml.
//!
//! Basic configuration file example:
//! ```toml
//! [src]
//! # source cluster, needs to be a replica set for oplog access.
//! host = "192.168.10.5"
//! port = 27017
//! username = "mirror"
//! password = "secret"
//! auth_db = "admin"
//!
//! [dst]
//! host = "192.168.10.67"
//!
//! [sync]
//! # namespaces to replicate; empty means every non-system namespace.
//! namespaces = ["shop.orders", "shop.users"]
//! # optional remap table, source namespace -> destination namespace.
//! ns_map = { "shop.orders" = "archive.orders" }
//! policy = "skip_on_duplicate"
//! skip_indexes = false
//!
//! [fallback]
//! workers = 500
//! queue_depth = 1000
//! ```

use crate::blocking::{ConnectArgs, ConflictPolicy, FallbackConfig};
use serde::Deserialize;
use std::collections::HashMap;

/// Global mirror configuration.
#[derive(Deserialize, Debug)]
pub struct MirrorConfig {
    src: ConnectArgs,
    dst: ConnectArgs,
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    fallback: FallbackConfig,
}

impl MirrorConfig {
    /// get source cluster connection arguments.
    pub fn get_src(&self) -> &ConnectArgs {
        &self.src
    }

    /// get destination cluster connection arguments.
    pub fn get_dst(&self) -> &ConnectArgs {
        &self.dst
    }

    /// get namespaces to replicate, empty means all non-system namespaces.
    pub fn get_namespaces(&self) -> &[String] {
        &self.sync.namespaces
    }

    /// get the namespace remap table.
    pub fn get_ns_map(&self) -> &HashMap<String, String> {
        &self.sync.ns_map
    }

    /// get the snapshot conflict policy.
    pub fn get_policy(&self) -> ConflictPolicy {
        self.sync.policy
    }

    pub fn skip_indexes(&self) -> bool {
        self.sync.skip_indexes
    }

    /// get the degraded-writer sizing.
    pub fn get_fallback(&self) -> FallbackConfig {
        self.fallback.clone()
    }
}

/// Detail sync config: which namespaces to replicate and how conflicts on
/// pre-existing destination documents are resolved.
#[derive(Deserialize, Debug)]
struct SyncSection {
    #[serde(default)]
    namespaces: Vec<String>,
    #[serde(default)]
    ns_map: HashMap<String, String>,
    #[serde(default = "default_policy")]
    policy: ConflictPolicy,
    #[serde(default)]
    skip_indexes: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            namespaces: Vec::new(),
            ns_map: HashMap::new(),
            policy: default_policy(),
            skip_indexes: false,
        }
    }
}

fn default_policy() -> ConflictPolicy {
    ConflictPolicy::SkipOnDuplicate
}
