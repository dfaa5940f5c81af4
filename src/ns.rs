//! Namespace handling: parsing `database.collection` strings, applying the
//! user-supplied remap table, and deciding which oplog entries a namespace
//! filter admits.

use crate::error::{Result, SyncError};
use crate::CMD_COLL;
use std::collections::HashMap;
use std::fmt;

/// A parsed `database.collection` pair.
///
/// The split happens at the first `.`; collection names may themselves
/// contain dots (`system.indexes`, `oplog.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ns {
    pub db: String,
    pub coll: String,
}

impl Ns {
    pub fn parse(ns: &str) -> Result<Ns> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Ns {
                db: db.to_string(),
                coll: coll.to_string(),
            }),
            _ => Err(SyncError::InvalidNamespace { ns: ns.to_string() }),
        }
    }

    pub fn is_cmd(&self) -> bool {
        self.coll == CMD_COLL
    }
}

impl fmt::Display for Ns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// Source and destination sides of one namespace after remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsMap {
    pub src: Ns,
    pub dst: Ns,
}

/// Resolve `ns` through the remap `table`.  Identity when the table has no
/// entry for it.
pub fn map_namespace(ns: &str, table: &HashMap<String, String>) -> Result<NsMap> {
    let src = Ns::parse(ns)?;
    let dst = match table.get(ns) {
        Some(mapped) => Ns::parse(mapped)?,
        None => src.clone(),
    };
    Ok(NsMap { src, dst })
}

/// Destination namespace for a command entry.
///
/// The remap table is keyed by user namespaces, never by `db.$cmd`, so a
/// command follows the database-level remap of any entry covering a
/// collection in its database.  The collection side stays `$cmd`.  Entries
/// are tried in lexicographic key order, so the covering entry with the
/// smallest key wins on every run.
pub fn map_command_ns(ns: &Ns, table: &HashMap<String, String>) -> Ns {
    let mut entries: Vec<(&String, &String)> = table.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (src, dst) in entries {
        let covers = src.split_once('.').map(|(db, _)| db) == Some(ns.db.as_str());
        if covers {
            if let Some((dst_db, _)) = dst.split_once('.') {
                return Ns {
                    db: dst_db.to_string(),
                    coll: CMD_COLL.to_string(),
                };
            }
        }
    }
    Ns {
        db: ns.db.clone(),
        coll: CMD_COLL.to_string(),
    }
}

/// Whether a namespace filter admits `ns`.
///
/// An empty filter admits everything.  Otherwise an entry admits `ns` when
/// it is equal to it, or when `ns` is a `$cmd` namespace and the entry names
/// any collection under the same database.
pub fn filter_admits(ns: &Ns, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let full = ns.to_string();
    let db_prefix = format!("{}.", ns.db);
    filter
        .iter()
        .any(|entry| *entry == full || (ns.is_cmd() && entry.starts_with(&db_prefix)))
}
