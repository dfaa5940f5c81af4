//! Oplog replay: validate the start watermark, open an appropriately-typed
//! cursor, then decode, filter, remap and apply every entry in source order.
//!
//! Replay is best effort per op: an applier error is logged with the raw
//! entry and the loop continues.  Only watermark validation, cursor open and
//! entry decode failures are fatal.

use super::{oplog_helper, status, time_helper};
use crate::error::Result;
use crate::ns::{self, Ns};
use crate::oplog::{OpType, OplogEntry};
use crate::{ID_KEY, OPLOG_COLL, OPLOG_DB, TIMESTAMP_KEY};
use bson::{doc, Document, Timestamp};
use mongodb::options::{CursorType, FindOptions, ReplaceOptions, UpdateOptions};
use mongodb::sync::Client;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Replay oplog entries from `src_oplog_ns` (default `local.oplog.rs`)
/// against the destination.
///
/// `end_ts` of `None` tails the capped log forever; a bounded window always
/// uses a finite non-tailing cursor.  `ns_filter` restricts which
/// namespaces are replayed (empty admits everything); `ns_map` remaps them.
pub fn replay_oplog(
    source: &Client,
    target: &Client,
    start_ts: Timestamp,
    end_ts: Option<Timestamp>,
    src_oplog_ns: Option<&str>,
    ns_filter: &[String],
    ns_map: &HashMap<String, String>,
) -> Result<()> {
    let default_ns = format!("{}.{}", OPLOG_DB, OPLOG_COLL);
    let oplog_ns = match src_oplog_ns {
        Some(ns) if !ns.is_empty() => ns,
        _ => default_ns.as_str(),
    };
    let oplog_ns = Ns::parse(oplog_ns)?;
    let capped_source = oplog_ns.to_string() == default_ns;

    let source_coll = source
        .database(&oplog_ns.db)
        .collection::<Document>(&oplog_ns.coll);
    oplog_helper::validate_start_point(&source_coll, start_ts)?;

    // a tailing cursor would block forever once a bounded window drains.
    let tailing = capped_source && end_ts.is_none();
    let filter = match end_ts {
        None => doc! {TIMESTAMP_KEY: {"$gte": start_ts}},
        Some(end) => doc! {TIMESTAMP_KEY: {"$gte": start_ts, "$lte": end}},
    };
    let find_opts = FindOptions::builder()
        .cursor_type(if tailing {
            CursorType::TailableAwait
        } else {
            CursorType::NonTailable
        })
        .no_cursor_timeout(true)
        .build();
    let cursor = source_coll.find(filter, find_opts)?;
    info!(?start_ts, ?end_ts, oplog_ns = %oplog_ns, "Begin oplog replay.");

    for raw in cursor {
        let raw = raw?;
        let entry = OplogEntry::from_document(&raw)?;

        if tailing {
            emit_heartbeat(source, &entry);
        }

        if entry.op == OpType::Noop {
            continue;
        }
        let effective = match entry.effective_ns() {
            Some(ns) => ns,
            None => continue,
        };
        let effective = match Ns::parse(effective) {
            Ok(ns) => ns,
            Err(e) => {
                warn!(error = %e, entry = ?raw, "Entry namespace is malformed, skipped.");
                continue;
            }
        };
        if !ns::filter_admits(&effective, ns_filter) {
            continue;
        }

        apply_entry(target, &entry, &effective, ns_map, &raw);
    }

    info!(?start_ts, ?end_ts, "Oplog replay complete.");
    Ok(())
}

/// Tell the operator when replay has caught up with the primary's head.
fn emit_heartbeat(source: &Client, entry: &OplogEntry<'_>) {
    if let Ok(latest) = status::latest_oplog_ts(source) {
        if latest == entry.ts {
            info!(
                ts = %time_helper::to_local_time(entry.ts),
                "Replaying at the live head of the oplog, interrupt with ctrl-c when done."
            );
        }
    }
}

fn apply_entry(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
    raw: &Document,
) {
    let result = match &entry.op {
        OpType::Insert if entry.has_id() => apply_insert(target, entry, effective, ns_map),
        OpType::Insert => apply_index_build(target, entry, effective, ns_map, raw),
        OpType::Update => apply_update(target, entry, effective, ns_map, raw),
        OpType::Delete => apply_delete(target, entry, effective, ns_map, raw),
        OpType::Command => apply_command(target, entry, effective, ns_map, raw),
        OpType::Noop => Ok(()),
        OpType::Other(code) => {
            warn!(op = %code, entry = ?raw, "Unrecognized oplog operation, skipped.");
            Ok(())
        }
    };
    if let Err(e) = result {
        error!(error = %e, entry = ?raw, "Failed to apply oplog entry, continuing.");
    }
}

/// `i` with `_id`: replace-with-upsert keyed on `_id`, so re-applying the
/// same entry stays idempotent.
fn apply_insert(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
) -> Result<()> {
    let mapped = ns::map_namespace(&effective.to_string(), ns_map)?;
    // has_id() was checked by the dispatcher.
    let o = match entry.o {
        Some(o) => o,
        None => return Ok(()),
    };
    let id = match o.get(ID_KEY) {
        Some(id) => id.clone(),
        None => return Ok(()),
    };

    let coll = target
        .database(&mapped.dst.db)
        .collection::<Document>(&mapped.dst.coll);
    let opts = ReplaceOptions::builder().upsert(true).build();
    coll.replace_one(doc! {"_id": id}, o.clone(), opts)?;
    Ok(())
}

/// `i` without `_id`: index build against `o.ns`.
fn apply_index_build(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
    raw: &Document,
) -> Result<()> {
    let o = match entry.o {
        Some(o) => o,
        None => {
            warn!(entry = ?raw, "Index-build entry carries no payload, skipped.");
            return Ok(());
        }
    };
    let (key, name) = match (o.get_document("key"), o.get_str("name")) {
        (Ok(key), Ok(name)) => (key, name),
        _ => {
            warn!(entry = ?raw, "Index-build entry lacks key or name, skipped.");
            return Ok(());
        }
    };

    let mapped = ns::map_namespace(&effective.to_string(), ns_map)?;
    let index_info = doc! {"key": key.clone(), "name": name, "background": true};
    target.database(&mapped.dst.db).run_command(
        doc! {"createIndexes": &mapped.dst.coll, "indexes": [index_info]},
        None,
    )?;
    Ok(())
}

/// `u`: operator update when `o` starts with an update operator, otherwise
/// a full-document replace.  Both upsert.
fn apply_update(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
    raw: &Document,
) -> Result<()> {
    let (o, o2) = match (entry.o, entry.o2) {
        (Some(o), Some(o2)) => (o, o2),
        _ => {
            warn!(entry = ?raw, "Update entry lacks payload or selector, skipped.");
            return Ok(());
        }
    };

    let mapped = ns::map_namespace(&effective.to_string(), ns_map)?;
    let coll = target
        .database(&mapped.dst.db)
        .collection::<Document>(&mapped.dst.coll);
    if entry.is_update_operator() {
        let mut update = o.clone();
        // server-internal update versioning, never sent back.
        update.remove("$v");
        let opts = UpdateOptions::builder()
            .upsert(true)
            .bypass_document_validation(false)
            .build();
        coll.update_one(o2.clone(), update, opts)?;
    } else {
        let opts = ReplaceOptions::builder().upsert(true).build();
        coll.replace_one(o2.clone(), o.clone(), opts)?;
    }
    Ok(())
}

/// `d`: delete by the entry's selector payload.
fn apply_delete(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
    raw: &Document,
) -> Result<()> {
    let o = match entry.o {
        Some(o) => o,
        None => {
            warn!(entry = ?raw, "Delete entry carries no selector, skipped.");
            return Ok(());
        }
    };
    let mapped = ns::map_namespace(&effective.to_string(), ns_map)?;
    target
        .database(&mapped.dst.db)
        .collection::<Document>(&mapped.dst.coll)
        .delete_one(o.clone(), None)?;
    Ok(())
}

/// `c`: run the command document, field order preserved, against the
/// database-level remap of the entry's database.
fn apply_command(
    target: &Client,
    entry: &OplogEntry<'_>,
    effective: &Ns,
    ns_map: &HashMap<String, String>,
    raw: &Document,
) -> Result<()> {
    let o = match entry.o {
        Some(o) => o,
        None => {
            warn!(entry = ?raw, "Command entry carries no command document, skipped.");
            return Ok(());
        }
    };
    let dst = ns::map_command_ns(effective, ns_map);
    target.database(&dst.db).run_command(o.clone(), None)?;
    Ok(())
}
