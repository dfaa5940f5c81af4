//! Batched destination writes with a degraded single-document fallback.
//!
//! An ordered multi-insert gives throughput on clean data; on the first
//! violation the bulk aborts at that position, and a per-document pass
//! completes the batch while staying idempotent under the chosen policy.

use super::classify;
use crate::error::Result;
use crate::ID_KEY;
use bson::Document;
use crossbeam::channel;
use mongodb::options::{InsertManyOptions, InsertOneOptions, ReplaceOptions};
use mongodb::sync::Collection;
use rayon::ThreadPoolBuilder;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What to do with a document whose `_id` already exists on the destination.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// keep the destination document, count the write as success.
    SkipOnDuplicate,
    /// overwrite the destination document with the source one.
    ReplaceOnDuplicate,
}

/// Sizing of the degraded writer; defaults balance driver concurrency
/// against connection pool pressure.
#[derive(Deserialize, Debug, Clone)]
pub struct FallbackConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_workers() -> usize {
    500
}

fn default_queue_depth() -> usize {
    1000
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

pub struct BatchOutcome {
    pub success: u64,
    pub failed: u64,
}

/// Write `docs` with an ordered multi-insert; on any error, re-drive the
/// whole batch through the per-document fallback pool.
pub fn write_batch(
    coll: &Collection<Document>,
    docs: Vec<Document>,
    policy: ConflictPolicy,
    fallback: &FallbackConfig,
) -> Result<BatchOutcome> {
    let ns = coll.namespace();
    let ns = format!("{}.{}", ns.db, ns.coll);
    let total = docs.len() as u64;

    let opts = InsertManyOptions::builder()
        .ordered(true)
        .bypass_document_validation(false)
        .build();
    match coll.insert_many(&docs, opts) {
        Ok(_) => {
            info!(%ns, docs = total, "Batch insert complete.");
            Ok(BatchOutcome {
                success: total,
                failed: 0,
            })
        }
        Err(e) => {
            info!(%ns, error = %e, docs = total, "Batch insert degraded to per-document writes.");
            let outcome = degrade_to_single(coll, &ns, docs, policy, fallback)?;
            info!(
                %ns,
                success = outcome.success,
                failed = outcome.failed,
                "Per-document pass complete."
            );
            Ok(outcome)
        }
    }
}

/// Drain the failed batch through a bounded channel consumed by a worker
/// pool.  The pool is built for this batch only and torn down before the
/// next batch is attempted.
fn degrade_to_single(
    coll: &Collection<Document>,
    ns: &str,
    docs: Vec<Document>,
    policy: ConflictPolicy,
    fallback: &FallbackConfig,
) -> Result<BatchOutcome> {
    let (doc_tx, doc_rx) = channel::bounded::<Document>(fallback.queue_depth);
    let (done_tx, done_rx) = channel::bounded(fallback.workers);
    let success = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));

    let pool = ThreadPoolBuilder::new()
        .num_threads(fallback.workers)
        .build()
        .unwrap();
    for _ in 0..fallback.workers {
        let doc_rx = doc_rx.clone();
        let done_tx = done_tx.clone();
        let coll = coll.clone();
        let ns = ns.to_string();
        let success = success.clone();
        let failed = failed.clone();
        pool.spawn(move || {
            for doc in doc_rx {
                apply_one(&coll, &ns, doc, policy, &success, &failed);
            }
            let _ = done_tx.send(());
        });
    }
    drop(doc_rx);
    drop(done_tx);

    for doc in docs {
        // blocks while the queue is full; workers drain concurrently.
        if doc_tx.send(doc).is_err() {
            break;
        }
    }
    drop(doc_tx);

    for _ in 0..fallback.workers {
        done_rx.recv()?;
    }

    Ok(BatchOutcome {
        success: success.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    })
}

fn apply_one(
    coll: &Collection<Document>,
    ns: &str,
    doc: Document,
    policy: ConflictPolicy,
    success: &AtomicU64,
    failed: &AtomicU64,
) {
    match policy {
        ConflictPolicy::ReplaceOnDuplicate => {
            let id = match doc.get(ID_KEY) {
                Some(id) => id.clone(),
                None => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    error!(%ns, ?doc, "Document carries no _id, can't replace.");
                    return;
                }
            };
            let opts = ReplaceOptions::builder()
                .upsert(true)
                .bypass_document_validation(false)
                .build();
            match coll.replace_one(bson::doc! {"_id": id.clone()}, doc.clone(), opts) {
                Ok(_) => {
                    success.fetch_add(1, Ordering::Relaxed);
                    debug!(%ns, ?id, "ReplaceOne complete.");
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    error!(%ns, error = %e, ?doc, "ReplaceOne failed.");
                }
            }
        }
        ConflictPolicy::SkipOnDuplicate => {
            let opts = InsertOneOptions::builder()
                .bypass_document_validation(true)
                .build();
            match coll.insert_one(&doc, opts) {
                Ok(_) => {
                    success.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if classify::is_duplicate_key(&e) => {
                    // the _id is already there, which is what this policy wants.
                    success.fetch_add(1, Ordering::Relaxed);
                    debug!(%ns, error = %e, "Duplicate _id skipped.");
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    error!(%ns, error = %e, ?doc, "InsertOne failed.");
                }
            }
        }
    }
}
