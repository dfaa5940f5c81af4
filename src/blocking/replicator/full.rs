use super::bulk::{self, ConflictPolicy, FallbackConfig};
use super::index;
use crate::error::{Result, SyncError};
use crate::ns::Ns;
use bson::{doc, Document};
use mongodb::options::{CursorType, FindOptions, Hint};
use mongodb::sync::{Client, Collection};
use std::time::Instant;
use tracing::info;

const BATCH_SIZE: usize = 10000;

/// Copy every document of `src_ns` into `dst_ns` in batches of 10000,
/// cloning indexes first unless `skip_indexes` is set.
///
/// A decode error aborts the copy; a batch whose failure count is non-zero
/// aborts it too.  Destination document order is not preserved.
pub fn copy_collection(
    source: &Client,
    target: &Client,
    src_ns: &str,
    dst_ns: &str,
    policy: ConflictPolicy,
    skip_indexes: bool,
    fallback: &FallbackConfig,
) -> Result<()> {
    let start = Instant::now();
    let src = Ns::parse(src_ns)?;
    let dst = Ns::parse(dst_ns)?;

    if !skip_indexes {
        index::clone_indexes(source, &src, target, &dst)?;
    }

    let source_coll = source.database(&src.db).collection::<Document>(&src.coll);
    let target_coll = target.database(&dst.db).collection::<Document>(&dst.coll);

    // snapshot reads are gone on modern servers; an `_id` hint keeps the
    // full scan stable instead.
    let find_opts = FindOptions::builder()
        .cursor_type(CursorType::NonTailable)
        .no_cursor_timeout(true)
        .batch_size(BATCH_SIZE as u32)
        .hint(Hint::Keys(doc! {"_id": 1}))
        .build();
    let cursor = source_coll.find(doc! {}, find_opts)?;

    let mut buffer: Vec<Document> = Vec::with_capacity(BATCH_SIZE);
    let mut copied: u64 = 0;
    for doc in cursor {
        buffer.push(doc?);
        if buffer.len() == BATCH_SIZE {
            let mut batch = Vec::with_capacity(BATCH_SIZE);
            std::mem::swap(&mut buffer, &mut batch);
            copied += flush_batch(&target_coll, &dst, batch, policy, fallback)?;
        }
    }
    if !buffer.is_empty() {
        copied += flush_batch(&target_coll, &dst, buffer, policy, fallback)?;
    }

    info!(
        src = %src,
        dst = %dst,
        copied,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Collection copy complete."
    );
    Ok(())
}

fn flush_batch(
    coll: &Collection<Document>,
    dst: &Ns,
    docs: Vec<Document>,
    policy: ConflictPolicy,
    fallback: &FallbackConfig,
) -> Result<u64> {
    let outcome = bulk::write_batch(coll, docs, policy, fallback)?;
    if outcome.failed != 0 {
        return Err(SyncError::BatchWriteFailure {
            ns: dst.to_string(),
            failed: outcome.failed,
        });
    }
    Ok(outcome.success)
}
