use crate::error::{Result, SyncError};
use crate::TIMESTAMP_KEY;
use bson::{doc, Document, Timestamp};
use mongodb::sync::Collection;

/// Check that the entry at `start_ts` is still present in the oplog
/// collection.  On a capped log, a first hit newer than `start_ts` means the
/// log has rolled past the watermark.
///
/// Only the first entry at or after `start_ts` is inspected; continuity past
/// the watermark is not verified.
pub fn validate_start_point(coll: &Collection<Document>, start_ts: Timestamp) -> Result<()> {
    let first = coll
        .find_one(doc! {TIMESTAMP_KEY: {"$gte": start_ts}}, None)?
        .ok_or(SyncError::EmptyDocError)?;

    let first_ts = first.get_timestamp(TIMESTAMP_KEY)?;
    if first_ts == start_ts {
        Ok(())
    } else {
        let ns = coll.namespace();
        Err(SyncError::StaleWatermark {
            ns: format!("{}.{}", ns.db, ns.coll),
            start_ts,
        })
    }
}
