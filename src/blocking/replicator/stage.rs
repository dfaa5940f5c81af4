use super::{oplog_helper, status, time_helper};
use crate::error::Result;
use crate::{OPLOG_COLL, OPLOG_DB, STAGING_COLL, STAGING_DB, TIMESTAMP_KEY};
use bson::{doc, Document, Timestamp};
use mongodb::options::{CursorType, FindOptions, InsertOneOptions};
use mongodb::sync::Client;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Give a freshly-elected primary a moment before the tailing cursor opens.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Tail the capped source oplog from `start_ts` and write each entry
/// verbatim into `syncoplog.oplog.rs` on the destination, for deferred
/// replay.
///
/// The caller is responsible for ensuring the staging namespace is empty;
/// the first insert creates it.  Runs until externally interrupted.
pub fn stage_oplog(source: &Client, target: &Client, start_ts: Timestamp) -> Result<()> {
    let source_coll = source.database(OPLOG_DB).collection::<Document>(OPLOG_COLL);
    let staging_coll = target
        .database(STAGING_DB)
        .collection::<Document>(STAGING_COLL);

    thread::sleep(SETTLE_DELAY);
    oplog_helper::validate_start_point(&source_coll, start_ts)?;

    let find_opts = FindOptions::builder()
        .cursor_type(CursorType::TailableAwait)
        .no_cursor_timeout(true)
        .build();
    let cursor = source_coll.find(doc! {TIMESTAMP_KEY: {"$gte": start_ts}}, find_opts)?;
    info!(?start_ts, "Begin to stage oplog.");

    let insert_opts = InsertOneOptions::builder()
        .bypass_document_validation(true)
        .build();
    for doc in cursor {
        let doc = doc?;
        let ts = doc.get_timestamp(TIMESTAMP_KEY)?;

        if let Ok(latest) = status::latest_oplog_ts(source) {
            if latest == ts {
                info!(
                    ts = %time_helper::to_local_time(ts),
                    "Staging at the live head of the oplog, interrupt with ctrl-c when done."
                );
            }
        }

        staging_coll.insert_one(&doc, insert_opts.clone())?;
    }
    Ok(())
}
