use super::classify;
use crate::error::{Result, SyncError};
use crate::ns::Ns;
use bson::{doc, Bson};
use mongodb::sync::Client;
use tracing::{debug, info, warn};

/// Index options carried from source to destination.
const CARRIED_OPTIONS: [&str; 8] = [
    "name",
    "unique",
    "sparse",
    "expireAfterSeconds",
    "partialFilterExpression",
    "weights",
    "default_language",
    "language_override",
];

/// Recreate every index of `src` on `dst`, in source enumeration order.
///
/// The implicit `_id` index is reported by `listIndexes` and already exists
/// on the destination; its "already exists" reply is tolerated.  Any other
/// creation error is fatal.
pub fn clone_indexes(source: &Client, src: &Ns, target: &Client, dst: &Ns) -> Result<()> {
    let reply = source
        .database(&src.db)
        .run_command(doc! {"listIndexes": &src.coll}, None)?;
    let indexes = reply.get_document("cursor")?.get_array("firstBatch")?;
    // TODO: indexes beyond the first server batch need a getMore; the driver
    // has no command-cursor api to page listIndexes.

    let target_db = target.database(&dst.db);
    for index in indexes {
        let index = match index {
            Bson::Document(doc) => doc,
            other => {
                warn!(?other, "listIndexes returned a non-document entry, skipped.");
                continue;
            }
        };

        let mut index_info = doc! {"key": index.get_document("key")?.clone()};
        for opt in CARRIED_OPTIONS {
            if let Some(value) = index.get(opt) {
                index_info.insert(opt, value.clone());
            }
        }

        let name = index.get_str("name").unwrap_or("").to_string();
        let create = target_db.run_command(
            doc! {"createIndexes": &dst.coll, "indexes": [index_info]},
            None,
        );
        if let Err(e) = create {
            if !classify::cmd_err_msg_contains(&e, "already exists") {
                return Err(SyncError::IndexCreateError {
                    ns: dst.to_string(),
                    name,
                    source: e,
                });
            }
        }
        debug!(ns = %dst, index = %name, "Index cloned.");
    }
    info!(src = %src, dst = %dst, "Index clone complete.");
    Ok(())
}
