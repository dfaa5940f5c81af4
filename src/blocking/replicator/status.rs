use crate::error::{Result, SyncError};
use crate::ADMIN_DB_NAME;
use bson::{doc, Bson, Timestamp};
use mongodb::sync::Client;

const PRIMARY_STATE: &str = "PRIMARY";

/// Latest oplog timestamp of the replica set's primary, read from
/// `replSetGetStatus` against `admin`.
///
/// On servers >= 3.2 the member's `optime` is a subdocument holding `ts`;
/// older servers report the timestamp directly.  Both shapes are accepted.
pub fn latest_oplog_ts(client: &Client) -> Result<Timestamp> {
    let reply = client
        .database(ADMIN_DB_NAME)
        .run_command(doc! {"replSetGetStatus": 1}, None)?;

    for member in reply.get_array("members")? {
        let member = match member {
            Bson::Document(doc) => doc,
            _ => continue,
        };
        if member.get_str("stateStr").ok() != Some(PRIMARY_STATE) {
            continue;
        }
        return match member.get("optime") {
            Some(Bson::Document(optime)) => Ok(optime.get_timestamp("ts")?),
            Some(Bson::Timestamp(ts)) => Ok(*ts),
            other => Err(SyncError::BsonValueError {
                key: "optime".to_string(),
                val: format!("{:?}", other),
            }),
        };
    }
    Err(SyncError::NoPrimary)
}
