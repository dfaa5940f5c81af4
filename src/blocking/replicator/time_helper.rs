use bson::Timestamp;
use chrono::{DateTime, Local, LocalResult, TimeZone};

/// Render an oplog timestamp's seconds component as local wall-clock time.
pub fn to_local_time(ts: Timestamp) -> DateTime<Local> {
    match Local.timestamp_opt(i64::from(ts.time), 0) {
        LocalResult::Single(dt) => dt,
        _ => Local::now(),
    }
}
