#![allow(missing_docs)]

use bson::document::ValueAccessError;
use bson::Timestamp;
use crossbeam::channel::RecvError;
use mongodb::error::Error as MongoError;
use std::backtrace::Backtrace;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Mongodb connection error")]
    MongoError {
        #[from]
        source: MongoError,
        backtrace: Backtrace,
    },
    #[error("Mongodb document value error")]
    BsonError {
        #[from]
        source: ValueAccessError,
        backtrace: Backtrace,
    },
    #[error("Invalid doc value for bson, get key: {key:?}, val: {val:?}")]
    BsonValueError { key: String, val: String },
    #[error("Invalid namespace {ns:?}, expected `database.collection`")]
    InvalidNamespace { ns: String },
    #[error("No PRIMARY member found in replica-set status")]
    NoPrimary,
    #[error("Can't fetch doc from mongodb")]
    EmptyDocError,
    #[error(
        "The oplog entry at {start_ts:?} has been overwritten in {ns}; run `stage` to copy the \
         remaining oplog into syncoplog.oplog.rs, then `replay --from-ns syncoplog.oplog.rs`"
    )]
    StaleWatermark { ns: String, start_ts: Timestamp },
    #[error("{failed} documents of a batch for {ns} could not be written")]
    BatchWriteFailure { ns: String, failed: u64 },
    #[error("Creating index {name:?} on {ns} failed")]
    IndexCreateError {
        ns: String,
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("Receiver task message error")]
    ReceiveStatusError {
        #[from]
        source: RecvError,
        backtrace: Backtrace,
    },
}

pub type Result<T> = StdResult<T, SyncError>;
