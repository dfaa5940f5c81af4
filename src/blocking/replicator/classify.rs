//! Write-error classification.

use crate::DUPLICATE_KEY_SIGNATURE;
use mongodb::error::{Error as MongoError, ErrorKind};

/// True when `error` is the server's unique-key violation.
pub fn is_duplicate_key(error: &MongoError) -> bool {
    message_is_duplicate_key(&error.to_string())
}

fn message_is_duplicate_key(message: &str) -> bool {
    message.contains(DUPLICATE_KEY_SIGNATURE)
}

/// True when `error` is a command error whose message contains `msg`.
pub fn cmd_err_msg_contains(error: &MongoError, msg: &str) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Command(err) => err.message.to_lowercase().contains(msg),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_signature() {
        assert!(message_is_duplicate_key(
            "Kind: An error occurred when trying to execute a write operation: \
             WriteError { code: 11000, message: \"E11000 duplicate key error collection: \
             d.c index: _id_ dup key: { _id: 1 }\" }"
        ));
        assert!(!message_is_duplicate_key("connection refused"));
        assert!(!message_is_duplicate_key(""));
    }
}
