//! Typed view over raw oplog documents.
//!
//! Most oplog information comes from here:
//! https://github.com/mongodb/mongo/blob/master/src/mongo/db/repl/oplog_entry.idl
//!
//! Useful fields:
//! ts: The time when the oplog entry was created. (Timestamp)
//! op: The operation type. (enum OpType)
//! ns: The namespace on which to apply the operation. (String)
//! o: The operation applied. (Document)
//! o2: Selector for `u` and `d` operations. (Document)
//!
//! The raw `Document` is kept alongside the typed view because field order
//! is load bearing when `o` is replayed as a command.

use crate::error::Result;
use crate::{ID_KEY, NAMESPACE_KEY, OBJECT_KEY, OP_KEY, SELECTOR_KEY, TIMESTAMP_KEY};
use bson::{Document, Timestamp};

/// The type of an operation in the oplog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpType {
    /// represented by "i": document insert, or index build when `o` has no `_id`.
    Insert,
    /// represented by "u": operator update, or full-document replace.
    Update,
    /// represented by "d"
    Delete,
    /// represented by "c"
    Command,
    /// represented by "n", never applied.
    Noop,
    /// anything else; logged and skipped.
    Other(String),
}

impl OpType {
    pub fn parse(op: &str) -> OpType {
        match op {
            "i" => OpType::Insert,
            "u" => OpType::Update,
            "d" => OpType::Delete,
            "c" => OpType::Command,
            "n" => OpType::Noop,
            other => OpType::Other(other.to_string()),
        }
    }
}

/// Borrowed typed view of one oplog entry.
pub struct OplogEntry<'a> {
    pub ts: Timestamp,
    pub op: OpType,
    pub ns: &'a str,
    pub o: Option<&'a Document>,
    pub o2: Option<&'a Document>,
}

impl<'a> OplogEntry<'a> {
    /// Decode the fields the engine dispatches on.  `ts` and `op` are
    /// required; `ns` is empty for noops; `o`/`o2` are op dependent.
    pub fn from_document(doc: &'a Document) -> Result<OplogEntry<'a>> {
        Ok(OplogEntry {
            ts: doc.get_timestamp(TIMESTAMP_KEY)?,
            op: OpType::parse(doc.get_str(OP_KEY)?),
            ns: doc.get_str(NAMESPACE_KEY).unwrap_or(""),
            o: doc.get_document(OBJECT_KEY).ok(),
            o2: doc.get_document(SELECTOR_KEY).ok(),
        })
    }

    /// Whether the payload carries `_id`.  An `i` entry with `_id` inserts a
    /// user document; one without is an index build.
    pub fn has_id(&self) -> bool {
        self.o.map_or(false, |o| o.contains_key(ID_KEY))
    }

    pub fn is_index_build(&self) -> bool {
        self.op == OpType::Insert && !self.has_id()
    }

    /// Whether `o` is an operator update (`{"$set": ...}`) rather than a
    /// full-document replace.  Update specs are all-operator documents, so
    /// inspecting the first key is enough.
    pub fn is_update_operator(&self) -> bool {
        self.o
            .and_then(|o| o.keys().next())
            .map_or(false, |key| key.starts_with('$'))
    }

    /// Namespace the entry acts on.  Index builds are logged against
    /// `db.system.indexes`; the real target sits in `o.ns`.  Noops have no
    /// namespace.
    pub fn effective_ns(&self) -> Option<&'a str> {
        if self.ns.is_empty() {
            return None;
        }
        if self.is_index_build() {
            if let Some(target) = self.o.and_then(|o| o.get_str(NAMESPACE_KEY).ok()) {
                return Some(target);
            }
        }
        Some(self.ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_decode_insert() {
        let raw = doc! {
            "ts": Timestamp { time: 100, increment: 1 },
            "op": "i",
            "ns": "d.c",
            "o": { "_id": 1, "v": "a" },
        };
        let entry = OplogEntry::from_document(&raw).unwrap();
        assert_eq!(entry.op, OpType::Insert);
        assert!(entry.has_id());
        assert!(!entry.is_index_build());
        assert_eq!(entry.effective_ns(), Some("d.c"));
    }

    #[test]
    fn test_decode_requires_ts_and_op() {
        assert!(OplogEntry::from_document(&doc! {"op": "i", "ns": "d.c"}).is_err());
        assert!(OplogEntry::from_document(
            &doc! {"ts": Timestamp { time: 1, increment: 1 }, "ns": "d.c"}
        )
        .is_err());
    }

    #[test]
    fn test_index_build_takes_target_from_payload() {
        let raw = doc! {
            "ts": Timestamp { time: 50, increment: 1 },
            "op": "i",
            "ns": "d.system.indexes",
            "o": { "key": { "x": 1 }, "name": "x_1", "ns": "d.c" },
        };
        let entry = OplogEntry::from_document(&raw).unwrap();
        assert!(entry.is_index_build());
        assert_eq!(entry.effective_ns(), Some("d.c"));
    }

    #[test]
    fn test_update_operator_detection() {
        let update = doc! {
            "ts": Timestamp { time: 101, increment: 1 },
            "op": "u",
            "ns": "d.c",
            "o2": { "_id": 1 },
            "o": { "$set": { "v": "b" } },
        };
        let entry = OplogEntry::from_document(&update).unwrap();
        assert!(entry.is_update_operator());

        let replace = doc! {
            "ts": Timestamp { time: 102, increment: 1 },
            "op": "u",
            "ns": "d.c",
            "o2": { "_id": 1 },
            "o": { "_id": 1, "v": "b" },
        };
        let entry = OplogEntry::from_document(&replace).unwrap();
        assert!(!entry.is_update_operator());
    }

    #[test]
    fn test_noop_has_no_namespace() {
        let raw = doc! {
            "ts": Timestamp { time: 1, increment: 1 },
            "op": "n",
            "ns": "",
            "o": { "msg": "periodic noop" },
        };
        let entry = OplogEntry::from_document(&raw).unwrap();
        assert_eq!(entry.op, OpType::Noop);
        assert_eq!(entry.effective_ns(), None);
    }

    #[test]
    fn test_unknown_op_is_preserved() {
        let raw = doc! {
            "ts": Timestamp { time: 1, increment: 1 },
            "op": "xyz",
            "ns": "d.c",
        };
        let entry = OplogEntry::from_document(&raw).unwrap();
        assert_eq!(entry.op, OpType::Other("xyz".to_string()));
    }
}
