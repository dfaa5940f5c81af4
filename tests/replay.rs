use bson::{doc, Document, Timestamp};
use mongo_mirror::{Replicator, SyncError};
use mongodb::sync::Client;
use std::collections::HashMap;

struct Context {
    client: Client,
    replicator: Replicator,
    dbs: Vec<String>,
}

impl Context {
    /// `dbs` are dropped on teardown.
    fn new(dbs: &[&str]) -> Self {
        let src_uri = option_env!("MIRROR_TEST_SOURCE").unwrap_or("mongodb://localhost:27017");
        let dst_uri = option_env!("MIRROR_TEST_TARGET").unwrap_or("mongodb://localhost:27017");
        let client = Client::with_uri_str(src_uri).unwrap();
        let replicator = Replicator::new(src_uri, dst_uri).unwrap();
        let dbs: Vec<String> = dbs.iter().map(|db| db.to_string()).collect();
        for db in &dbs {
            let _ = client.database(db).drop(None);
        }
        Context {
            client,
            replicator,
            dbs,
        }
    }

    fn seed_oplog(&self, oplog_ns: &str, entries: Vec<Document>) {
        let (db, coll) = oplog_ns.split_once('.').unwrap();
        self.client
            .database(db)
            .collection::<Document>(coll)
            .insert_many(entries, None)
            .unwrap();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for db in &self.dbs {
            let _ = self.client.database(db).drop(None);
        }
    }
}

fn ts(time: u32, increment: u32) -> Timestamp {
    Timestamp { time, increment }
}

#[test]
fn test_replay_insert_then_update() {
    let context = Context::new(&["mirror_replay_s1_log", "mirror_replay_s1"]);
    let oplog_ns = "mirror_replay_s1_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![
            doc! {
                "ts": ts(100, 1), "op": "i", "ns": "mirror_replay_s1.c",
                "o": { "_id": 1, "v": "a" },
            },
            doc! {
                "ts": ts(101, 1), "op": "u", "ns": "mirror_replay_s1.c",
                "o2": { "_id": 1 }, "o": { "$set": { "v": "b" } },
            },
        ],
    );

    context
        .replicator
        .replay_oplog(ts(100, 1), None, Some(oplog_ns), &[], &HashMap::new())
        .unwrap();

    let coll = context
        .client
        .database("mirror_replay_s1")
        .collection::<Document>("c");
    assert_eq!(coll.count_documents(None, None).unwrap(), 1);
    let item = coll.find_one(doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(item.get_str("v").unwrap(), "b");
}

#[test]
fn test_replay_replace_delete_and_noop() {
    let context = Context::new(&["mirror_replay_rdn_log", "mirror_replay_rdn"]);
    let oplog_ns = "mirror_replay_rdn_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![
            doc! {
                "ts": ts(10, 1), "op": "i", "ns": "mirror_replay_rdn.c",
                "o": { "_id": 1, "v": "a" },
            },
            doc! {
                "ts": ts(10, 2), "op": "i", "ns": "mirror_replay_rdn.c",
                "o": { "_id": 2, "v": "gone" },
            },
            // full-document replace: the destination ends up equal to `o`.
            doc! {
                "ts": ts(11, 1), "op": "u", "ns": "mirror_replay_rdn.c",
                "o2": { "_id": 1 }, "o": { "_id": 1, "v": "c", "w": 9 },
            },
            doc! {
                "ts": ts(12, 1), "op": "d", "ns": "mirror_replay_rdn.c",
                "o": { "_id": 2 },
            },
            // noops are never applied.
            doc! {
                "ts": ts(13, 1), "op": "n", "ns": "",
                "o": { "msg": "periodic noop" },
            },
        ],
    );

    context
        .replicator
        .replay_oplog(ts(10, 1), None, Some(oplog_ns), &[], &HashMap::new())
        .unwrap();

    let coll = context
        .client
        .database("mirror_replay_rdn")
        .collection::<Document>("c");
    assert_eq!(coll.count_documents(None, None).unwrap(), 1);
    let item = coll.find_one(doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(item, doc! {"_id": 1, "v": "c", "w": 9});
}

#[test]
fn test_replay_index_build_entry() {
    let context = Context::new(&["mirror_replay_idx_log", "mirror_replay_idx"]);
    let oplog_ns = "mirror_replay_idx_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![doc! {
            "ts": ts(50, 1), "op": "i", "ns": "mirror_replay_idx.system.indexes",
            "o": { "key": { "x": 1 }, "name": "x_1", "ns": "mirror_replay_idx.c" },
        }],
    );

    context
        .replicator
        .replay_oplog(ts(50, 1), None, Some(oplog_ns), &[], &HashMap::new())
        .unwrap();

    let db = context.client.database("mirror_replay_idx");
    let reply = db.run_command(doc! {"listIndexes": "c"}, None).unwrap();
    let names: Vec<&str> = reply
        .get_document("cursor")
        .unwrap()
        .get_array("firstBatch")
        .unwrap()
        .iter()
        .map(|idx| idx.as_document().unwrap().get_str("name").unwrap())
        .collect();
    assert!(names.contains(&"x_1"));

    // no document ends up in system.indexes.
    let raw = db.collection::<Document>("system.indexes");
    assert_eq!(raw.count_documents(None, None).unwrap(), 0);
}

#[test]
fn test_replay_remaps_namespaces() {
    let context = Context::new(&[
        "mirror_replay_map_log",
        "mirror_replay_map_a",
        "mirror_replay_map_b",
    ]);
    let oplog_ns = "mirror_replay_map_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![doc! {
            "ts": ts(20, 1), "op": "i", "ns": "mirror_replay_map_a.x",
            "o": { "_id": 7, "v": "mapped" },
        }],
    );
    let mut ns_map = HashMap::new();
    ns_map.insert(
        "mirror_replay_map_a.x".to_string(),
        "mirror_replay_map_b.y".to_string(),
    );

    context
        .replicator
        .replay_oplog(ts(20, 1), None, Some(oplog_ns), &[], &ns_map)
        .unwrap();

    // every write lands in the mapped namespace, none in the source one.
    let mapped = context
        .client
        .database("mirror_replay_map_b")
        .collection::<Document>("y");
    assert_eq!(mapped.count_documents(None, None).unwrap(), 1);
    let unmapped = context
        .client
        .database("mirror_replay_map_a")
        .collection::<Document>("x");
    assert_eq!(unmapped.count_documents(None, None).unwrap(), 0);
}

#[test]
fn test_replay_command_follows_database_remap() {
    let context = Context::new(&[
        "mirror_replay_cmd_log",
        "mirror_replay_cmd_d",
        "mirror_replay_cmd_e",
    ]);
    let oplog_ns = "mirror_replay_cmd_log.oplog";
    // the drop target must exist to observe the command taking effect.
    context
        .client
        .database("mirror_replay_cmd_e")
        .create_collection("c", None)
        .unwrap();
    context.seed_oplog(
        oplog_ns,
        vec![doc! {
            "ts": ts(200, 1), "op": "c", "ns": "mirror_replay_cmd_d.$cmd",
            "o": { "drop": "c" },
        }],
    );
    let mut ns_map = HashMap::new();
    ns_map.insert(
        "mirror_replay_cmd_d.c".to_string(),
        "mirror_replay_cmd_e.f".to_string(),
    );

    context
        .replicator
        .replay_oplog(ts(200, 1), None, Some(oplog_ns), &[], &ns_map)
        .unwrap();

    // `{drop: "c"}` ran against the remapped database.
    let colls = context
        .client
        .database("mirror_replay_cmd_e")
        .list_collection_names(None)
        .unwrap();
    assert!(colls.iter().all(|coll| coll != "c"));
}

#[test]
fn test_replay_filter_admits_cmd_by_database() {
    let context = Context::new(&[
        "mirror_replay_flt_log",
        "mirror_replay_flt_d",
        "mirror_replay_flt_z",
    ]);
    let oplog_ns = "mirror_replay_flt_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![
            // admitted: the filter names a collection under this database.
            doc! {
                "ts": ts(30, 1), "op": "c", "ns": "mirror_replay_flt_d.$cmd",
                "o": { "create": "made" },
            },
            // rejected: nothing under this database is filtered.
            doc! {
                "ts": ts(30, 2), "op": "c", "ns": "mirror_replay_flt_z.$cmd",
                "o": { "create": "nope" },
            },
            // rejected: not the filtered collection.
            doc! {
                "ts": ts(30, 3), "op": "i", "ns": "mirror_replay_flt_d.other",
                "o": { "_id": 1 },
            },
            // admitted: exact match.
            doc! {
                "ts": ts(30, 4), "op": "i", "ns": "mirror_replay_flt_d.x",
                "o": { "_id": 1, "v": "kept" },
            },
        ],
    );
    let filter = vec!["mirror_replay_flt_d.x".to_string()];

    context
        .replicator
        .replay_oplog(ts(30, 1), None, Some(oplog_ns), &filter, &HashMap::new())
        .unwrap();

    let d_colls = context
        .client
        .database("mirror_replay_flt_d")
        .list_collection_names(None)
        .unwrap();
    assert!(d_colls.iter().any(|coll| coll == "made"));
    assert!(d_colls.iter().all(|coll| coll != "other"));
    let z_colls = context
        .client
        .database("mirror_replay_flt_z")
        .list_collection_names(None)
        .unwrap();
    assert!(z_colls.iter().all(|coll| coll != "nope"));

    let kept = context
        .client
        .database("mirror_replay_flt_d")
        .collection::<Document>("x");
    assert_eq!(kept.count_documents(None, None).unwrap(), 1);
}

#[test]
fn test_replay_bounded_window_stops_at_end_ts() {
    let context = Context::new(&["mirror_replay_end_log", "mirror_replay_end"]);
    let oplog_ns = "mirror_replay_end_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![
            doc! {
                "ts": ts(40, 1), "op": "i", "ns": "mirror_replay_end.c",
                "o": { "_id": 1 },
            },
            doc! {
                "ts": ts(41, 1), "op": "i", "ns": "mirror_replay_end.c",
                "o": { "_id": 2 },
            },
            // past the end watermark, must not be applied.
            doc! {
                "ts": ts(42, 1), "op": "i", "ns": "mirror_replay_end.c",
                "o": { "_id": 3 },
            },
        ],
    );

    context
        .replicator
        .replay_oplog(
            ts(40, 1),
            Some(ts(41, 1)),
            Some(oplog_ns),
            &[],
            &HashMap::new(),
        )
        .unwrap();

    let coll = context
        .client
        .database("mirror_replay_end")
        .collection::<Document>("c");
    assert_eq!(coll.count_documents(None, None).unwrap(), 2);
    assert!(coll.find_one(doc! {"_id": 3}, None).unwrap().is_none());
}

#[test]
fn test_replay_aborts_on_rolled_over_watermark() {
    let context = Context::new(&["mirror_replay_s6_log", "mirror_replay_s6"]);
    let oplog_ns = "mirror_replay_s6_log.oplog";
    context.seed_oplog(
        oplog_ns,
        vec![doc! {
            "ts": ts(500, 1), "op": "i", "ns": "mirror_replay_s6.c",
            "o": { "_id": 1 },
        }],
    );

    let result = context.replicator.replay_oplog(
        ts(400, 1),
        None,
        Some(oplog_ns),
        &[],
        &HashMap::new(),
    );
    assert!(matches!(result, Err(SyncError::StaleWatermark { .. })));

    // no write happened.
    let coll = context
        .client
        .database("mirror_replay_s6")
        .collection::<Document>("c");
    assert_eq!(coll.count_documents(None, None).unwrap(), 0);
}
