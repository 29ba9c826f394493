use bytes::Bytes;
use proptest::prelude::*;
use tessera_tuple::{Key, KeyDef, KeyPart, Tuple, UpdateOp};
use tessera_types::{FieldType, IndexId, Lsn, SpaceId, Value};
use test_case::test_case;

use super::*;

fn comparator() -> KeyDef {
    KeyDef::new(
        SpaceId::new(1),
        IndexId::PRIMARY,
        "pk",
        true,
        vec![
            KeyPart::new(0, FieldType::Unsigned),
            KeyPart::new(1, FieldType::String),
        ],
    )
    .expect("valid key definition")
}

fn key(values: &[Value]) -> Key {
    Key::from_values(values).expect("encode key")
}

fn tuple(a: u64, b: &str, extra: u64) -> Tuple {
    Tuple::from_values(&[Value::from(a), Value::from(b), Value::from(extra)]).expect("encode")
}

fn row_key(a: u64, b: &str) -> Key {
    key(&[Value::from(a), Value::from(b)])
}

fn commit(engine: &MemoryEngine, mut tx: MemoryTx, lsn: u64) {
    assert_eq!(engine.prepare(&mut tx).expect("prepare"), PrepareOutcome::Ok);
    engine.commit(tx, Lsn::new(lsn)).expect("commit");
}

/// Engine with rows (1,a) (1,b) (2,a) (3,c).
fn seeded() -> (MemoryEngine, EngineIndexId) {
    let engine = MemoryEngine::new();
    let index = engine.open_index(&comparator()).expect("open");
    let mut tx = engine.begin().expect("begin");
    for (a, b) in [(1, "a"), (1, "b"), (2, "a"), (3, "c")] {
        engine
            .put(&mut tx, index, &row_key(a, b), tuple(a, b, 0).into_bytes())
            .expect("put");
    }
    commit(&engine, tx, 1);
    (engine, index)
}

fn drain(engine: &MemoryEngine, index: EngineIndexId, start: &Key, order: Order) -> Vec<(u64, String)> {
    let mut cursor = engine.cursor(index, start, order).expect("cursor");
    let mut out = Vec::new();
    while let Some(bytes) = engine.cursor_next(&mut cursor).expect("next") {
        let fields = Tuple::from_bytes(bytes).decode().expect("decode");
        out.push((
            fields[0].as_u64().expect("unsigned"),
            fields[1].as_str().expect("string").to_owned(),
        ));
    }
    engine.cursor_close(cursor);
    out
}

fn pairs(items: &[(u64, &str)]) -> Vec<(u64, String)> {
    items.iter().map(|&(a, b)| (a, b.to_owned())).collect()
}

// ============================================================================
// Point Lookup Tests
// ============================================================================

#[test]
fn get_full_and_prefix_keys() {
    let (engine, index) = seeded();

    let full = engine.get(None, index, &row_key(2, "a")).expect("get");
    assert_eq!(full, Some(tuple(2, "a", 0).into_bytes()));

    let prefix = engine.get(None, index, &key(&[Value::from(1_u64)])).expect("get");
    assert_eq!(prefix, Some(tuple(1, "a", 0).into_bytes()));

    assert!(engine.get(None, index, &key(&[Value::from(9_u64)])).expect("get").is_none());
}

#[test]
fn transaction_sees_own_writes() {
    let (engine, index) = seeded();
    let mut tx = engine.begin().expect("begin");

    engine.delete(&mut tx, index, &row_key(1, "a")).expect("delete");
    engine
        .put(&mut tx, index, &row_key(0, "z"), tuple(0, "z", 0).into_bytes())
        .expect("put");

    let prefix = engine.get(Some(&tx), index, &key(&[Value::from(1_u64)])).expect("get");
    assert_eq!(prefix, Some(tuple(1, "b", 0).into_bytes()));
    assert!(engine.get(None, index, &row_key(0, "z")).expect("get").is_none());
    assert!(engine.get(Some(&tx), index, &row_key(0, "z")).expect("get").is_some());

    engine.rollback(tx);
    assert!(engine.get(None, index, &row_key(1, "a")).expect("get").is_some());
}

#[test]
fn unknown_index_is_an_error() {
    let engine = MemoryEngine::new();
    let result = engine.get(None, EngineIndexId::new(7), &Key::empty());
    assert!(matches!(result, Err(EngineError::UnknownIndex(_))));
}

// ============================================================================
// Cursor Tests
// ============================================================================

#[test_case(Order::Ge, &[1], &[(1, "a"), (1, "b"), (2, "a"), (3, "c")]; "ge prefix")]
#[test_case(Order::Gt, &[1], &[(2, "a"), (3, "c")]; "gt skips prefix matches")]
#[test_case(Order::Le, &[2], &[(2, "a"), (1, "b"), (1, "a")]; "le includes prefix matches")]
#[test_case(Order::Lt, &[2], &[(1, "b"), (1, "a")]; "lt excludes prefix matches")]
#[test_case(Order::Ge, &[], &[(1, "a"), (1, "b"), (2, "a"), (3, "c")]; "ge empty key")]
#[test_case(Order::Le, &[], &[(3, "c"), (2, "a"), (1, "b"), (1, "a")]; "le empty key")]
#[test_case(Order::Gt, &[], &[]; "gt empty key yields nothing")]
#[test_case(Order::Lt, &[], &[]; "lt empty key yields nothing")]
fn cursor_order(order: Order, start: &[u64], expected: &[(u64, &str)]) {
    let (engine, index) = seeded();
    let start: Vec<Value> = start.iter().copied().map(Value::from).collect();
    assert_eq!(drain(&engine, index, &key(&start), order), pairs(expected));
    assert_eq!(engine.open_cursors(), 0);
}

#[test]
fn cursor_reads_snapshot_of_committed_state() {
    let (engine, index) = seeded();
    let mut cursor = engine.cursor(index, &Key::empty(), Order::Ge).expect("cursor");

    let mut tx = engine.begin().expect("begin");
    engine.delete(&mut tx, index, &row_key(3, "c")).expect("delete");
    commit(&engine, tx, 2);

    let mut count = 0;
    while engine.cursor_next(&mut cursor).expect("next").is_some() {
        count += 1;
    }
    assert_eq!(count, 4);
    assert_eq!(engine.open_cursors(), 1);
    engine.cursor_close(cursor);
    assert_eq!(engine.open_cursors(), 0);
}

// ============================================================================
// Transaction Tests
// ============================================================================

#[test]
fn commit_requires_prepare() {
    let engine = MemoryEngine::new();
    let tx = engine.begin().expect("begin");
    assert!(matches!(
        engine.commit(tx, Lsn::new(1)),
        Err(EngineError::NotPrepared(_))
    ));
}

#[test]
fn commit_lsn_must_not_go_backwards() {
    let (engine, _) = seeded();
    let mut tx = engine.begin().expect("begin");
    engine.prepare(&mut tx).expect("prepare");
    assert!(matches!(
        engine.commit(tx, Lsn::ZERO),
        Err(EngineError::NonMonotonicLsn { .. })
    ));
    assert_eq!(engine.last_lsn().expect("lsn"), Lsn::new(1));
}

#[test]
fn failed_commit_releases_written_keys() {
    let (engine, index) = seeded();

    let mut stale = engine.begin().expect("begin");
    engine
        .put(&mut stale, index, &row_key(2, "a"), tuple(2, "a", 7).into_bytes())
        .expect("put");
    assert_eq!(engine.prepare(&mut stale).expect("prepare"), PrepareOutcome::Ok);
    assert!(matches!(
        engine.commit(stale, Lsn::ZERO),
        Err(EngineError::NonMonotonicLsn { .. })
    ));

    let mut next = engine.begin().expect("begin");
    engine
        .put(&mut next, index, &row_key(2, "a"), tuple(2, "a", 8).into_bytes())
        .expect("put");
    assert_eq!(engine.prepare(&mut next).expect("prepare"), PrepareOutcome::Ok);
    engine.commit(next, Lsn::new(2)).expect("commit");

    let stored = engine.get(None, index, &row_key(2, "a")).expect("get").expect("row");
    assert_eq!(Tuple::from_bytes(stored), tuple(2, "a", 8));
}

#[test]
fn read_write_conflict_is_detected() {
    let (engine, index) = seeded();

    let mut reader = engine.begin().expect("begin");
    engine
        .get(Some(&reader), index, &key(&[Value::from(2_u64)]))
        .expect("get");
    engine
        .put(&mut reader, index, &row_key(9, "x"), tuple(9, "x", 0).into_bytes())
        .expect("put");

    let mut writer = engine.begin().expect("begin");
    engine
        .put(&mut writer, index, &row_key(2, "b"), tuple(2, "b", 0).into_bytes())
        .expect("put");
    commit(&engine, writer, 2);

    assert_eq!(engine.prepare(&mut reader).expect("prepare"), PrepareOutcome::Conflict);
    engine.rollback(reader);
}

#[test]
fn prepared_writes_block_concurrent_writer() {
    let (engine, index) = seeded();

    let mut first = engine.begin().expect("begin");
    let mut second = engine.begin().expect("begin");
    for tx in [&mut first, &mut second] {
        engine
            .put(tx, index, &row_key(5, "e"), tuple(5, "e", 0).into_bytes())
            .expect("put");
    }

    assert_eq!(engine.prepare(&mut first).expect("prepare"), PrepareOutcome::Ok);
    assert_eq!(engine.prepare(&mut second).expect("prepare"), PrepareOutcome::Conflict);

    engine.rollback(first);
    assert_eq!(engine.prepare(&mut second).expect("prepare"), PrepareOutcome::Ok);
    engine.commit(second, Lsn::new(2)).expect("commit");
}

#[test]
fn disjoint_transactions_both_commit() {
    let (engine, index) = seeded();
    let mut a = engine.begin().expect("begin");
    let mut b = engine.begin().expect("begin");
    engine
        .put(&mut a, index, &row_key(7, "a"), tuple(7, "a", 0).into_bytes())
        .expect("put");
    engine
        .put(&mut b, index, &row_key(8, "b"), tuple(8, "b", 0).into_bytes())
        .expect("put");
    commit(&engine, a, 2);
    commit(&engine, b, 3);
    assert_eq!(engine.index_len(index).expect("len"), 6);
}

#[test]
fn bsize_tracks_stored_bytes() {
    let (engine, index) = seeded();
    let before = engine.index_bsize(index).expect("bsize");
    let removed = tuple(3, "c", 0).bsize() as u64;

    let mut tx = engine.begin().expect("begin");
    engine.delete(&mut tx, index, &row_key(3, "c")).expect("delete");
    commit(&engine, tx, 2);

    assert_eq!(engine.index_bsize(index).expect("bsize"), before - removed);
}

#[test]
fn dropped_index_is_gone() {
    let (engine, index) = seeded();
    engine.drop_index(index).expect("drop");
    assert!(matches!(engine.index_bsize(index), Err(EngineError::UnknownIndex(_))));
}

// ============================================================================
// Upsert Tests
// ============================================================================

fn add_to_extra(amount: u64) -> Vec<UpdateOp> {
    vec![UpdateOp::Add {
        field: 2,
        value: Value::from(amount),
    }]
}

#[test]
fn upsert_inserts_when_absent_and_patches_when_present() {
    let (engine, index) = seeded();

    let mut tx = engine.begin().expect("begin");
    engine
        .upsert(&mut tx, index, &tuple(4, "d", 1), &add_to_extra(10), 0)
        .expect("upsert");
    engine
        .upsert(&mut tx, index, &tuple(2, "a", 1), &add_to_extra(10), 0)
        .expect("upsert");
    commit(&engine, tx, 2);

    let inserted = engine.get(None, index, &row_key(4, "d")).expect("get");
    assert_eq!(inserted, Some(tuple(4, "d", 1).into_bytes()));
    let patched = engine.get(None, index, &row_key(2, "a")).expect("get");
    assert_eq!(patched, Some(tuple(2, "a", 10).into_bytes()));
}

#[test]
fn upserts_on_same_key_chain() {
    let (engine, index) = seeded();
    let mut tx = engine.begin().expect("begin");
    for _ in 0..3 {
        engine
            .upsert(&mut tx, index, &tuple(6, "f", 1), &add_to_extra(5), 0)
            .expect("upsert");
    }
    commit(&engine, tx, 2);

    let stored = engine.get(None, index, &row_key(6, "f")).expect("get");
    assert_eq!(stored, Some(tuple(6, "f", 11).into_bytes()));
}

#[test]
fn failing_upsert_keeps_old_tuple() {
    let (engine, index) = seeded();
    let mut tx = engine.begin().expect("begin");
    let ops = vec![UpdateOp::Assign {
        field: 1,
        value: Value::from("changed"),
    }];
    engine
        .upsert(&mut tx, index, &tuple(1, "a", 1), &ops, 0)
        .expect("upsert");
    commit(&engine, tx, 2);

    let stored = engine.get(None, index, &row_key(1, "a")).expect("get");
    assert_eq!(stored, Some(tuple(1, "a", 0).into_bytes()));
}

proptest! {
    /// Ascending and descending full scans are mirror images.
    #[test]
    fn full_scans_mirror(keys in proptest::collection::btree_set(0u64..1000, 0..40)) {
        let engine = MemoryEngine::new();
        let index = engine.open_index(&comparator()).expect("open");
        let mut tx = engine.begin().expect("begin");
        for k in &keys {
            engine.put(&mut tx, index, &row_key(*k, "k"), Bytes::from(k.to_be_bytes().to_vec())).expect("put");
        }
        commit(&engine, tx, 1);

        let collect = |order| {
            let mut cursor = engine.cursor(index, &Key::empty(), order).expect("cursor");
            let mut out = Vec::new();
            while let Some(v) = engine.cursor_next(&mut cursor).expect("next") {
                out.push(v);
            }
            engine.cursor_close(cursor);
            out
        };
        let ascending = collect(Order::Ge);
        let mut descending = collect(Order::Le);
        descending.reverse();
        prop_assert_eq!(ascending.len(), keys.len());
        prop_assert_eq!(ascending, descending);
    }
}
