//! End-to-end scenarios over the counter model.

use crate::common::{ephemeral_db, init_tracing, name_counts, FlakyStore};
use loamdb::{EntityKind, EntityRef, Loam, Predicate, SortOrder, Value};
use std::sync::mpsc::channel;
use std::sync::Arc;

// =============================================================================
// SEQUENTIAL CREATES AND INCREMENTS
// =============================================================================

#[test]
fn three_sequential_creates_name_in_order() {
    let db = ephemeral_db();

    for _ in 0..3 {
        db.counters.add().wait().unwrap();
    }

    assert_eq!(
        name_counts(&db),
        vec![
            ("Counter #1".to_string(), 0),
            ("Counter #2".to_string(), 0),
            ("Counter #3".to_string(), 0),
        ]
    );
}

#[test]
fn increment_all_bumps_every_counter_once() {
    let db = ephemeral_db();
    db.counters.add().wait().unwrap();
    db.counters.add().wait().unwrap();

    db.counters.increment_all().wait().unwrap();

    assert_eq!(
        name_counts(&db),
        vec![
            ("Counter #1".to_string(), 1),
            ("Counter #2".to_string(), 1),
        ]
    );
    assert_eq!(db.counters.total(), 2);
}

#[test]
fn remove_all_empties_the_collection() {
    let db = ephemeral_db();
    db.counters.add().wait().unwrap();
    db.counters.add().wait().unwrap();

    db.counters.remove_all().wait().unwrap();
    assert!(db.counters.is_empty());
}

// =============================================================================
// CONCURRENT COMMITS INTO THE SAME PARENT
// =============================================================================

/// Contexts X and Y both observe count 0 on the same counter; X commits
/// new=1 first, then Y commits new=5. The committing side always wins on
/// the touched property, so the last committer's 5 sticks, and exactly
/// two diffs are delivered.
#[test]
fn last_committer_wins_on_contended_property() {
    let db = ephemeral_db();
    let outcome = db
        .perform(|ctx| {
            let counter = ctx.create_entity(EntityKind::new("Counter"))?;
            ctx.set(counter, "name", Value::Text("Counter #1".into()))?;
            ctx.set(counter, "count", Value::Int(0))?;
            Ok(())
        })
        .wait()
        .unwrap();
    let id = outcome.inserted[0];

    let diffs = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let diff_log = diffs.clone();
    let _sub = db.subscribe(Arc::new(move |diff| {
        diff_log.lock().push(diff.len());
    }));

    // Rendezvous so both contexts stage against the count=0 snapshot
    // before either commits, then release X's commit ahead of Y's.
    let (y_staged_tx, y_staged_rx) = channel::<()>();
    let (x_done_tx, x_done_rx) = channel::<()>();

    let receipt_x = db.perform(move |ctx| {
        ctx.set(EntityRef::new(id), "count", Value::Int(1))?;
        y_staged_rx.recv().ok();
        Ok(())
    });
    let receipt_y = db.perform(move |ctx| {
        ctx.set(EntityRef::new(id), "count", Value::Int(5))?;
        y_staged_tx.send(()).ok();
        x_done_rx.recv().ok();
        Ok(())
    });

    receipt_x.wait().unwrap();
    x_done_tx.send(()).ok();
    receipt_y.wait().unwrap();

    assert_eq!(name_counts(&db), vec![("Counter #1".to_string(), 5)]);
    assert_eq!(diffs.lock().len(), 2);
}

// =============================================================================
// STORE FAILURE
// =============================================================================

#[test]
fn rejected_flush_surfaces_and_leaves_query_unchanged() {
    init_tracing();
    let store = FlakyStore::new();
    let db = Loam::builder().store(store.clone()).workers(2).open().unwrap();
    db.counters.add().wait().unwrap();
    let before = name_counts(&db);

    store.fail_writes(true);
    let err = db.counters.increment_all().wait().unwrap_err();
    assert!(err.is_commit_failure());

    // No partial application is visible anywhere.
    assert_eq!(name_counts(&db), before);
    assert_eq!(db.metrics().aborts, 1);

    // The failure was discarded, not queued: the store heals and the next
    // unit of work commits from the unchanged state.
    store.fail_writes(false);
    db.counters.increment_all().wait().unwrap();
    assert_eq!(name_counts(&db), vec![("Counter #1".to_string(), 1)]);
}

// =============================================================================
// DURABILITY ACROSS REOPEN
// =============================================================================

#[test]
fn counters_survive_close_and_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counters.json");

    {
        let db = Loam::open(&path).unwrap();
        db.counters.add().wait().unwrap();
        db.counters.add().wait().unwrap();
        db.counters.increment_all().wait().unwrap();
        db.close();
    }

    let db = Loam::open(&path).unwrap();
    assert_eq!(
        name_counts(&db),
        vec![
            ("Counter #1".to_string(), 1),
            ("Counter #2".to_string(), 1),
        ]
    );
    // Ids keep advancing from where the snapshot left off.
    db.counters.add().wait().unwrap();
    let all = db.fetch(&Predicate::All, &SortOrder::by_id()).unwrap();
    assert_eq!(all.len(), 3);
}
