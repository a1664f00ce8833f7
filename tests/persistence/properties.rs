//! Cross-cutting properties of the commit and notification pipeline.

use crate::common::{ephemeral_db, name_counts};
use loamdb::{EntityKind, EntityRef, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;

fn seed_counter(db: &loamdb::Loam) -> loamdb::EntityId {
    let outcome = db
        .perform(|ctx| {
            let counter = ctx.create_entity(EntityKind::new("Counter"))?;
            ctx.set(counter, "name", Value::Text("Counter #1".into()))?;
            ctx.set(counter, "count", Value::Int(0))?;
            Ok(())
        })
        .wait()
        .unwrap();
    outcome.inserted[0]
}

// =============================================================================
// UNTOUCHED PROPERTIES PRESERVED
// =============================================================================

/// A commit touching only `count` must leave `name` exactly as the parent
/// has it, even when the parent's `name` changed after the committing
/// context took its snapshot.
#[test]
fn untouched_property_survives_concurrent_rename() {
    let db = ephemeral_db();
    let id = seed_counter(&db);

    let (renamed_tx, renamed_rx) = channel::<()>();
    let (staged_tx, staged_rx) = channel::<()>();

    // Stages count=1 against the pre-rename snapshot, commits last.
    let stale_increment = db.perform(move |ctx| {
        ctx.set(EntityRef::new(id), "count", Value::Int(1))?;
        staged_tx.send(()).ok();
        renamed_rx.recv().ok();
        Ok(())
    });
    let rename = db.perform(move |ctx| {
        staged_rx.recv().ok();
        ctx.set(EntityRef::new(id), "name", Value::Text("Renamed".into()))?;
        Ok(())
    });

    rename.wait().unwrap();
    renamed_tx.send(()).ok();
    stale_increment.wait().unwrap();

    // Both commits landed; neither clobbered the other's property.
    assert_eq!(name_counts(&db), vec![("Renamed".to_string(), 1)]);
}

// =============================================================================
// DIFF EMISSION
// =============================================================================

/// A commit with no net change emits no diff: rewriting a property to its
/// current value, and an insert cancelled by a delete in the same context.
#[test]
fn no_net_change_emits_no_diff() {
    let db = ephemeral_db();
    let id = seed_counter(&db);

    let diffs = Arc::new(AtomicU64::new(0));
    let diffs2 = diffs.clone();
    let _sub = db.subscribe(Arc::new(move |_| {
        diffs2.fetch_add(1, Ordering::SeqCst);
    }));

    db.perform(move |ctx| ctx.set(EntityRef::new(id), "count", Value::Int(0)))
        .wait()
        .unwrap();
    db.perform(|ctx| {
        let scratch = ctx.create_entity(EntityKind::new("Counter"))?;
        ctx.delete(scratch)
    })
    .wait()
    .unwrap();

    assert_eq!(diffs.load(Ordering::SeqCst), 0);
    assert_eq!(db.metrics().commits, 3); // seed + two no-ops
}

/// Sequential commits deliver their diffs in issue order.
#[test]
fn sequential_commits_deliver_diffs_in_issue_order() {
    let db = ephemeral_db();
    let id = seed_counter(&db);

    let log: Arc<parking_lot::Mutex<Vec<&'static str>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log2 = log.clone();
    let _sub = db.subscribe(Arc::new(move |diff| {
        if !diff.inserted().is_empty() {
            log2.lock().push("insert");
        } else if !diff.deleted().is_empty() {
            log2.lock().push("delete");
        } else {
            log2.lock().push("update");
        }
    }));

    db.perform(move |ctx| ctx.set(EntityRef::new(id), "count", Value::Int(1)))
        .wait()
        .unwrap();
    db.perform(|ctx| {
        let counter = ctx.create_entity(EntityKind::new("Counter"))?;
        ctx.set(counter, "name", Value::Text("Counter #2".into()))?;
        ctx.set(counter, "count", Value::Int(0))?;
        Ok(())
    })
    .wait()
    .unwrap();
    db.perform(move |ctx| ctx.delete(EntityRef::new(id)))
        .wait()
        .unwrap();

    assert_eq!(&*log.lock(), &["update", "insert", "delete"]);
}

// =============================================================================
// SNAPSHOT ATOMICITY
// =============================================================================

/// Every counter increments in the same commit, so any snapshot a reader
/// observes must have a uniform count across counters. A torn view
/// (some counters bumped, some not) would fail the uniformity check.
#[test]
fn readers_never_observe_a_torn_snapshot() {
    let db = Arc::new(ephemeral_db());
    for _ in 0..3 {
        db.counters.add().wait().unwrap();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let torn = Arc::new(AtomicBool::new(false));
    let reader = {
        let db = db.clone();
        let stop = stop.clone();
        let torn = torn.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let snapshot = db.counters.all();
                let counts: Vec<i64> = snapshot
                    .iter()
                    .map(|c| c.property("count").as_int().unwrap_or(-1))
                    .collect();
                if counts.windows(2).any(|w| w[0] != w[1]) {
                    torn.store(true, Ordering::SeqCst);
                    return;
                }
            }
        })
    };

    for _ in 0..50 {
        db.counters.increment_all().wait().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    reader.join().unwrap();

    assert!(!torn.load(Ordering::SeqCst));
    assert_eq!(db.counters.total(), 150);
}
