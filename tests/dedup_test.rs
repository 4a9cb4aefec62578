mod common;

use std::thread;

#[test]
fn duplicate_put_reuses_the_row() {
    let (_dir, store, _path) = common::store("dedup.db");

    let first = store.put(&b"hello"[..]).unwrap();
    let second = store.put(&b"hello"[..]).unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(second.length(), 5);

    let ids = store.record_ids().unwrap();
    assert_eq!(ids, vec![*first.id()]);

    // Both handles keep working.
    assert_eq!(common::read_all(first.stream().unwrap()), b"hello");
    assert_eq!(common::read_all(second.stream().unwrap()), b"hello");
}

#[test]
fn list_grows_by_exactly_one_across_a_duplicate_pair() {
    let (_dir, store, _path) = common::store("dedup_count.db");
    let _other = store.put(&b"unrelated"[..]).unwrap();
    let before = store.record_ids().unwrap().len();

    let _a = store.put(&b"twice-stored"[..]).unwrap();
    let _b = store.put(&b"twice-stored"[..]).unwrap();

    assert_eq!(store.record_ids().unwrap().len(), before + 1);
}

#[test]
fn distinct_content_lands_on_distinct_rows() {
    let (_dir, store, _path) = common::store("distinct.db");

    let a = store.put(&b"alpha"[..]).unwrap();
    let b = store.put(&b"beta"[..]).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(store.record_ids().unwrap().len(), 2);
}

#[test]
fn concurrent_puts_of_identical_content_converge() {
    let (_dir, store, path) = common::store("race.db");
    let payload = common::patterned(64 * 1024);

    let records = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| store.put(payload.as_slice()).unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    let first = *records[0].id();
    assert!(records.iter().all(|r| *r.id() == first));
    assert!(records
        .iter()
        .all(|r| r.length() == payload.len() as u64));

    // Exactly one committed row, no temp leftovers.
    assert_eq!(store.record_ids().unwrap(), vec![first]);
    assert_eq!(common::temp_row_count(&path), 0);

    for record in &records {
        assert_eq!(common::read_all(record.stream().unwrap()), payload);
    }
}
