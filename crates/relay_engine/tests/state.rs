use std::fs;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use relay_core::{FeedSnapshot, Item};
use relay_engine::{
    state_file_name, AtomicFileWriter, DeliveryLedger, FileLedger, FileSnapshotStore,
    PendingQueue, PersistError, SnapshotStore, StateDir,
};
use tempfile::TempDir;

fn item(n: u32) -> Item {
    Item::new(
        format!("item{n}"),
        format!("Episode {n}"),
        Utc.with_ymd_and_hms(2024, 1, 1, n, 0, 0).unwrap(),
    )
}

fn open(temp: &TempDir) -> Arc<StateDir> {
    Arc::new(StateDir::open(temp.path()).unwrap())
}

#[test]
fn state_dir_is_created_when_missing() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("state").join("relay");

    let state = StateDir::open(&nested).unwrap();

    assert!(nested.is_dir());
    assert_eq!(state.path(), nested.as_path());
}

#[test]
fn state_dir_rejects_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("not_a_dir");
    fs::write(&file, "x").unwrap();

    let err = StateDir::open(&file).err().unwrap();
    assert!(matches!(err, PersistError::StateDir(_)));
}

#[test]
fn atomic_write_replaces_previous_content() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("state.ron", "one").unwrap();
    let second = writer.write("state.ron", "two").unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(second).unwrap(), "two");
}

#[test]
fn first_load_persists_an_empty_snapshot() {
    let temp = TempDir::new().unwrap();
    let store = FileSnapshotStore::new(open(&temp), "channel-1");

    let snapshot = store.load().unwrap();

    assert!(snapshot.is_empty());
    assert!(temp
        .path()
        .join(state_file_name("snapshot", Some("channel-1")))
        .exists());
}

#[test]
fn saved_snapshot_is_read_back_in_order() {
    let temp = TempDir::new().unwrap();
    let snapshot = FeedSnapshot::from_ascending(vec![item(1), item(2), item(3)]);
    FileSnapshotStore::new(open(&temp), "channel-1")
        .save(snapshot.clone())
        .unwrap();

    let reloaded = FileSnapshotStore::new(open(&temp), "channel-1")
        .load()
        .unwrap();

    assert_eq!(reloaded, snapshot);
    assert_eq!(reloaded.position("item2"), Some(1));
}

#[test]
fn corrupt_snapshot_is_a_decode_error() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(state_file_name("snapshot", Some("channel-1"))),
        "not ron at all (",
    )
    .unwrap();

    let err = FileSnapshotStore::new(open(&temp), "channel-1")
        .load()
        .unwrap_err();

    assert!(matches!(err, PersistError::Decode { .. }), "{err}");
}

#[test]
fn marking_twice_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let ledger = FileLedger::for_destination(open(&temp), "podcast").unwrap();

    ledger.mark_delivered("item1").unwrap();
    ledger.mark_delivered("item1").unwrap();

    assert_eq!(ledger.len(), 1);
    assert!(ledger.has_delivered("item1").unwrap());
    assert!(!ledger.has_delivered("item2").unwrap());
}

#[test]
fn ledgers_survive_reopen_and_stay_separate() {
    let temp = TempDir::new().unwrap();
    FileLedger::for_destination(open(&temp), "podcast")
        .unwrap()
        .mark_delivered("item1")
        .unwrap();

    let podcast = FileLedger::for_destination(open(&temp), "podcast").unwrap();
    let chat = FileLedger::for_destination(open(&temp), "chat").unwrap();
    let processed = FileLedger::processed(open(&temp)).unwrap();

    assert!(podcast.has_delivered("item1").unwrap());
    assert!(chat.is_empty());
    assert!(processed.is_empty());
}

#[test]
fn queue_deduplicates_and_persists_removals() {
    let temp = TempDir::new().unwrap();
    let queue = PendingQueue::outbox(open(&temp), "channel-1").unwrap();

    assert_eq!(queue.enqueue(&[item(1), item(2)]).unwrap(), 2);
    assert_eq!(queue.enqueue(&[item(2), item(3)]).unwrap(), 1);
    assert!(queue.remove("item1").unwrap());
    assert!(!queue.remove("item1").unwrap());

    let reopened = PendingQueue::outbox(open(&temp), "channel-1").unwrap();
    let ids: Vec<String> = reopened.items().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["item2", "item3"]);
}
