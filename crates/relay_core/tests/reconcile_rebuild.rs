use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use relay_core::{reconcile, FeedSnapshot, Item, RebuildReason, ReconcileOptions};

fn item(n: u32) -> Item {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Item::new(format!("v{n}"), format!("Video {n}"), base + Duration::hours(n as i64))
}

fn newest_first(ns: &[u32]) -> Vec<Item> {
    ns.iter().rev().copied().map(item).collect()
}

fn ids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[test]
fn deletion_rebuilds_snapshot_from_live_feed() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
    let live = newest_first(&[1, 2, 3, 5, 6, 7, 8, 9, 10]);

    let result = reconcile(&live, &saved, ReconcileOptions::default());

    assert_eq!(result.rebuild, Some(RebuildReason::Deletion));
    assert_eq!(result.snapshot, FeedSnapshot::from_newest_first(&live));
    assert_eq!(result.snapshot.len(), 9);
    assert!(result.newly_appeared.is_empty());
}

#[test]
fn growth_after_deletion_is_diffed_against_rebuilt_snapshot() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4, 5]));
    let live = newest_first(&[1, 3]);

    let result = reconcile(&live, &saved, ReconcileOptions::default());
    assert_eq!(result.rebuild, Some(RebuildReason::Deletion));
    assert!(result.newly_appeared.is_empty());

    let live = newest_first(&[1, 3, 4, 6]);
    let result = reconcile(&live, &result.snapshot, ReconcileOptions::default());
    assert_eq!(result.rebuild, None);
    assert_eq!(ids(&result.newly_appeared), vec!["v4", "v6"]);
}

#[test]
fn equal_count_with_changed_top_positions_is_a_rebuild() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
    // v9 was deleted and v11 uploaded: same length, different newest window.
    let live = newest_first(&[1, 2, 3, 4, 5, 6, 7, 8, 10, 11]);

    let result = reconcile(&live, &saved, ReconcileOptions::default());

    assert_eq!(result.rebuild, Some(RebuildReason::Deletion));
    assert_eq!(result.snapshot, FeedSnapshot::from_newest_first(&live));
    assert_eq!(ids(&result.newly_appeared), vec!["v11"]);
}

#[test]
fn equal_count_mismatch_outside_window_is_not_detected() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4, 5, 6, 7, 8]));
    let live = newest_first(&[0, 2, 3, 4, 5, 6, 7, 8]);
    let options = ReconcileOptions {
        refetch_latest: 3,
        force_rebuild: false,
    };

    let result = reconcile(&live, &saved, options);

    assert_eq!(result.rebuild, None);
    assert_eq!(result.snapshot, saved);
    assert!(result.newly_appeared.is_empty());
}

#[test]
fn growth_with_shifted_overlap_is_drift() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4, 5]));
    // v4 vanished while two uploads arrived: count grew by one.
    let live = newest_first(&[1, 2, 3, 5, 6, 7]);

    let result = reconcile(&live, &saved, ReconcileOptions::default());

    assert_eq!(result.rebuild, Some(RebuildReason::Drift));
    assert_eq!(result.snapshot, FeedSnapshot::from_newest_first(&live));
    assert_eq!(ids(&result.newly_appeared), vec!["v6", "v7"]);
}

#[test]
fn forced_rebuild_is_periodic_even_without_changes() {
    let live = newest_first(&[1, 2, 3]);
    let saved = FeedSnapshot::from_newest_first(&live);
    let options = ReconcileOptions {
        force_rebuild: true,
        ..ReconcileOptions::default()
    };

    let result = reconcile(&live, &saved, options);

    assert_eq!(result.rebuild, Some(RebuildReason::Periodic));
    assert_eq!(result.snapshot, saved);
    assert!(result.newly_appeared.is_empty());
}

#[test]
fn reinserted_item_is_new_again_after_drift_rebuild() {
    let saved = FeedSnapshot::from_newest_first(&newest_first(&[1, 2, 3, 4]));
    let live = newest_first(&[2, 3, 4]);
    let result = reconcile(&live, &saved, ReconcileOptions::default());
    assert!(result.newly_appeared.is_empty());

    // v1 reappears upstream at its old position.
    let live = newest_first(&[1, 2, 3, 4]);
    let result = reconcile(&live, &result.snapshot, ReconcileOptions::default());
    assert_eq!(result.rebuild, Some(RebuildReason::Drift));
    assert_eq!(ids(&result.newly_appeared), vec!["v1"]);
}
