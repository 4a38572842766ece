use super::*;

fn three_items(auto_mode: AutoMode) -> List {
    List::from_payloads(["intro.mp3", "news.mp3", "outro.mp3"], auto_mode)
}

#[test]
fn derived_hashes_distinguish_repeated_payloads() {
    let list = List::from_payloads(["jingle", "jingle"], AutoMode::Off);
    let items = list.snapshot().items;
    assert_ne!(items[0].hash, items[1].hash);
    assert_eq!(items[0].hash.as_str().len(), HASH_LEN);
    assert_eq!(items[0].hash, derive_hash(0, "jingle"));
}

#[test]
fn select_requires_matching_hash() {
    let mut list = three_items(AutoMode::Off);
    let hash = list.snapshot().items[1].hash.clone();

    let selection = list.select(1, &hash).expect("select");
    assert_eq!(selection.index, 1);
    assert_eq!(list.selection(), Some(selection));

    let stale = list.select(2, &hash).expect_err("stale hash");
    assert_eq!(
        stale,
        SelectError::HashMismatch {
            index: 2,
            expected: hash.clone(),
        }
    );
    assert_eq!(list.selection().map(|s| s.index), Some(1));
}

#[test]
fn select_rejects_out_of_bounds() {
    let mut list = three_items(AutoMode::Off);
    let err = list
        .select(3, &ItemHash::new("whatever"))
        .expect_err("out of bounds");
    assert_eq!(err, SelectError::OutOfBounds { index: 3, len: 3 });
    assert_eq!(list.selection().map(|s| s.index), Some(0));
}

#[test]
fn next_walks_forward_and_stops_at_end() {
    let mut list = three_items(AutoMode::Next);
    assert_eq!(list.selection().map(|s| s.index), Some(0));
    assert_eq!(list.next().map(|s| s.index), Some(1));
    assert_eq!(list.next().map(|s| s.index), Some(2));
    assert_eq!(list.next().map(|s| s.index), Some(2));
}

#[test]
fn next_on_empty_list_selects_nothing() {
    let mut list = List::new(Vec::new(), AutoMode::Next);
    assert!(list.is_empty());
    assert_eq!(list.selection(), None);
    assert_eq!(list.next(), None);
}

#[test]
fn next_without_selection_starts_at_top() {
    let mut list = three_items(AutoMode::Off);
    list.selection = None;
    assert_eq!(list.next().map(|s| s.index), Some(0));
}

#[test]
fn shuffle_never_repeats_current_item() {
    let mut list = three_items(AutoMode::Shuffle);
    let mut previous = list.selection().map(|s| s.index);
    for _ in 0..50 {
        let current = list.next().map(|s| s.index);
        assert!(current.is_some());
        assert_ne!(current, previous);
        previous = current;
    }
}

#[test]
fn shuffle_on_single_item_stays_put() {
    let mut list = List::from_payloads(["only"], AutoMode::Shuffle);
    assert_eq!(list.selection().map(|s| s.index), Some(0));
    assert_eq!(list.next().map(|s| s.index), Some(0));
}

#[test]
fn snapshot_reflects_state() {
    let mut list = three_items(AutoMode::Off);
    list.set_auto_mode(AutoMode::Drop);
    list.next();
    let snapshot = list.snapshot();
    assert_eq!(snapshot.auto_mode, AutoMode::Drop);
    assert_eq!(snapshot.items.len(), 3);
    assert_eq!(snapshot.selection.map(|s| s.index), Some(1));
}
