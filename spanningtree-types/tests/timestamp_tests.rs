use spanningtree_types::Timestamp;

#[test]
fn now_is_after_2020() {
    assert!(Timestamp::now().as_secs() > 1_577_836_800);
}

#[test]
fn ordering_follows_seconds() {
    assert!(Timestamp::from_secs(99) < Timestamp::from_secs(100));
    assert_eq!(Timestamp::from_secs(100), Timestamp::from_secs(100));
}

#[test]
fn next_after_none_is_now() {
    let before = Timestamp::now();
    let next = Timestamp::next_after(None);
    assert!(next >= before);
}

#[test]
fn next_after_future_value_still_increases() {
    let far = Timestamp::from_secs(Timestamp::now().as_secs() + 3_600);
    let next = Timestamp::next_after(Some(far));
    assert_eq!(next.as_secs(), far.as_secs() + 1);
}

#[test]
fn next_after_past_value_uses_clock() {
    let past = Timestamp::from_secs(10);
    let next = Timestamp::next_after(Some(past));
    assert!(next.as_secs() > 10);
    assert!(next >= Timestamp::from_secs(1_577_836_800));
}

#[test]
fn serde_is_plain_integer() {
    let ts = Timestamp::from_secs(1_700_000_000);
    assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000");
}

#[test]
fn saturating_sub() {
    assert_eq!(Timestamp::from_secs(10).saturating_sub_secs(1).as_secs(), 9);
    assert_eq!(Timestamp::from_secs(i64::MIN).saturating_sub_secs(1).as_secs(), i64::MIN);
}
