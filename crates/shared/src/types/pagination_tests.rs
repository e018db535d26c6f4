use chrono::{Duration, TimeZone, Utc};

use super::*;

#[test]
fn test_unbounded_contains_everything() {
    let window = TimeWindow::unbounded();
    assert!(window.contains(Utc::now()));
    assert!(window.contains(Utc.timestamp_opt(0, 0).unwrap()));
}

#[test]
fn test_before_is_exclusive() {
    let ts = Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap();
    let window = TimeWindow::before(ts);

    assert!(!window.contains(ts));
    assert!(window.contains(ts - Duration::milliseconds(1)));
    assert!(!window.contains(ts + Duration::milliseconds(1)));
}

#[test]
fn test_after_is_exclusive() {
    let ts = Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap();
    let window = TimeWindow {
        before: None,
        after: Some(ts),
    };

    assert!(!window.contains(ts));
    assert!(window.contains(ts + Duration::seconds(1)));
}

#[test]
fn test_both_bounds() {
    let start = Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap();
    let end = start + Duration::days(1);
    let window = TimeWindow {
        before: Some(end),
        after: Some(start),
    };

    assert!(window.contains(start + Duration::hours(12)));
    assert!(!window.contains(end + Duration::hours(1)));
    assert!(!window.contains(start - Duration::hours(1)));
}
