// tests/history_store.rs
use chrono::{Duration, TimeZone, Utc};
use tender_watch::history::{HistoryEntry, HistoryStore, RetentionPolicy};

fn urls(entries: &[HistoryEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.url.as_str()).collect()
}

#[test]
fn same_url_twice_keeps_one_entry() {
    let store = HistoryStore::open_in_memory().unwrap();
    let now = Utc::now();

    let batch: Vec<HistoryEntry> = (0..10)
        .map(|i| HistoryEntry::new(0, format!("https://test.com/content{i}"), "", now))
        .collect();
    assert_eq!(store.insert(&batch).unwrap(), 10);

    let again = vec![
        HistoryEntry::new(0, "https://test.com/content2", "", now),
        HistoryEntry::new(0, "https://test.com/content4", "", now),
    ];
    assert_eq!(store.insert(&again).unwrap(), 0);

    let listed = store.list(0).unwrap();
    assert_eq!(listed.len(), 10);
    let c2 = listed
        .iter()
        .filter(|e| e.url == "https://test.com/content2")
        .count();
    assert_eq!(c2, 1);
}

#[test]
fn insert_counts_only_new_rows_within_one_call() {
    let store = HistoryStore::open_in_memory().unwrap();
    let now = Utc::now();
    let batch = vec![
        HistoryEntry::new(1, "https://a", "a", now),
        HistoryEntry::new(1, "https://a", "a", now),
        HistoryEntry::new(2, "https://a", "a", now),
    ];
    assert_eq!(store.insert(&batch).unwrap(), 2);
    assert_eq!(store.list(1).unwrap().len(), 1);
    assert_eq!(store.list(2).unwrap().len(), 1);
}

#[test]
fn list_is_newest_first_and_user_scoped() {
    let store = HistoryStore::open_in_memory().unwrap();
    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    store
        .insert(&[
            HistoryEntry::new(1, "https://old", "old", t0),
            HistoryEntry::new(1, "https://new", "new", t0 + Duration::hours(2)),
            HistoryEntry::new(1, "https://mid", "mid", t0 + Duration::hours(1)),
            HistoryEntry::new(2, "https://other", "other", t0 + Duration::hours(3)),
        ])
        .unwrap();

    assert_eq!(
        urls(&store.list(1).unwrap()),
        ["https://new", "https://mid", "https://old"]
    );
    assert_eq!(urls(&store.list(2).unwrap()), ["https://other"]);
    assert!(store.list(3).unwrap().is_empty());
}

#[test]
fn clean_evicts_only_stale_entries() {
    let store = HistoryStore::open_in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    store
        .insert(&[
            HistoryEntry::new(1, "https://fresh", "新公告", now - Duration::days(1)),
            HistoryEntry::new(1, "https://stale", "旧公告", now - Duration::days(8)),
            HistoryEntry::new(2, "https://stale2", "旧公告二", now - Duration::days(30)),
        ])
        .unwrap();

    assert_eq!(store.clean_at(now).unwrap(), 2);
    assert_eq!(urls(&store.list(1).unwrap()), ["https://fresh"]);
    assert!(store.list(2).unwrap().is_empty());
    assert!(store.search_by_title(1, "旧").unwrap().is_empty());

    // idempotent
    assert_eq!(store.clean_at(now).unwrap(), 0);
    assert_eq!(store.list(1).unwrap().len(), 1);
}

#[test]
fn refresh_keeps_entry_alive_past_first_seen_window() {
    let store = HistoryStore::open_in_memory().unwrap();
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    store
        .insert(&[HistoryEntry::new(1, "https://x", "x", t0)])
        .unwrap();
    store
        .insert(&[HistoryEntry::new(1, "https://x", "x", t0 + Duration::days(5))])
        .unwrap();

    // 10 days after first sight, 5 after last: still live
    assert_eq!(store.clean_at(t0 + Duration::days(10)).unwrap(), 0);
    assert_eq!(store.list(1).unwrap().len(), 1);

    assert_eq!(store.clean_at(t0 + Duration::days(13)).unwrap(), 1);
    assert!(store.list(1).unwrap().is_empty());
}

#[test]
fn custom_retention_window() {
    let store = HistoryStore::open_in_memory()
        .unwrap()
        .with_retention(RetentionPolicy::days(1));
    let now = Utc::now();
    store
        .insert(&[
            HistoryEntry::new(1, "https://a", "a", now - Duration::hours(23)),
            HistoryEntry::new(1, "https://b", "b", now - Duration::hours(25)),
        ])
        .unwrap();
    assert_eq!(store.clean_at(now).unwrap(), 1);
    assert_eq!(urls(&store.list(1).unwrap()), ["https://a"]);
}

#[test]
fn search_by_title_cases() {
    let store = HistoryStore::open_in_memory().unwrap();
    let user = 1;
    let now = Utc::now();
    let data = vec![
        HistoryEntry::new(user, "https://test.com/1", "Test Title 1", now),
        HistoryEntry::new(user, "https://test.com/2", "Another Test", now),
        HistoryEntry::new(user, "https://test.com/3", "Something Else", now),
        HistoryEntry::new(user, "https://test.com/4", "Final Test Title", now),
        HistoryEntry::new(user, "https://test.com/5", "中文测试标题", now),
        HistoryEntry::new(user, "https://test.com/6", "Another 中文 Test", now),
        // same titles under another user must never leak
        HistoryEntry::new(2, "https://test.com/5", "中文测试标题", now),
        HistoryEntry::new(2, "https://test.com/7", "Test", now),
    ];
    assert_eq!(store.insert(&data).unwrap(), 8);

    let cases = [
        ("Test", 4),
        ("test", 4),
        ("TITLE", 2),
        ("Something", 1),
        ("Nonexistent", 0),
        ("中文", 2),
        ("测试", 1),
        ("标题", 1),
    ];
    for (q, expected) in cases {
        let got = store.search_by_title(user, q).unwrap();
        assert_eq!(got.len(), expected, "query {q:?}");
        for e in &got {
            assert_eq!(e.user_id, user);
            assert!(
                e.title.to_lowercase().contains(&q.to_lowercase()),
                "{} does not contain {q}",
                e.title
            );
        }
    }

    let titles: Vec<_> = store
        .search_by_title(user, "标题")
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, ["中文测试标题"]);
}

#[test]
fn search_folds_non_ascii_case_and_empty_matches_all() {
    let store = HistoryStore::open_in_memory().unwrap();
    let now = Utc::now();
    store
        .insert(&[
            HistoryEntry::new(1, "https://a", "ÉCOLE Renovation", now),
            HistoryEntry::new(1, "https://b", "Straße", now),
        ])
        .unwrap();
    assert_eq!(store.search_by_title(1, "école").unwrap().len(), 1);
    assert_eq!(store.search_by_title(1, "").unwrap().len(), 2);
    assert!(store.search_by_title(2, "").unwrap().is_empty());
}

#[test]
fn contains_and_unseen() {
    let store = HistoryStore::open_in_memory().unwrap();
    store
        .insert(&[HistoryEntry::new(1, "https://a", "a", Utc::now())])
        .unwrap();
    assert!(store.contains(1, "https://a").unwrap());
    assert!(!store.contains(2, "https://a").unwrap());

    let candidates = vec![
        "https://c".to_string(),
        "https://a".to_string(),
        "https://b".to_string(),
    ];
    assert_eq!(
        store.unseen(1, &candidates).unwrap(),
        vec!["https://c".to_string(), "https://b".to_string()]
    );
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let ts = Utc.with_ymd_and_hms(2025, 2, 2, 2, 2, 2).unwrap();
    {
        let store = HistoryStore::open(&path).unwrap();
        store
            .insert(&[HistoryEntry::new(7, "https://persist", "持久化", ts)])
            .unwrap();
    }
    let store = HistoryStore::open(&path).unwrap();
    let got = store.list(7).unwrap();
    assert_eq!(got, vec![HistoryEntry::new(7, "https://persist", "持久化", ts)]);
}
