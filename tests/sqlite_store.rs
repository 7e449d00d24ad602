use chrono::{Duration, NaiveDate, TimeZone, Utc};
use monster_timer_lib::{Database, StateStore, TimerState, UsageRecord, WatchSession};
use tempfile::TempDir;

fn open() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("nested").join("monster-timer.sqlite3")).unwrap();
    (db, dir)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
}

#[test]
fn timer_state_round_trips_and_clears() {
    let (db, _dir) = open();
    let at = Utc.with_ymd_and_hms(2026, 5, 4, 7, 30, 0).unwrap() + Duration::milliseconds(250);

    assert_eq!(db.load_timer().unwrap(), None);

    db.save_timer(&TimerState::running(420_000, at)).unwrap();
    db.save_timer(&TimerState::paused(419_250, at)).unwrap();
    assert_eq!(db.load_timer().unwrap(), Some(TimerState::paused(419_250, at)));

    db.clear_timer().unwrap();
    assert_eq!(db.load_timer().unwrap(), None);
}

#[test]
fn usage_defaults_to_empty_and_upserts() {
    let (db, _dir) = open();
    assert_eq!(db.load_usage(day(4)).unwrap(), UsageRecord::empty(day(4)));

    let record = UsageRecord {
        date: day(4),
        total_seconds_watched: 3_725,
        times_expired: 2,
        times_stopped_early: 1,
    };
    db.save_usage(&record).unwrap();
    db.save_usage(&UsageRecord {
        times_expired: 3,
        ..record.clone()
    })
    .unwrap();

    let loaded = db.load_usage(day(4)).unwrap();
    assert_eq!(loaded.times_expired, 3);
    assert_eq!(loaded.formatted_watch_time(), "1h 2m");
}

#[test]
fn state_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monster-timer.sqlite3");
    let at = Utc.with_ymd_and_hms(2026, 5, 4, 22, 0, 0).unwrap();

    {
        let db = Database::new(path.clone()).unwrap();
        db.save_timer(&TimerState::expired(at)).unwrap();
        db.flush().unwrap();
    }

    let db = Database::new(path).unwrap();
    let state = db.load_timer().unwrap().unwrap();
    assert!(state.is_expiry_marker());
}

#[tokio::test]
async fn weekly_usage_fills_gaps_newest_first() {
    let (db, _dir) = open();
    for (d, secs) in [(1, 60), (4, 600), (7, 90)] {
        db.save_usage(&UsageRecord {
            total_seconds_watched: secs,
            ..UsageRecord::empty(day(d))
        })
        .unwrap();
    }

    let week = db.get_weekly_usage(day(7)).await.unwrap();
    let dates: Vec<NaiveDate> = week.days.iter().map(|r| r.date).collect();
    assert_eq!(dates, (1..=7).rev().map(day).collect::<Vec<_>>());
    assert_eq!(week.total_seconds_watched(), 750);
    assert_eq!(week.today().map(|r| r.total_seconds_watched), Some(90));
}

#[tokio::test]
async fn watch_sessions_list_most_recent_first() {
    let (db, _dir) = open();
    let start = Utc.with_ymd_and_hms(2026, 5, 4, 18, 0, 0).unwrap();
    for i in 0..3 {
        let started_at = start + Duration::hours(i);
        db.record_watch_session(&WatchSession {
            id: format!("session-{i}"),
            started_at,
            ended_at: started_at + Duration::seconds(95),
            duration_secs: 95,
        })
        .unwrap();
    }

    let recent = db.list_recent_watch_sessions(2).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["session-2", "session-1"]);

    assert_eq!(db.clear_watch_sessions().await.unwrap(), 3);
    assert!(db.list_recent_watch_sessions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn reset_clears_timer_and_usage() {
    let (db, _dir) = open();
    let at = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
    db.save_timer(&TimerState::running(1_000, at)).unwrap();
    db.save_usage(&UsageRecord::empty(day(4))).unwrap();

    db.clear_timer_state().await.unwrap();
    assert_eq!(db.clear_usage().await.unwrap(), 1);
    assert_eq!(db.get_timer_state().await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_reads_run_on_a_multi_thread_runtime() {
    let (db, _dir) = open();
    let at = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
    db.save_timer(&TimerState::paused(30_000, at)).unwrap();

    assert_eq!(db.load_timer().unwrap(), Some(TimerState::paused(30_000, at)));
    assert_eq!(db.load_usage(day(4)).unwrap(), UsageRecord::empty(day(4)));
}

#[tokio::test]
async fn blocking_reads_run_on_a_current_thread_runtime() {
    let (db, _dir) = open();
    assert_eq!(db.load_timer().unwrap(), None);
    db.flush().unwrap();
}
