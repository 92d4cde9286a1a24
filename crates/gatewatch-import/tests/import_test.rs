//! End-to-end import tests against on-disk logs and databases.

use chrono::TimeZone;
use chrono_tz::America::Sao_Paulo;
use gatewatch_core::{EuclideanComparator, EventLog, EventRecorder, FeatureVector, Session};
use gatewatch_import::{import_log, AccessStore, ImportError, ImportResult};
use std::io::Write;
use std::path::Path;

fn write_lines(path: &Path, lines: &[&str]) {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
}

#[test]
fn test_two_events_import_once() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("access-log.csv");
    write_lines(
        &log,
        &[
            "data,hora,id,status,primeira_vez,ocorrencia",
            "01/01/2024,10:00:00,Identity 1,Aprovado,sim,1",
            "01/01/2024,10:00:05,Identity 1,Negado,nao,2",
        ],
    );
    let db = dir.path().join("events.db");
    let db = db.to_str().unwrap();

    let mut store = AccessStore::open(db).unwrap();
    let first = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(first.rows_read, 2);
    assert_eq!(first.rows_validated, 2);
    assert_eq!(first.rows_inserted, 2);
    drop(store);

    let mut store = AccessStore::open(db).unwrap();
    let second = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(second.rows_validated, 2);
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(store.count().unwrap(), 2);

    let latest = store.latest(10).unwrap();
    assert_eq!(latest[0].event_time, "2024-01-01T13:00:05Z");
    assert_eq!(latest[0].status, "Denied");
    assert_eq!(latest[0].first_occurrence, Some(false));
    assert_eq!(latest[1].status, "Approved");
}

#[test]
fn test_overlapping_log_only_adds_new_rows() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("access-log.csv");
    write_lines(&log, &["01/01/2024,10:00:00,Identity 1,Aprovado,sim,1"]);

    let mut store = AccessStore::open_in_memory().unwrap();
    assert_eq!(import_log(&log, &mut store, Sao_Paulo).unwrap().rows_inserted, 1);

    write_lines(&log, &["01/01/2024,10:00:08,Identity 2,Negado,sim,1"]);
    let result = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(result.rows_validated, 2);
    assert_eq!(result.rows_inserted, 1);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_tolerant_rows_do_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("access-log.csv");
    write_lines(
        &log,
        &[
            "01/01/2024,10:00:00,Identity 1,NEGADO,Sim,1",
            "01/01/2024,10:00:01,Identity 1,Aprovado",
            "10:00:02,Identity 1,Aprovado,sim,1",
            "not a date,10:00:03,Identity 1,Aprovado,sim,1",
        ],
    );

    let mut store = AccessStore::open_in_memory().unwrap();
    let result = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(result.rows_read, 4);
    assert_eq!(result.rows_validated, 1);
    assert_eq!(result.rows_skipped, 3);
    assert_eq!(result.rows_inserted, 1);

    let stored = store.latest(1).unwrap();
    assert_eq!(stored[0].status, "Denied");
    assert_eq!(stored[0].first_occurrence, Some(true));
}

#[test]
fn test_session_log_round_trips_into_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access-log.csv");
    let log = EventLog::open(&path).unwrap();
    let mut session = Session::start(EuclideanComparator, EventRecorder::new(log));

    let owner = FeatureVector::new(vec![0.0, 0.0, 0.0]).unwrap();
    let visitor = FeatureVector::new(vec![1.0, 1.0, 1.0]).unwrap();
    for (sec, face) in [(0, &owner), (1, &visitor), (2, &owner), (3, &visitor)] {
        let at = Sao_Paulo.with_ymd_and_hms(2024, 3, 10, 8, 30, sec).unwrap();
        session.observe(face, at).unwrap();
    }

    let mut store = AccessStore::open_in_memory().unwrap();
    let result = import_log(&path, &mut store, Sao_Paulo).unwrap();
    assert_eq!(result.rows_read, 4);
    assert_eq!(result.rows_inserted, 4);

    let stored = store.latest(4).unwrap();
    let summary: Vec<(&str, &str, Option<bool>)> = stored
        .iter()
        .map(|e| (e.identity.as_str(), e.status.as_str(), e.first_occurrence))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Identity 2", "Denied", Some(false)),
            ("Identity 1", "Approved", Some(false)),
            ("Identity 2", "Denied", Some(true)),
            ("Identity 1", "Approved", Some(true)),
        ]
    );

    assert_eq!(import_log(&path, &mut store, Sao_Paulo).unwrap().rows_inserted, 0);
}

#[test]
fn test_unopenable_database_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("missing-dir").join("events.db");
    assert!(AccessStore::open(db.to_str().unwrap()).is_err());
}

#[test]
fn test_unterminated_last_line_waits_for_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("access-log.csv");
    std::fs::write(
        &log,
        "01/01/2024,09:59:00,Identity 1,Aprovado,sim,1\n01/01/2024,10:00:00,Identity 2,Aprovado,si",
    )
    .unwrap();

    let mut store = AccessStore::open_in_memory().unwrap();
    let first = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(first.rows_read, 1);
    assert_eq!(first.rows_inserted, 1);

    let mut f = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
    writeln!(f, "m,1").unwrap();
    drop(f);

    let second = import_log(&log, &mut store, Sao_Paulo).unwrap();
    assert_eq!(second.rows_read, 2);
    assert_eq!(second.rows_inserted, 1);
    assert_eq!(store.count().unwrap(), 2);

    let latest = store.latest(1).unwrap();
    assert_eq!(latest[0].identity, "Identity 2");
    assert_eq!(latest[0].first_occurrence, Some(true));
}

#[test]
fn test_concurrent_imports_into_one_database() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("access-log.csv");
    let mut f = std::fs::File::create(&log).unwrap();
    writeln!(f, "data,hora,id,status,primeira_vez,ocorrencia").unwrap();
    for i in 0..2000u32 {
        let (min, sec) = (i / 60 % 60, i % 60);
        let hour = 8 + i / 3600;
        writeln!(
            f,
            "01/01/2024,{hour:02}:{min:02}:{sec:02},Identity {},Aprovado,nao,{}",
            i % 7 + 1,
            i + 1
        )
        .unwrap();
    }
    drop(f);

    let db = dir.path().join("events.db");
    let db = db.to_str().unwrap();
    AccessStore::open(db).unwrap();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| -> Result<ImportResult, ImportError> {
                    let mut store = AccessStore::open(db)?;
                    import_log(&log, &mut store, Sao_Paulo)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let inserted: usize = results
        .into_iter()
        .map(|r| r.unwrap().rows_inserted)
        .sum();
    assert_eq!(inserted, 2000);
    assert_eq!(AccessStore::open(db).unwrap().count().unwrap(), 2000);
}
