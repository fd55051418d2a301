//! Hostile table and column names must be rejected before any query runs

use dbhub_sqlite::{Filter, FilterOp, Projection, ReaderError, SqliteReader};
use rusqlite::Connection;

const HOSTILE: &[&str] = &[
    "t; DROP TABLE t",
    "t\" ; DROP TABLE t; --",
    "\"t\"",
    "t'",
    "t--",
    "t /* */",
    "sqlite_master",
    "SELECT",
    "t UNION SELECT name FROM sqlite_master",
    "a\" FROM t; --",
    "*",
    "1=1",
    "",
];

fn build() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fuzz.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE t (a INT, b TEXT);
         INSERT INTO t VALUES (1, 'x'), (2, 'y');",
    )
    .unwrap();
    drop(conn);
    (dir, path)
}

#[test]
fn test_hostile_table_names_are_not_found() {
    let (_dir, path) = build();
    let reader = SqliteReader::open(&path).unwrap();
    for name in HOSTILE {
        let result = reader.read_table(Some(name), 10, None);
        assert!(
            matches!(result, Err(ReaderError::TableNotFound(_))),
            "accepted table name {:?}",
            name
        );
    }
}

#[test]
fn test_hostile_projected_columns_are_invalid_identifiers() {
    let (_dir, path) = build();
    let reader = SqliteReader::open(&path).unwrap();
    for name in HOSTILE {
        let projection = Projection::columns(["a", name]);
        let result = reader.read_table(Some("t"), 10, Some(&projection));
        assert!(
            matches!(result, Err(ReaderError::InvalidIdentifier(_))),
            "accepted column name {:?}",
            name
        );
    }
}

#[test]
fn test_hostile_filter_columns_are_invalid_identifiers() {
    let (_dir, path) = build();
    let reader = SqliteReader::open(&path).unwrap();
    for name in HOSTILE {
        let projection = Projection::columns(["a"]).with_filter(Filter {
            column: name.to_string(),
            op: FilterOp::Eq,
            value: "1".to_string(),
        });
        let result = reader.read_table(Some("t"), 10, Some(&projection));
        assert!(
            matches!(result, Err(ReaderError::InvalidIdentifier(_))),
            "accepted filter column {:?}",
            name
        );
    }
}

#[test]
fn test_table_survives_hostile_requests() {
    let (_dir, path) = build();
    {
        let reader = SqliteReader::open(&path).unwrap();
        for name in HOSTILE {
            let _ = reader.read_table(Some(name), 10, None);
        }
    }
    let reader = SqliteReader::open(&path).unwrap();
    let result = reader.read_table(Some("t"), 10, None).unwrap();
    assert_eq!(result.total_rows, 2);
}
