//! Fixtures shared by the unit tests in this crate

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use dbhub_database::DbConnection;
use dbhub_entities::{sessions, users};
use sea_orm::{ActiveModelTrait, Set};

pub async fn seed_user(db: &Arc<DbConnection>, username: &str, pref_max_rows: i32) {
    users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set(None),
        minio_bucket: Set(format!("{}-bucket", username)),
        pref_max_rows: Set(pref_max_rows),
        ..Default::default()
    }
    .insert(db.as_ref())
    .await
    .unwrap();
}

pub async fn seed_session(db: &Arc<DbConnection>, username: &str, token: &str, valid_for: Duration) {
    sessions::ActiveModel {
        session_token: Set(token.to_string()),
        username: Set(username.to_string()),
        expires_at: Set(Utc::now() + valid_for),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db.as_ref())
    .await
    .unwrap();
}

/// Bytes of a SQLite file built from `sql`
pub fn sqlite_file(sql: &str) -> Bytes {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(sql).unwrap();
    drop(conn);
    Bytes::from(std::fs::read(&path).unwrap())
}

/// One table `t (a INT, b TEXT)` with three rows
pub fn three_row_db() -> Bytes {
    sqlite_file(
        "CREATE TABLE t (a INT, b TEXT);
         INSERT INTO t VALUES (1, 'one'), (2, 'two'), (3, 'three');",
    )
}
