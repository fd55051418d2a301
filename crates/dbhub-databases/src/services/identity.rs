//! Viewer identity from the session cookie

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::Utc;
use cookie::Cookie;
use dbhub_core::Viewer;
use dbhub_database::DbConnection;
use dbhub_entities::sessions;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "dbhub_session";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity behind a request. Never fails; unknown means anonymous.
    async fn viewer(&self, headers: &HeaderMap) -> Viewer;
}

/// Looks the session token up in the `sessions` table
pub struct SessionIdentityProvider {
    db: Arc<DbConnection>,
}

impl SessionIdentityProvider {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn viewer(&self, headers: &HeaderMap) -> Viewer {
        let Some(token) = session_token(headers) else {
            return Viewer::Anonymous;
        };

        let session = sessions::Entity::find()
            .filter(sessions::Column::SessionToken.eq(token))
            .filter(sessions::Column::ExpiresAt.gt(Utc::now()))
            .one(self.db.as_ref())
            .await;

        match session {
            Ok(Some(session)) => Viewer::User(session.username),
            Ok(None) => {
                debug!("Unknown or expired session; treating request as anonymous");
                Viewer::Anonymous
            }
            Err(e) => {
                warn!("Session lookup failed, treating request as anonymous: {}", e);
                Viewer::Anonymous
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_session, seed_user};
    use axum::http::HeaderValue;
    use dbhub_database::test_utils::TestDatabase;

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_token_is_found_among_other_cookies() {
        let headers = cookie_headers("theme=dark; dbhub_session=abc123; other=1");
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert!(session_token(&cookie_headers("theme=dark")).is_none());
        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_valid_session_identifies_user() {
        let test_db = TestDatabase::new().await.unwrap();
        seed_user(&test_db.db, "alice", 10).await;
        seed_session(&test_db.db, "alice", "live", chrono::Duration::hours(1)).await;
        seed_session(&test_db.db, "alice", "stale", chrono::Duration::hours(-1)).await;
        let provider = SessionIdentityProvider::new(test_db.connection_arc());

        let live = provider.viewer(&cookie_headers("dbhub_session=live")).await;
        assert_eq!(live, Viewer::user("alice"));

        let stale = provider.viewer(&cookie_headers("dbhub_session=stale")).await;
        assert_eq!(stale, Viewer::Anonymous);

        let forged = provider.viewer(&cookie_headers("dbhub_session=forged")).await;
        assert_eq!(forged, Viewer::Anonymous);
    }
}
