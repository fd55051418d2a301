use std::collections::BTreeMap;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::{response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

const PROBLEM_JSON: &str = "application/problem+json";

/// RFC 7807 body as it appears in the API docs
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "title": "Table Not Found",
    "detail": "Requested table does not exist",
    "instance": "/x/table/justinclift/Marine%20Litter.sqlite"
}))]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_url: Option<String>,
    /// A short, human-readable summary of the problem type
    #[schema(example = "Table Not Found")]
    pub title: String,
    /// A human-readable explanation specific to this occurrence of the problem
    #[schema(example = "Requested table does not exist")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence of the problem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// A problem response under construction.
#[derive(Debug, Clone)]
pub struct Problem {
    pub status_code: StatusCode,
    pub body: BTreeMap<String, Value>,
}

/// Start a problem response with the given status.
pub fn new(status_code: StatusCode) -> Problem {
    Problem {
        status_code,
        body: BTreeMap::new(),
    }
}

impl Problem {
    pub fn with_title<S: Into<String>>(self, value: S) -> Self {
        self.with_value("title", value.into())
    }

    pub fn with_detail<S: Into<String>>(self, value: S) -> Self {
        self.with_value("detail", value.into())
    }

    fn with_value<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.body.insert(key.to_owned(), value.into());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.body.get("title").and_then(Value::as_str)
    }

    pub fn detail(&self) -> Option<&str> {
        self.body.get("detail").and_then(Value::as_str)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        if self.body.is_empty() {
            return self.status_code.into_response();
        }

        let mut response = (self.status_code, Json(self.body)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_builder_collects_fields() {
        let problem = new(StatusCode::NOT_FOUND)
            .with_title("Database Not Found")
            .with_detail("No such database");

        assert_eq!(problem.status_code, StatusCode::NOT_FOUND);
        assert_eq!(problem.title(), Some("Database Not Found"));
        assert_eq!(problem.detail(), Some("No such database"));
    }

    #[tokio::test]
    async fn test_into_response_sets_problem_content_type() {
        let response = new(StatusCode::FORBIDDEN)
            .with_title("Access Denied")
            .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["title"], "Access Denied");
    }

    #[test]
    fn test_empty_problem_has_no_body() {
        let response = new(StatusCode::NO_CONTENT).into_response();
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }
}
