//! Stateless HTTP request builder and response parser for the todo service.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Parsing goes through `TodoItem`'s deserializer, so every record returned
//! from here already carries a normalized id.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;

use crate::error::SyncError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{NewTodo, ServerMessage, TodoId, TodoItem, TodoPatch};

/// Characters that may not appear raw inside a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/');

/// Builds requests for, and parses responses from, the todo service.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_list(&self) -> HttpRequest {
        self.request(HttpMethod::Get, format!("{}/todos", self.base_url), None)
    }

    pub fn build_create(&self, input: &NewTodo) -> Result<HttpRequest, SyncError> {
        let body = to_json(input)?;
        Ok(self.request(HttpMethod::Post, format!("{}/todos", self.base_url), Some(body)))
    }

    pub fn build_update(&self, id: &TodoId, patch: &TodoPatch) -> Result<HttpRequest, SyncError> {
        let body = to_json(patch)?;
        Ok(self.request(HttpMethod::Put, self.item_url(id), Some(body)))
    }

    pub fn build_toggle(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Put, format!("{}/toggle", self.item_url(id)), None)
    }

    pub fn build_delete(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Delete, self.item_url(id), None)
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Vec<TodoItem>, SyncError> {
        check_status(&response, &[200])?;
        from_json(&response.body)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<TodoItem, SyncError> {
        check_status(&response, &[200, 201])?;
        from_json(&response.body)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<TodoItem, SyncError> {
        check_status(&response, &[200])?;
        from_json(&response.body)
    }

    pub fn parse_toggle(&self, response: HttpResponse) -> Result<TodoItem, SyncError> {
        check_status(&response, &[200])?;
        from_json(&response.body)
    }

    /// Only 200 and 204 confirm the delete; any other status, 2xx included,
    /// leaves the item in place.
    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), SyncError> {
        check_status(&response, &[200, 204])
    }

    fn item_url(&self, id: &TodoId) -> String {
        format!(
            "{}/todos/{}",
            self.base_url,
            utf8_percent_encode(id.as_str(), PATH_SEGMENT)
        )
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        let headers = if body.is_some() {
            vec![("content-type".to_string(), "application/json".to_string())]
        } else {
            Vec::new()
        };
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, SyncError> {
    serde_json::to_string(value).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, SyncError> {
    serde_json::from_str(body).map_err(|e| SyncError::Deserialization(e.to_string()))
}

/// Map a status outside `accepted` to `SyncError::Server`, carrying the
/// server's `message` when the body has one.
fn check_status(response: &HttpResponse, accepted: &[u16]) -> Result<(), SyncError> {
    if accepted.contains(&response.status) {
        return Ok(());
    }
    Err(SyncError::Server {
        status: response.status,
        message: ServerMessage::from_body(&response.body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:3000/api")
    }

    fn id(raw: &str) -> TodoId {
        TodoId::new(raw).unwrap()
    }

    #[test]
    fn build_list_produces_correct_request() {
        let req = client().build_list();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/todos");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_create_sends_text_only() {
        let req = client()
            .build_create(&NewTodo {
                text: "Buy milk".to_string(),
            })
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/api/todos");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"text": "Buy milk"}));
    }

    #[test]
    fn build_update_targets_item() {
        let patch = TodoPatch {
            text: Some("Updated".to_string()),
            completed: None,
        };
        let req = client().build_update(&id("abc"), &patch).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/api/todos/abc");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"text": "Updated"}));
    }

    #[test]
    fn build_toggle_has_no_body() {
        let req = client().build_toggle(&id("abc"));
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://localhost:3000/api/todos/abc/toggle");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_delete_targets_item() {
        let req = client().build_delete(&id("abc"));
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:3000/api/todos/abc");
        assert!(req.body.is_none());
    }

    #[test]
    fn id_is_escaped_in_path() {
        let req = client().build_delete(&id("a/b c"));
        assert_eq!(req.url, "http://localhost:3000/api/todos/a%2Fb%20c");
    }

    #[test]
    fn id_with_uri_delimiters_is_escaped() {
        let req = client().build_toggle(&id("p<q>`v"));
        assert_eq!(req.url, "http://localhost:3000/api/todos/p%3Cq%3E%60v/toggle");

        let req = client().build_delete(&id("a\"b{1}"));
        assert_eq!(req.url, "http://localhost:3000/api/todos/a%22b%7B1%7D");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:3000/api/");
        assert_eq!(client.build_list().url, "http://localhost:3000/api/todos");
    }

    #[test]
    fn parse_list_normalizes_both_id_fields() {
        let response = HttpResponse::new(
            200,
            r#"[{"_id":"m1","text":"a","completed":false},{"id":"p2","text":"b","completed":true}]"#,
        );
        let todos = client().parse_list(response).unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].id.as_str(), "m1");
        assert_eq!(todos[1].id.as_str(), "p2");
        assert!(todos[1].completed);
    }

    #[test]
    fn parse_list_rejects_record_without_id() {
        let response = HttpResponse::new(200, r#"[{"text":"orphan","completed":false}]"#);
        let err = client().parse_list(response).unwrap_err();
        assert!(matches!(err, SyncError::Deserialization(_)));
    }

    #[test]
    fn parse_list_bad_json() {
        let err = client().parse_list(HttpResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, SyncError::Deserialization(_)));
    }

    #[test]
    fn parse_create_accepts_200_and_201() {
        let body = r#"{"_id":"n1","text":"New","completed":false}"#;
        assert_eq!(client().parse_create(HttpResponse::new(201, body)).unwrap().text, "New");
        assert_eq!(client().parse_create(HttpResponse::new(200, body)).unwrap().text, "New");
    }

    #[test]
    fn parse_create_wrong_status() {
        let err = client()
            .parse_create(HttpResponse::new(500, "internal error"))
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 500,
                message: None
            }
        );
    }

    #[test]
    fn parse_update_carries_server_message() {
        let err = client()
            .parse_update(HttpResponse::new(404, r#"{"message":"not found"}"#))
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 404,
                message: Some("not found".to_string())
            }
        );
    }

    #[test]
    fn parse_toggle_success() {
        let todo = client()
            .parse_toggle(HttpResponse::new(200, r#"{"id":"t","text":"x","completed":true}"#))
            .unwrap();
        assert!(todo.completed);
    }

    #[test]
    fn parse_delete_confirmations() {
        assert!(client().parse_delete(HttpResponse::new(200, r#"{"message":"ok"}"#)).is_ok());
        assert!(client().parse_delete(HttpResponse::new(204, "")).is_ok());
    }

    #[test]
    fn parse_delete_other_2xx_is_not_confirmation() {
        let err = client().parse_delete(HttpResponse::new(202, "")).unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 202, .. }));
    }
}
