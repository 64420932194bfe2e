//! Todo records and request payloads.
//!
//! # Design
//! The service has shipped two schemas for the identifier field: `_id` and
//! `id`. Normalization happens inside `TodoItem`'s `Deserialize` impl, so any
//! record that reaches the store has already been reduced to one canonical,
//! non-empty `TodoId`. Callers never see the raw wire shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Opaque, server-assigned identifier of a todo. Never empty or blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoId(String);

impl TodoId {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TodoId {
    type Error = MissingIdentifier;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        TodoId::new(raw).ok_or(MissingIdentifier)
    }
}

impl From<TodoId> for String {
    fn from(id: TodoId) -> Self {
        id.0
    }
}

/// A record arrived without a usable `_id` or `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("todo record has no non-empty `_id` or `id` field")]
pub struct MissingIdentifier;

/// A todo as last confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireTodo")]
pub struct TodoItem {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
}

/// Record shape as the service sends it, before identifier normalization.
#[derive(Deserialize)]
struct WireTodo {
    #[serde(rename = "_id", default)]
    underscore_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    text: String,
    #[serde(default)]
    completed: bool,
}

impl TryFrom<WireTodo> for TodoItem {
    type Error = MissingIdentifier;

    fn try_from(wire: WireTodo) -> Result<Self, Self::Error> {
        let id = id_from_value(wire.underscore_id)
            .or_else(|| id_from_value(wire.id))
            .ok_or(MissingIdentifier)?;
        Ok(TodoItem {
            id,
            text: wire.text,
            completed: wire.completed,
        })
    }
}

// Some deployments used numeric keys.
fn id_from_value(value: Option<Value>) -> Option<TodoId> {
    match value? {
        Value::String(s) => TodoId::new(s),
        Value::Number(n) => TodoId::new(n.to_string()),
        _ => None,
    }
}

/// Request payload for creating a todo. The server assigns the id and starts
/// the item uncompleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTodo {
    pub text: String,
}

/// Request payload for updating a todo. Omitted fields stay unchanged on the
/// server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Error body the service attaches to non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub message: Option<String>,
}

impl ServerMessage {
    /// Extracts a non-empty `message` from a response body, if it is JSON.
    pub fn from_body(body: &str) -> Option<String> {
        serde_json::from_str::<ServerMessage>(body)
            .ok()
            .and_then(|m| m.message)
            .filter(|m| !m.trim().is_empty())
    }
}
