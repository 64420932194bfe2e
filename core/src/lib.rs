//! Client-side sync layer for a remote todo service.
//!
//! # Overview
//! Fetches, creates, updates, toggles, and deletes todo items over HTTP and
//! keeps a local, server-confirmed copy of the collection for a UI to render.
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`.
//! - `Transport` is the only I/O seam. `RetryingTransport` owns the single
//!   retry policy (timeouts only); `HttpTransport` is the ureq-backed default.
//! - `TodoStore` is a plain ordered collection; `TodoSync` folds confirmed
//!   server results into it, one operation at a time.
//! - Identifier normalization (`_id` vs `id`) happens while deserializing
//!   `TodoItem`, so it cannot be skipped at any ingestion point.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod sync;
pub mod transport;
pub mod types;

pub use client::TodoClient;
pub use config::{ClientConfig, ToggleMode};
pub use error::{ConfigError, Operation, SyncError, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use store::TodoStore;
pub use sync::TodoSync;
pub use transport::{HttpTransport, RetryPolicy, RetryingTransport, Transport, TransportError};
pub use types::{NewTodo, TodoId, TodoItem, TodoPatch};
