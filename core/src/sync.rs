//! Sync operations: fetch, create, update, toggle, delete.
//!
//! # Design
//! Each operation sends one logical request through the retrying transport
//! and, once the server has confirmed it, folds the result into the store.
//! Nothing is written to the store ahead of a response.
//!
//! Two locks:
//! - `op_lock` serializes whole operations, so two folds can never interleave
//!   even if callers ignore `is_busy`.
//! - `state` guards the store and the error slot. It is only held for short
//!   reads and folds, never across a network call, so a UI thread can render
//!   while an operation is in flight.
//!
//! Every failure is returned to the caller and also written to the error slot
//! as a user-facing sentence; every success clears the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::TodoClient;
use crate::config::{ClientConfig, ToggleMode};
use crate::error::{Operation, SyncError, ValidationError};
use crate::http::{HttpRequest, HttpResponse};
use crate::store::TodoStore;
use crate::transport::{HttpTransport, RetryingTransport, Transport};
use crate::types::{NewTodo, TodoId, TodoItem, TodoPatch};

#[derive(Debug, Default)]
struct SyncState {
    store: TodoStore,
    last_error: Option<String>,
}

/// The client-side sync layer over one remote todo collection.
pub struct TodoSync<T> {
    client: TodoClient,
    transport: RetryingTransport<T>,
    toggle_mode: ToggleMode,
    op_lock: Mutex<()>,
    state: Mutex<SyncState>,
    busy: AtomicBool,
    retrying: AtomicBool,
}

impl TodoSync<HttpTransport> {
    /// Sync layer talking HTTP to `config.base_url`.
    pub fn connect(config: &ClientConfig) -> Self {
        Self::new(config, HttpTransport::new(config.timeout))
    }
}

impl<T: Transport> TodoSync<T> {
    pub fn new(config: &ClientConfig, transport: T) -> Self {
        Self {
            client: TodoClient::new(&config.base_url),
            transport: RetryingTransport::new(transport, config.retry),
            toggle_mode: config.toggle_mode,
            op_lock: Mutex::new(()),
            state: Mutex::new(SyncState::default()),
            busy: AtomicBool::new(false),
            retrying: AtomicBool::new(false),
        }
    }

    /// Replaces the local collection with the server's listing.
    pub fn fetch_all(&self) -> Result<(), SyncError> {
        self.run(Operation::Fetch, || {
            let response = self.send(&self.client.build_list())?;
            let items = self.client.parse_list(response)?;
            info!(count = items.len(), "fetched todos");
            self.lock_state().store.replace_all(items);
            Ok(())
        })
    }

    /// Creates a todo and appends the server's record. Blank text is rejected
    /// without a request.
    pub fn create(&self, text: &str) -> Result<TodoItem, SyncError> {
        let Some(text) = non_blank(text) else {
            return self.reject(Operation::Create, ValidationError::EmptyText);
        };
        self.run(Operation::Create, || {
            let request = self.client.build_create(&NewTodo {
                text: text.to_string(),
            })?;
            let item = self.client.parse_create(self.send(&request)?)?;
            debug!(id = %item.id, "created todo");
            self.lock_state().store.append(item.clone());
            Ok(item)
        })
    }

    /// Replaces the text of todo `id`.
    pub fn update(&self, id: &str, text: &str) -> Result<TodoItem, SyncError> {
        let Some(id) = TodoId::new(id) else {
            return self.reject(Operation::Update, ValidationError::MissingId);
        };
        let Some(text) = non_blank(text) else {
            return self.reject(Operation::Update, ValidationError::EmptyText);
        };
        self.run(Operation::Update, || {
            let patch = TodoPatch {
                text: Some(text.to_string()),
                completed: None,
            };
            let request = self.client.build_update(&id, &patch)?;
            let item = self.client.parse_update(self.send(&request)?)?;
            self.fold_replacement(&id, item.clone());
            Ok(item)
        })
    }

    /// Flips the completion flag of todo `id` on the server and adopts the
    /// server's record.
    pub fn toggle(&self, id: &str) -> Result<TodoItem, SyncError> {
        let Some(id) = TodoId::new(id) else {
            return self.reject(Operation::Toggle, ValidationError::MissingId);
        };
        self.run(Operation::Toggle, || {
            let item = match self.toggle_mode {
                ToggleMode::Endpoint => {
                    let response = self.send(&self.client.build_toggle(&id))?;
                    self.client.parse_toggle(response)?
                }
                ToggleMode::Update => {
                    let current = self
                        .lock_state()
                        .store
                        .get(&id)
                        .map(|t| t.completed)
                        .ok_or_else(|| ValidationError::UnknownItem(id.to_string()))?;
                    let patch = TodoPatch {
                        text: None,
                        completed: Some(!current),
                    };
                    let request = self.client.build_update(&id, &patch)?;
                    self.client.parse_update(self.send(&request)?)?
                }
            };
            self.fold_replacement(&id, item.clone());
            Ok(item)
        })
    }

    /// Deletes todo `id`. The local copy is removed only after the server
    /// confirms.
    pub fn delete(&self, id: &str) -> Result<(), SyncError> {
        let Some(id) = TodoId::new(id) else {
            return self.reject(Operation::Delete, ValidationError::MissingId);
        };
        self.run(Operation::Delete, || {
            let response = self.send(&self.client.build_delete(&id))?;
            self.client.parse_delete(response)?;
            if !self.lock_state().store.remove_by_id(&id) {
                debug!(%id, "deleted todo was not in the local store");
            }
            Ok(())
        })
    }

    /// Snapshot of the collection in display order.
    pub fn items(&self) -> Vec<TodoItem> {
        self.lock_state().store.items().to_vec()
    }

    /// Runs `f` against the store without copying it.
    pub fn with_store<R>(&self, f: impl FnOnce(&TodoStore) -> R) -> R {
        f(&self.lock_state().store)
    }

    /// True while an operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// True while the in-flight request is being retried after a timeout.
    pub fn is_retrying(&self) -> bool {
        self.retrying.load(Ordering::SeqCst)
    }

    /// The message for the most recent failure, until cleared or superseded
    /// by a success.
    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.lock_state().last_error = None;
    }

    fn run<R>(
        &self,
        op: Operation,
        body: impl FnOnce() -> Result<R, SyncError>,
    ) -> Result<R, SyncError> {
        let _slot = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.busy.store(true, Ordering::SeqCst);
        let _busy = LowerOnDrop(&self.busy);

        let result = body();
        self.record(op, result.as_ref().err());
        result
    }

    fn reject<R>(&self, op: Operation, err: ValidationError) -> Result<R, SyncError> {
        let err = SyncError::from(err);
        self.record(op, Some(&err));
        Err(err)
    }

    fn record(&self, op: Operation, err: Option<&SyncError>) {
        let mut state = self.lock_state();
        match err {
            None => state.last_error = None,
            Some(err) => {
                warn!(?op, error = %err, "todo operation failed");
                state.last_error = Some(err.user_message(op));
            }
        }
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SyncError> {
        let _retrying = LowerOnDrop(&self.retrying);
        self.transport
            .execute_with(request, |_| self.retrying.store(true, Ordering::SeqCst))
            .map_err(SyncError::from)
    }

    fn fold_replacement(&self, id: &TodoId, item: TodoItem) {
        // A miss is logged by the store; the server's answer is still
        // returned to the caller.
        self.lock_state().store.replace_by_id(id, item);
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears a flag on every exit path, unwinding included.
struct LowerOnDrop<'a>(&'a AtomicBool);

impl Drop for LowerOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
