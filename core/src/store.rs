//! Client-side mirror of the server's todo collection.
//!
//! The store only ever holds server-confirmed records: it is filled by the
//! sync layer after a response arrives, never ahead of one.

use tracing::warn;

use crate::types::{TodoId, TodoItem};

/// Ordered collection of todos in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoStore {
    items: Vec<TodoItem>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the current contents in favour of a fresh listing.
    pub fn replace_all(&mut self, items: Vec<TodoItem>) {
        self.items = items;
    }

    pub fn append(&mut self, item: TodoItem) {
        self.items.push(item);
    }

    /// Replaces the record whose id equals `id`. Returns `false` and leaves
    /// the store untouched when no record matches.
    pub fn replace_by_id(&mut self, id: &TodoId, item: TodoItem) -> bool {
        match self.items.iter_mut().find(|t| &t.id == id) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => {
                warn!(%id, "server updated a todo that is not in the local store");
                false
            }
        }
    }

    /// Removes every record whose id equals `id`. Returns whether anything
    /// was removed.
    pub fn remove_by_id(&mut self, id: &TodoId) -> bool {
        let before = self.items.len();
        self.items.retain(|t| &t.id != id);
        self.items.len() != before
    }

    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.items.iter().find(|t| &t.id == id)
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
