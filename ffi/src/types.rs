//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, a pointer/length pair instead of `Vec`,
//! and enums with explicit discriminants. Conversion functions live here to
//! keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use todo_sync::{HttpTransport, SyncError, TodoItem, TodoSync};

/// Opaque handle to a sync session. C callers receive a pointer to this and
/// pass it back into every `todo_session_*` function.
pub struct FfiTodoSession {
    pub(crate) inner: TodoSync<HttpTransport>,
}

/// Outcome of a dispatched operation.
///
/// Anything other than `Ok` also leaves a message in the session's error
/// slot (except `NullArg` and `Panic`, which never reach the session).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiStatus {
    Ok = 0,
    NullArg = 1,
    Validation = 2,
    Timeout = 3,
    Transport = 4,
    Server = 5,
    Deserialization = 6,
    Serialization = 7,
    Panic = 8,
}

impl From<&SyncError> for FfiStatus {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::Validation(_) => FfiStatus::Validation,
            SyncError::Timeout => FfiStatus::Timeout,
            SyncError::Transport(_) => FfiStatus::Transport,
            SyncError::Server { .. } => FfiStatus::Server,
            SyncError::Deserialization(_) => FfiStatus::Deserialization,
            SyncError::Serialization(_) => FfiStatus::Serialization,
        }
    }
}

/// A single todo exposed to C.
#[repr(C)]
pub struct FfiTodo {
    pub id: *mut c_char,
    pub text: *mut c_char,
    pub completed: bool,
}

/// A snapshot of the session's collection, in display order.
#[repr(C)]
pub struct FfiTodoList {
    pub items: *mut FfiTodo,
    pub len: u32,
}

impl FfiTodoList {
    pub(crate) fn from_items(items: Vec<TodoItem>) -> *mut Self {
        let ffi_items: Box<[FfiTodo]> = items
            .into_iter()
            .map(|t| FfiTodo {
                id: into_c_string(t.id.into()),
                text: into_c_string(t.text),
                completed: t.completed,
            })
            .collect();

        let len = ffi_items.len() as u32;
        let items = if ffi_items.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(ffi_items) as *mut FfiTodo
        };
        Box::into_raw(Box::new(FfiTodoList { items, len }))
    }
}

/// Convert to an owned C string, dropping interior NULs rather than failing.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let c_string = CString::new(s).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c_string.into_raw()
}
