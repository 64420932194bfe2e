//! C-ABI wrapper around `todo-sync`.
//!
//! # Overview
//! Lets a UI written in any language with a C FFI drive the sync layer: it
//! dispatches refresh/add/edit/toggle/delete and reads back the collection,
//! the busy flag, and the last error message.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Dispatch functions return an `FfiStatus`; the user-facing message for a
//!   failure is read separately with `todo_session_last_error`.
//! - A null `id` or `text` is forwarded as an empty string so it takes the
//!   same validation path as blank input. Only a null session is `NullArg`.
//! - The C caller owns all returned pointers and must call the matching
//!   `todo_free_*` function to release them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use todo_sync::{ClientConfig, HttpTransport, SyncError, TodoSync};

use types::*;

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Create a session bound to `base_url` (for example `http://host/api`).
///
/// `timeout_ms` bounds each request attempt; 0 selects the default of 30 s.
/// Retry and toggle behaviour use their defaults.
/// Returns null if `base_url` is null, not UTF-8, or blank, or if an internal
/// panic occurs.
/// The caller must free the returned pointer with `todo_session_free`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_new(base_url: *const c_char, timeout_ms: u64) -> *mut FfiTodoSession {
    catch_unwind(|| {
        if base_url.is_null() {
            return std::ptr::null_mut();
        }
        let url = match unsafe { CStr::from_ptr(base_url) }.to_str() {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                tracing::error!("todo_session_new: base_url must be non-blank UTF-8");
                return std::ptr::null_mut();
            }
        };
        let mut config = ClientConfig::new(url);
        if timeout_ms > 0 {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        new_session(&config)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a session configured from the `TODO_API_*` environment variables.
///
/// Returns null if any variable is malformed.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_from_env() -> *mut FfiTodoSession {
    catch_unwind(|| match ClientConfig::from_env() {
        Ok(config) => new_session(&config),
        Err(err) => {
            tracing::error!(error = %err, "invalid todo client configuration");
            std::ptr::null_mut()
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

fn new_session(config: &ClientConfig) -> *mut FfiTodoSession {
    Box::into_raw(Box::new(FfiTodoSession {
        inner: TodoSync::connect(config),
    }))
}

/// Free a session created by `todo_session_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_free(session: *mut FfiTodoSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(session) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Reload the whole collection from the server.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_refresh(session: *const FfiTodoSession) -> FfiStatus {
    dispatch(session, "todo_session_refresh", |sync| sync.fetch_all())
}

/// Create a todo with `text`. Blank text is rejected without a request.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_add(session: *const FfiTodoSession, text: *const c_char) -> FfiStatus {
    dispatch(session, "todo_session_add", |sync| {
        sync.create(str_arg(text)).map(drop)
    })
}

/// Replace the text of todo `id`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_edit(
    session: *const FfiTodoSession,
    id: *const c_char,
    text: *const c_char,
) -> FfiStatus {
    dispatch(session, "todo_session_edit", |sync| {
        sync.update(str_arg(id), str_arg(text)).map(drop)
    })
}

/// Flip the completion flag of todo `id`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_toggle(session: *const FfiTodoSession, id: *const c_char) -> FfiStatus {
    dispatch(session, "todo_session_toggle", |sync| {
        sync.toggle(str_arg(id)).map(drop)
    })
}

/// Delete todo `id`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_delete(session: *const FfiTodoSession, id: *const c_char) -> FfiStatus {
    dispatch(session, "todo_session_delete", |sync| sync.delete(str_arg(id)))
}

fn dispatch<F>(session: *const FfiTodoSession, name: &str, op: F) -> FfiStatus
where
    F: FnOnce(&TodoSync<HttpTransport>) -> Result<(), SyncError>,
{
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return FfiStatus::NullArg;
        }
        let session = unsafe { &*session };
        match op(&session.inner) {
            Ok(()) => FfiStatus::Ok,
            Err(err) => FfiStatus::from(&err),
        }
    }))
    .unwrap_or_else(|_| {
        tracing::error!(function = name, "panic caught at FFI boundary");
        FfiStatus::Panic
    })
}

/// Borrow a C string argument; null and invalid UTF-8 read as empty.
fn str_arg<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Presentation state
// ---------------------------------------------------------------------------

/// Snapshot the collection. Returns null if `session` is null.
/// The caller must free the returned pointer with `todo_free_list`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_items(session: *const FfiTodoSession) -> *mut FfiTodoList {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return std::ptr::null_mut();
        }
        let session = unsafe { &*session };
        FfiTodoList::from_items(session.inner.items())
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// True while an operation is in flight. False for a null session.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_is_busy(session: *const FfiTodoSession) -> bool {
    read_flag(session, |sync| sync.is_busy())
}

/// True while the in-flight request is being retried after a timeout.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_is_retrying(session: *const FfiTodoSession) -> bool {
    read_flag(session, |sync| sync.is_retrying())
}

fn read_flag<F>(session: *const FfiTodoSession, read: F) -> bool
where
    F: FnOnce(&TodoSync<HttpTransport>) -> bool,
{
    catch_unwind(AssertUnwindSafe(|| {
        !session.is_null() && read(&unsafe { &*session }.inner)
    }))
    .unwrap_or(false)
}

/// The message for the most recent failure, or null if there is none.
/// The caller must free a non-null result with `todo_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_last_error(session: *const FfiTodoSession) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return std::ptr::null_mut();
        }
        let session = unsafe { &*session };
        session
            .inner
            .last_error()
            .map_or(std::ptr::null_mut(), into_c_string)
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Dismiss the current error message. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_session_clear_error(session: *const FfiTodoSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*session }.inner.clear_error();
        }));
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a list returned by `todo_session_items`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_list(list: *mut FfiTodoList) {
    if list.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let list = unsafe { Box::from_raw(list) };
        if !list.items.is_null() {
            let items = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    list.items,
                    list.len as usize,
                ))
            };
            for item in items.iter() {
                free_ffi_todo_fields(item);
            }
        }
    }));
}

/// Free the C-string fields of an `FfiTodo` (but not the struct itself).
fn free_ffi_todo_fields(todo: &FfiTodo) {
    if !todo.id.is_null() {
        drop(unsafe { CString::from_raw(todo.id) });
    }
    if !todo.text.is_null() {
        drop(unsafe { CString::from_raw(todo.text) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn todo_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    /// Nothing listens here; validation tests must never reach the network.
    fn offline_session() -> *mut FfiTodoSession {
        let url = CString::new("http://127.0.0.1:1/api").unwrap();
        let session = todo_session_new(url.as_ptr(), 500);
        assert!(!session.is_null());
        session
    }

    fn last_error(session: *const FfiTodoSession) -> Option<String> {
        let ptr = todo_session_last_error(session);
        if ptr.is_null() {
            return None;
        }
        let msg = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        todo_free_string(ptr);
        Some(msg)
    }

    #[test]
    fn session_new_and_free() {
        let session = offline_session();
        assert!(!todo_session_is_busy(session));
        assert!(!todo_session_is_retrying(session));
        assert_eq!(last_error(session), None);
        todo_session_free(session);
    }

    #[test]
    fn session_new_null_returns_null() {
        assert!(todo_session_new(std::ptr::null(), 0).is_null());
    }

    #[test]
    fn session_new_rejects_unusable_url() {
        let not_utf8 = CString::new(vec![b'h', 0xff, 0xfe]).unwrap();
        assert!(todo_session_new(not_utf8.as_ptr(), 0).is_null());
        let blank = CString::new("  ").unwrap();
        assert!(todo_session_new(blank.as_ptr(), 0).is_null());
    }

    #[test]
    fn session_free_null_is_safe() {
        todo_session_free(std::ptr::null_mut());
    }

    #[test]
    fn null_session_is_null_arg() {
        let text = CString::new("x").unwrap();
        assert_eq!(todo_session_refresh(std::ptr::null()), FfiStatus::NullArg);
        assert_eq!(todo_session_add(std::ptr::null(), text.as_ptr()), FfiStatus::NullArg);
        assert_eq!(todo_session_delete(std::ptr::null(), text.as_ptr()), FfiStatus::NullArg);
        assert!(todo_session_items(std::ptr::null()).is_null());
        assert!(todo_session_last_error(std::ptr::null()).is_null());
        assert!(!todo_session_is_busy(std::ptr::null()));
        todo_session_clear_error(std::ptr::null());
    }

    #[test]
    fn blank_text_is_rejected_locally() {
        let session = offline_session();
        let blank = CString::new("   ").unwrap();
        assert_eq!(todo_session_add(session, blank.as_ptr()), FfiStatus::Validation);
        assert_eq!(last_error(session).as_deref(), Some("Todo text cannot be empty"));
        assert_eq!(todo_session_add(session, std::ptr::null()), FfiStatus::Validation);
        todo_session_free(session);
    }

    #[test]
    fn null_id_is_rejected_locally() {
        let session = offline_session();
        let text = CString::new("new text").unwrap();
        assert_eq!(
            todo_session_edit(session, std::ptr::null(), text.as_ptr()),
            FfiStatus::Validation
        );
        assert_eq!(last_error(session).as_deref(), Some("Invalid todo ID"));
        assert_eq!(todo_session_toggle(session, std::ptr::null()), FfiStatus::Validation);
        assert_eq!(todo_session_delete(session, std::ptr::null()), FfiStatus::Validation);
        todo_session_free(session);
    }

    #[test]
    fn clear_error_dismisses_message() {
        let session = offline_session();
        todo_session_add(session, std::ptr::null());
        assert!(last_error(session).is_some());
        todo_session_clear_error(session);
        assert_eq!(last_error(session), None);
        todo_session_free(session);
    }

    #[test]
    fn unreachable_server_reports_transport_failure() {
        let session = offline_session();
        assert_eq!(todo_session_refresh(session), FfiStatus::Transport);
        assert_eq!(
            last_error(session).as_deref(),
            Some("Failed to fetch todos. Please try again later.")
        );
        assert!(!todo_session_is_busy(session));
        todo_session_free(session);
    }

    #[test]
    fn empty_session_lists_nothing() {
        let session = offline_session();
        let list = todo_session_items(session);
        assert!(!list.is_null());
        let list_ref = unsafe { &*list };
        assert_eq!(list_ref.len, 0);
        assert!(list_ref.items.is_null());
        todo_free_list(list);
        todo_session_free(session);
    }

    #[test]
    fn free_list_null_is_safe() {
        todo_free_list(std::ptr::null_mut());
    }

    #[test]
    fn free_string_null_is_safe() {
        todo_free_string(std::ptr::null_mut());
    }
}
