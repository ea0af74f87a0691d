//! Bidirectional function binding
//!
//! A bound function appears in the webview as a global async JavaScript
//! function. The native side invokes a C trampoline with a sequence token and
//! a JSON array of arguments; the host runs its callback and answers through
//! `webview_return` with a status code (0 success, 1 error) and a JSON
//! payload. Whatever happens inside the callback is converted into that
//! status/payload pair and never escapes the callback frame.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::future::Future;
use std::pin::Pin;
use std::ptr;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::library::NativeCall;
use crate::webview::Webview;
use crate::Result;

/// Status code accompanying a `webview_return`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStatus {
    /// The result is a valid JSON value
    Success,
    /// The result is a JSON error payload
    Error,
}

impl BindStatus {
    pub(crate) fn code(self) -> c_int {
        match self {
            BindStatus::Success => 0,
            BindStatus::Error => 1,
        }
    }
}

/// Outcome of a bound-function callback
pub enum BindOutcome {
    /// Answer immediately with status 0
    Resolved(Value),
    /// Answer immediately with status 1
    Rejected(Value),
    /// Answer once the future settles: `Ok` maps to status 0, `Err` to
    /// status 1, mirroring the synchronous paths
    Pending(Pin<Box<dyn Future<Output = std::result::Result<Value, Value>>>>),
}

impl BindOutcome {
    /// Successful result from any serializable value.
    pub fn resolve(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => BindOutcome::Resolved(value),
            Err(err) => BindOutcome::Rejected(Value::String(err.to_string())),
        }
    }

    /// Error result from any serializable value.
    pub fn reject(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => BindOutcome::Rejected(value),
            Err(err) => BindOutcome::Rejected(Value::String(err.to_string())),
        }
    }

    /// Deferred result; the answer is sent when the future settles.
    pub fn pending(
        future: impl Future<Output = std::result::Result<Value, Value>> + 'static,
    ) -> Self {
        BindOutcome::Pending(Box::pin(future))
    }
}

/// Host-side resource backing one binding.
///
/// The session holds a strong count through its bindings map; the native
/// layer holds only the slot's address as the trampoline's user pointer. The
/// trampoline takes its own strong count for the duration of each
/// invocation, so the slot stays alive through the current callback frame
/// even when that callback unbinds its own name or destroys the session.
pub(crate) struct BindSlot {
    handler: Box<dyn Fn(&str, &str, *mut c_void)>,
    user_arg: *mut c_void,
}

/// The single C-callable trampoline shared by all bindings. `arg` is the
/// address of the invoked binding's `BindSlot`; null string pointers decode
/// as empty strings.
unsafe extern "C" fn bind_trampoline(seq: *const c_char, req: *const c_char, arg: *mut c_void) {
    if arg.is_null() {
        return;
    }
    let slot_ptr = arg as *const BindSlot;
    // Pin the slot for this frame: the handler may remove the map's strong
    // count from under us (unbind of its own name, session destroy).
    Rc::increment_strong_count(slot_ptr);
    let slot = Rc::from_raw(slot_ptr);
    let seq = if seq.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        CStr::from_ptr(seq).to_string_lossy()
    };
    let req = if req.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        CStr::from_ptr(req).to_string_lossy()
    };
    (slot.handler)(&seq, &req, slot.user_arg);
}

fn encode_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

impl Webview {
    /// Bind `callback` under `name` with the raw wire protocol.
    ///
    /// The callback receives the sequence token, the request payload (a JSON
    /// array string) and the registered user pointer, and is responsible for
    /// eventually calling [`ret`](Self::ret) with the same token.
    pub fn bind_raw(
        &self,
        name: &str,
        callback: impl Fn(&str, &str, *mut c_void) + 'static,
        user_arg: *mut c_void,
    ) -> Result<()> {
        let c_name = CString::new(name)?;
        let name = name.to_string();
        self.when_ready(move |wv, handle| {
            let slot = Rc::new(BindSlot { handler: Box::new(callback), user_arg });
            // The allocation gives the slot a stable address for the native side.
            let slot_ptr = Rc::as_ptr(&slot) as *mut c_void;
            wv.shared().bindings.borrow_mut().insert(name, slot);
            let _ = wv.library().unit_call(NativeCall::Bind {
                webview: handle,
                name: c_name,
                trampoline: bind_trampoline,
                arg: slot_ptr,
            });
        });
        Ok(())
    }

    /// Bind `callback` under `name` with JSON marshaling.
    ///
    /// The request payload is decoded as a JSON array and passed positionally;
    /// the returned [`BindOutcome`] is encoded and sent back with the matching
    /// status code. A payload that fails to decode is answered like a callback
    /// error (status 1, the decode error as JSON string).
    pub fn bind(
        &self,
        name: &str,
        callback: impl Fn(Vec<Value>) -> BindOutcome + 'static,
    ) -> Result<()> {
        let session = Rc::downgrade(self.shared());
        let lib = self.library().clone();
        self.bind_raw(
            name,
            move |seq, req, _arg| {
                let Some(shared) = session.upgrade() else {
                    return;
                };
                let webview = Webview::from_shared(shared, lib.clone());
                let outcome = match serde_json::from_str::<Vec<Value>>(req) {
                    Ok(args) => callback(args),
                    Err(err) => BindOutcome::Rejected(Value::String(err.to_string())),
                };
                webview.answer(seq, outcome);
            },
            ptr::null_mut(),
        )
    }

    fn answer(&self, seq: &str, outcome: BindOutcome) {
        match outcome {
            BindOutcome::Resolved(value) => {
                let _ = self.ret(seq, BindStatus::Success, &encode_json(&value));
            }
            BindOutcome::Rejected(value) => {
                let _ = self.ret(seq, BindStatus::Error, &encode_json(&value));
            }
            BindOutcome::Pending(future) => {
                let seq = seq.to_string();
                let webview = self.clone();
                tokio::task::spawn_local(async move {
                    let (status, value) = match future.await {
                        Ok(value) => (BindStatus::Success, value),
                        Err(value) => (BindStatus::Error, value),
                    };
                    let _ = webview.ret(&seq, status, &encode_json(&value));
                });
            }
        }
    }

    /// Unbind `name`, removing it from the webview JavaScript context and
    /// releasing its slot. The native unbind is issued even if the name was
    /// never bound; releasing an absent slot is a no-op.
    pub fn unbind(&self, name: &str) -> Result<()> {
        let handle = self.handle_or_not_ready()?;
        let c_name = CString::new(name)?;
        let _ = self.library().unit_call(NativeCall::Unbind { webview: handle, name: c_name });
        // Drops the map's strong count. The native side no longer holds the
        // slot address (unbind dispatches synchronously while the library is
        // live), and a currently executing trampoline frame keeps its own
        // count until it returns.
        self.shared().bindings.borrow_mut().remove(name);
        Ok(())
    }

    /// Answer a bound-function invocation.
    ///
    /// Only valid from within an already-dispatched callback frame, where the
    /// handle is guaranteed present; `result` must be the JSON-encoded value
    /// (status 0) or error payload (status 1).
    pub fn ret(&self, seq: &str, status: BindStatus, result: &str) -> Result<()> {
        let handle = self.handle_or_not_ready()?;
        let seq = CString::new(seq)?;
        let result = CString::new(result)?;
        let _ = self.library().unit_call(NativeCall::Return {
            webview: handle,
            seq,
            status: status.code(),
            result,
        });
        Ok(())
    }
}
