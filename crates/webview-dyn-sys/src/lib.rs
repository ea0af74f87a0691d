//! Raw FFI surface for the webview native library
//!
//! This crate describes the fixed symbol table exported by the webview shared
//! library and resolves it at runtime with `libloading`. The library is never
//! linked at build time: which artifact to open (if any) is decided by the
//! host process, and the higher-level crate queues calls until a mapping
//! exists.
//!
//! # Safety
//!
//! Everything here is unsafe in spirit: the function pointers call directly
//! into C code. The caller is responsible for:
//! - Opening a library that actually implements the webview ABI
//! - Passing valid handles and null-terminated UTF-8 buffers
//! - Calling from the correct thread (usually the main/UI thread)

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};
use std::path::Path;

use libloading::Library;

/// Opaque handle to a webview instance
pub type webview_t = *mut c_void;

/// Opaque pointer to the platform window backing a webview
/// (`GtkWindow` on GTK, `NSWindow` on Cocoa, `HWND` on Win32)
pub type webview_native_window_t = *mut c_void;

/// Callback invoked by the native side for a bound function.
///
/// `seq` is the sequence token correlating the invocation with its eventual
/// `webview_return`, `req` is a JSON array of the call arguments, and `arg`
/// is the user pointer registered with `webview_bind`. Either string pointer
/// may be null.
pub type webview_bind_cb_t =
    unsafe extern "C" fn(seq: *const c_char, req: *const c_char, arg: *mut c_void);

// Entry-point signatures, one per symbol in the fixed table.

pub type webview_create_t =
    unsafe extern "C" fn(debug: c_int, window: *mut c_void) -> webview_t;
pub type webview_destroy_t = unsafe extern "C" fn(w: webview_t);
pub type webview_run_t = unsafe extern "C" fn(w: webview_t);
pub type webview_terminate_t = unsafe extern "C" fn(w: webview_t);
pub type webview_get_window_t =
    unsafe extern "C" fn(w: webview_t) -> webview_native_window_t;
pub type webview_set_title_t =
    unsafe extern "C" fn(w: webview_t, title: *const c_char);
pub type webview_set_size_t =
    unsafe extern "C" fn(w: webview_t, width: c_int, height: c_int, hints: c_int);
pub type webview_navigate_t =
    unsafe extern "C" fn(w: webview_t, url: *const c_char);
pub type webview_set_html_t =
    unsafe extern "C" fn(w: webview_t, html: *const c_char);
pub type webview_init_t = unsafe extern "C" fn(w: webview_t, js: *const c_char);
pub type webview_eval_t = unsafe extern "C" fn(w: webview_t, js: *const c_char);
pub type webview_bind_t = unsafe extern "C" fn(
    w: webview_t,
    name: *const c_char,
    cb: webview_bind_cb_t,
    arg: *mut c_void,
);
pub type webview_unbind_t =
    unsafe extern "C" fn(w: webview_t, name: *const c_char);
pub type webview_return_t = unsafe extern "C" fn(
    w: webview_t,
    seq: *const c_char,
    status: c_int,
    result: *const c_char,
);

/// Width and height are default size
pub const WEBVIEW_HINT_NONE: c_int = 0;
/// Width and height are minimum bounds
pub const WEBVIEW_HINT_MIN: c_int = 1;
/// Width and height are maximum bounds
pub const WEBVIEW_HINT_MAX: c_int = 2;
/// Window size can not be changed by a user
pub const WEBVIEW_HINT_FIXED: c_int = 3;

/// The complete symbol table of a loaded webview library.
///
/// Every entry point is resolved eagerly; a missing symbol fails the load as
/// a whole. The `Library` is kept alive alongside the raw function pointers
/// so the mapping outlives them.
pub struct WebviewSymbols {
    pub create: webview_create_t,
    pub destroy: webview_destroy_t,
    pub run: webview_run_t,
    pub terminate: webview_terminate_t,
    pub get_window: webview_get_window_t,
    pub set_title: webview_set_title_t,
    pub set_size: webview_set_size_t,
    pub navigate: webview_navigate_t,
    pub set_html: webview_set_html_t,
    pub init: webview_init_t,
    pub eval: webview_eval_t,
    pub bind: webview_bind_t,
    pub unbind: webview_unbind_t,
    pub ret: webview_return_t,
    _lib: Library,
}

impl WebviewSymbols {
    /// Open the shared library at `path` and resolve the full symbol table.
    ///
    /// # Safety
    ///
    /// The caller must ensure the file is a webview library implementing the
    /// expected ABI. Opening an arbitrary library runs its initializers.
    pub unsafe fn load(path: &Path) -> Result<Self, libloading::Error> {
        let lib = Library::new(path)?;

        unsafe fn sym<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, libloading::Error> {
            Ok(*lib.get::<T>(name)?)
        }

        Ok(Self {
            create: sym::<webview_create_t>(&lib, b"webview_create")?,
            destroy: sym::<webview_destroy_t>(&lib, b"webview_destroy")?,
            run: sym::<webview_run_t>(&lib, b"webview_run")?,
            terminate: sym::<webview_terminate_t>(&lib, b"webview_terminate")?,
            get_window: sym::<webview_get_window_t>(&lib, b"webview_get_window")?,
            set_title: sym::<webview_set_title_t>(&lib, b"webview_set_title")?,
            set_size: sym::<webview_set_size_t>(&lib, b"webview_set_size")?,
            navigate: sym::<webview_navigate_t>(&lib, b"webview_navigate")?,
            set_html: sym::<webview_set_html_t>(&lib, b"webview_set_html")?,
            init: sym::<webview_init_t>(&lib, b"webview_init")?,
            eval: sym::<webview_eval_t>(&lib, b"webview_eval")?,
            bind: sym::<webview_bind_t>(&lib, b"webview_bind")?,
            unbind: sym::<webview_unbind_t>(&lib, b"webview_unbind")?,
            ret: sym::<webview_return_t>(&lib, b"webview_return")?,
            _lib: lib,
        })
    }
}
