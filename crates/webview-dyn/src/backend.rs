//! Native backend seam
//!
//! `NativeBackend` abstracts the fourteen webview entry points so the rest of
//! the crate never touches raw symbols directly. The production implementation
//! forwards to a symbol table resolved by `webview-dyn-sys`; tests substitute
//! a recording backend to observe call order and simulate bound-function
//! invocations.

use std::ffi::{c_int, c_void, CStr};

use webview_dyn_sys as sys;

/// Opaque handle to a native webview instance
pub type RawWebview = sys::webview_t;

/// Opaque pointer to the platform window backing a webview
pub type RawWindow = sys::webview_native_window_t;

/// C-callable trampoline signature for bound functions
pub type BindTrampoline = sys::webview_bind_cb_t;

/// The native entry points, one method per symbol.
///
/// String arguments arrive already encoded as null-terminated buffers; the
/// session layer owns the encoding. Implementations are not required to be
/// `Send`: the whole crate runs on one thread.
pub trait NativeBackend {
    fn create(&self, debug: bool, window: *mut c_void) -> RawWebview;
    fn destroy(&self, webview: RawWebview);
    /// Blocks until the native event loop exits.
    fn run(&self, webview: RawWebview);
    fn terminate(&self, webview: RawWebview);
    fn get_window(&self, webview: RawWebview) -> RawWindow;
    fn set_title(&self, webview: RawWebview, title: &CStr);
    fn set_size(&self, webview: RawWebview, width: c_int, height: c_int, hint: c_int);
    fn navigate(&self, webview: RawWebview, url: &CStr);
    fn set_html(&self, webview: RawWebview, html: &CStr);
    fn init(&self, webview: RawWebview, js: &CStr);
    fn eval(&self, webview: RawWebview, js: &CStr);
    fn bind(&self, webview: RawWebview, name: &CStr, cb: BindTrampoline, arg: *mut c_void);
    fn unbind(&self, webview: RawWebview, name: &CStr);
    fn ret(&self, webview: RawWebview, seq: &CStr, status: c_int, result: &CStr);
}

/// Backend over a dynamically loaded symbol table
pub(crate) struct DlBackend {
    symbols: sys::WebviewSymbols,
}

impl DlBackend {
    pub(crate) fn new(symbols: sys::WebviewSymbols) -> Self {
        Self { symbols }
    }
}

impl NativeBackend for DlBackend {
    fn create(&self, debug: bool, window: *mut c_void) -> RawWebview {
        unsafe { (self.symbols.create)(debug as c_int, window) }
    }

    fn destroy(&self, webview: RawWebview) {
        unsafe { (self.symbols.destroy)(webview) }
    }

    fn run(&self, webview: RawWebview) {
        unsafe { (self.symbols.run)(webview) }
    }

    fn terminate(&self, webview: RawWebview) {
        unsafe { (self.symbols.terminate)(webview) }
    }

    fn get_window(&self, webview: RawWebview) -> RawWindow {
        unsafe { (self.symbols.get_window)(webview) }
    }

    fn set_title(&self, webview: RawWebview, title: &CStr) {
        unsafe { (self.symbols.set_title)(webview, title.as_ptr()) }
    }

    fn set_size(&self, webview: RawWebview, width: c_int, height: c_int, hint: c_int) {
        unsafe { (self.symbols.set_size)(webview, width, height, hint) }
    }

    fn navigate(&self, webview: RawWebview, url: &CStr) {
        unsafe { (self.symbols.navigate)(webview, url.as_ptr()) }
    }

    fn set_html(&self, webview: RawWebview, html: &CStr) {
        unsafe { (self.symbols.set_html)(webview, html.as_ptr()) }
    }

    fn init(&self, webview: RawWebview, js: &CStr) {
        unsafe { (self.symbols.init)(webview, js.as_ptr()) }
    }

    fn eval(&self, webview: RawWebview, js: &CStr) {
        unsafe { (self.symbols.eval)(webview, js.as_ptr()) }
    }

    fn bind(&self, webview: RawWebview, name: &CStr, cb: BindTrampoline, arg: *mut c_void) {
        unsafe { (self.symbols.bind)(webview, name.as_ptr(), cb, arg) }
    }

    fn unbind(&self, webview: RawWebview, name: &CStr) {
        unsafe { (self.symbols.unbind)(webview, name.as_ptr()) }
    }

    fn ret(&self, webview: RawWebview, seq: &CStr, status: c_int, result: &CStr) {
        unsafe { (self.symbols.ret)(webview, seq.as_ptr(), status, result.as_ptr()) }
    }
}
