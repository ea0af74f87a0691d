//! Test doubles for the native backend
//!
//! `Recorder` stands in for the webview library: it logs every entry point in
//! call order, hands out fake handles, remembers registered trampolines and
//! can simulate a native-side invocation of a bound function.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_int, c_void, CStr, CString};
use std::rc::Rc;

use crate::backend::{BindTrampoline, NativeBackend, RawWebview, RawWindow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCall {
    Create { debug: bool },
    Destroy,
    Run,
    Terminate,
    GetWindow,
    SetTitle(String),
    SetSize { width: i32, height: i32, hint: i32 },
    Navigate(String),
    SetHtml(String),
    Init(String),
    Eval(String),
    Bind(String),
    Unbind(String),
    Return { seq: String, status: i32, result: String },
    /// The backend itself was dropped, i.e. the library was closed
    Close,
}

pub(crate) struct Recorder {
    calls: RefCell<Vec<RecordedCall>>,
    bindings: RefCell<HashMap<String, (BindTrampoline, *mut c_void)>>,
    next_handle: Cell<usize>,
    last_handle: Cell<Option<RawWebview>>,
}

impl Recorder {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            calls: RefCell::new(Vec::new()),
            bindings: RefCell::new(HashMap::new()),
            next_handle: Cell::new(0),
            last_handle: Cell::new(None),
        })
    }

    /// A fresh backend view over this recorder; dropping it logs `Close`.
    pub(crate) fn backend(self: &Rc<Self>) -> Rc<dyn NativeBackend> {
        Rc::new(RecordingBackend { recorder: self.clone() })
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// All `webview_return` calls as (seq, status, result) triples.
    pub(crate) fn returns(&self) -> Vec<(String, i32, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Return { seq, status, result } => {
                    Some((seq.clone(), *status, result.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_created_handle(&self) -> Option<RawWebview> {
        self.last_handle.get()
    }

    /// Simulate the native side invoking the bound function `name`.
    /// Returns false (without faulting) when no trampoline is registered.
    pub(crate) fn invoke(&self, name: &str, seq: &str, req: &str) -> bool {
        let registered = self.bindings.borrow().get(name).copied();
        let Some((trampoline, arg)) = registered else {
            return false;
        };
        let seq = CString::new(seq).unwrap();
        let req = CString::new(req).unwrap();
        unsafe { trampoline(seq.as_ptr(), req.as_ptr(), arg) };
        true
    }

    fn record(&self, call: RecordedCall) {
        self.calls.borrow_mut().push(call);
    }
}

struct RecordingBackend {
    recorder: Rc<Recorder>,
}

impl Drop for RecordingBackend {
    fn drop(&mut self) {
        self.recorder.record(RecordedCall::Close);
    }
}

impl NativeBackend for RecordingBackend {
    fn create(&self, debug: bool, _window: *mut c_void) -> RawWebview {
        let n = self.recorder.next_handle.get() + 1;
        self.recorder.next_handle.set(n);
        let handle = (0x1000 + n * 0x10) as RawWebview;
        self.recorder.last_handle.set(Some(handle));
        self.recorder.record(RecordedCall::Create { debug });
        handle
    }

    fn destroy(&self, _webview: RawWebview) {
        self.recorder.record(RecordedCall::Destroy);
    }

    fn run(&self, _webview: RawWebview) {
        self.recorder.record(RecordedCall::Run);
    }

    fn terminate(&self, _webview: RawWebview) {
        self.recorder.record(RecordedCall::Terminate);
    }

    fn get_window(&self, webview: RawWebview) -> RawWindow {
        self.recorder.record(RecordedCall::GetWindow);
        webview
    }

    fn set_title(&self, _webview: RawWebview, title: &CStr) {
        self.recorder
            .record(RecordedCall::SetTitle(title.to_string_lossy().into_owned()));
    }

    fn set_size(&self, _webview: RawWebview, width: c_int, height: c_int, hint: c_int) {
        self.recorder.record(RecordedCall::SetSize { width, height, hint });
    }

    fn navigate(&self, _webview: RawWebview, url: &CStr) {
        self.recorder
            .record(RecordedCall::Navigate(url.to_string_lossy().into_owned()));
    }

    fn set_html(&self, _webview: RawWebview, html: &CStr) {
        self.recorder
            .record(RecordedCall::SetHtml(html.to_string_lossy().into_owned()));
    }

    fn init(&self, _webview: RawWebview, js: &CStr) {
        self.recorder
            .record(RecordedCall::Init(js.to_string_lossy().into_owned()));
    }

    fn eval(&self, _webview: RawWebview, js: &CStr) {
        self.recorder
            .record(RecordedCall::Eval(js.to_string_lossy().into_owned()));
    }

    fn bind(&self, _webview: RawWebview, name: &CStr, cb: BindTrampoline, arg: *mut c_void) {
        let name = name.to_string_lossy().into_owned();
        self.recorder.bindings.borrow_mut().insert(name.clone(), (cb, arg));
        self.recorder.record(RecordedCall::Bind(name));
    }

    fn unbind(&self, _webview: RawWebview, name: &CStr) {
        let name = name.to_string_lossy().into_owned();
        self.recorder.bindings.borrow_mut().remove(&name);
        self.recorder.record(RecordedCall::Unbind(name));
    }

    fn ret(&self, _webview: RawWebview, seq: &CStr, status: c_int, result: &CStr) {
        self.recorder.record(RecordedCall::Return {
            seq: seq.to_string_lossy().into_owned(),
            status,
            result: result.to_string_lossy().into_owned(),
        });
    }
}

/// Yield enough times for spawned local tasks (handle resolution, deferred
/// bind results) to run to completion.
pub(crate) async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
