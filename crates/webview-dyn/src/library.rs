//! Deferred native interface
//!
//! `WebviewLibrary` fronts the native symbol table while the shared library
//! is still loading. Every entry point is issued as a `NativeCall` and
//! settles through a oneshot future: in queuing mode the call is recorded, in
//! live mode it dispatches synchronously against the backend, and after a
//! close it settles immediately with an error. When the load completes the
//! recorded calls are replayed in issue order and their original futures
//! settle with the real results.

use std::cell::RefCell;
use std::ffi::{c_int, c_void, CString};
use std::future::Future;
use std::mem;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use log::{debug, warn};
use tokio::sync::oneshot;

use webview_dyn_sys as sys;

use crate::backend::{BindTrampoline, DlBackend, NativeBackend, RawWebview, RawWindow};
use crate::error::{Error, Result};
use crate::platform;
use crate::webview::{SessionShared, Webview};

/// One native entry point with its arguments, ready to dispatch.
///
/// String arguments are encoded by the session layer before the call is
/// issued, so a queued call carries exactly the bytes that will cross the C
/// boundary.
pub(crate) enum NativeCall {
    Create { debug: bool, window: *mut c_void },
    Destroy { webview: RawWebview },
    Run { webview: RawWebview },
    Terminate { webview: RawWebview },
    GetWindow { webview: RawWebview },
    SetTitle { webview: RawWebview, title: CString },
    SetSize { webview: RawWebview, width: c_int, height: c_int, hint: c_int },
    Navigate { webview: RawWebview, url: CString },
    SetHtml { webview: RawWebview, html: CString },
    Init { webview: RawWebview, js: CString },
    Eval { webview: RawWebview, js: CString },
    Bind { webview: RawWebview, name: CString, trampoline: BindTrampoline, arg: *mut c_void },
    Unbind { webview: RawWebview, name: CString },
    Return { webview: RawWebview, seq: CString, status: c_int, result: CString },
    /// Close the library itself; queued and replayed like any other call
    Close,
}

/// Reply carried back through a call's oneshot channel
pub(crate) enum CallReply {
    Webview(RawWebview),
    Window(RawWindow),
    Unit,
}

pub(crate) type ReplyRx = oneshot::Receiver<Result<CallReply>>;

/// A call recorded while the library was still loading.
/// Consumed exactly once, in FIFO order, when the library goes live.
struct PendingInvocation {
    call: NativeCall,
    tx: oneshot::Sender<Result<CallReply>>,
}

enum LibraryState {
    /// No backend yet; calls accumulate here
    Queuing(Vec<PendingInvocation>),
    /// Backend installed; calls dispatch synchronously
    Live(Rc<dyn NativeBackend>),
    /// Terminal; calls settle with `Error::LibraryClosed`
    Closed,
}

struct LibraryShared {
    state: RefCell<LibraryState>,
    /// Live window sessions, swept on `unload`. Append-only otherwise.
    instances: RefCell<Vec<Weak<SessionShared>>>,
}

/// Handle to the (possibly still loading) native library.
///
/// Cheap to clone; all clones share one queue, one backend, and one instance
/// registry. Calls may be issued immediately after construction: they are
/// queued until the library is live and replayed in issue order.
#[derive(Clone)]
pub struct WebviewLibrary {
    shared: Rc<LibraryShared>,
}

impl WebviewLibrary {
    fn new_queuing() -> Self {
        Self {
            shared: Rc::new(LibraryShared {
                state: RefCell::new(LibraryState::Queuing(Vec::new())),
                instances: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Start loading the platform's webview artifact in the background.
    ///
    /// The returned handle is usable at once. If no artifact resolves for
    /// this platform a warning is logged once and the library stays in
    /// queuing mode forever: calls are accepted but their futures never
    /// settle. Must be called inside a tokio `LocalSet`.
    pub fn load() -> Self {
        let lib = Self::new_queuing();
        match platform::resolve_library_path() {
            Some(path) => lib.spawn_loader(path),
            None => warn!(
                "no webview library artifact for {}-{}; native calls will stay queued",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        }
        lib
    }

    /// Like [`load`](Self::load) but with an explicit artifact path.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let lib = Self::new_queuing();
        lib.spawn_loader(path.into());
        lib
    }

    /// Wrap an already available backend; the library starts live.
    pub fn with_backend(backend: Rc<dyn NativeBackend>) -> Self {
        Self {
            shared: Rc::new(LibraryShared {
                state: RefCell::new(LibraryState::Live(backend)),
                instances: RefCell::new(Vec::new()),
            }),
        }
    }

    fn spawn_loader(&self, path: PathBuf) {
        let lib = self.clone();
        tokio::task::spawn_local(async move {
            let shown = path.display().to_string();
            let loaded = tokio::task::spawn_blocking(move || {
                // SAFETY: the resolved artifact is trusted to implement the
                // webview ABI; that is the contract of WEBVIEW_PATH and the
                // bundled build/ directory.
                unsafe { sys::WebviewSymbols::load(&path) }
            })
            .await;

            match loaded {
                Ok(Ok(symbols)) => lib.go_live(Rc::new(DlBackend::new(symbols))),
                Ok(Err(err)) => warn!("failed to load webview library from {shown}: {err}"),
                Err(err) => warn!("webview library loader task failed: {err}"),
            }
        });
    }

    /// Install the backend and replay every queued call in issue order.
    ///
    /// Fires at most once; a second call is ignored with a warning. Each
    /// replayed call settles its original future with the real result. A
    /// queued `Close` transitions the state mid-replay, so calls queued after
    /// it settle with [`Error::LibraryClosed`] instead of dispatching.
    pub fn go_live(&self, backend: Rc<dyn NativeBackend>) {
        let pending = {
            let mut state = self.shared.state.borrow_mut();
            match &mut *state {
                LibraryState::Queuing(pending) => {
                    let drained = mem::take(pending);
                    *state = LibraryState::Live(backend.clone());
                    drained
                }
                _ => {
                    warn!("go_live on a library that is already live or closed");
                    return;
                }
            }
        };

        if !pending.is_empty() {
            debug!("webview library live; replaying {} queued calls", pending.len());
        }
        for PendingInvocation { call, tx } in pending {
            let closed = matches!(&*self.shared.state.borrow(), LibraryState::Closed);
            let reply = if closed {
                Err(Error::LibraryClosed)
            } else {
                self.dispatch(&backend, call)
            };
            let _ = tx.send(reply);
        }
    }

    /// True once a backend is installed and the library has not been closed.
    pub fn is_live(&self) -> bool {
        matches!(&*self.shared.state.borrow(), LibraryState::Live(_))
    }

    /// Destroy every registered window session, then close the library.
    ///
    /// Terminal: afterwards all calls settle with [`Error::LibraryClosed`].
    pub fn unload(&self) {
        debug!("unloading webview library");
        let sessions: Vec<Rc<SessionShared>> = self
            .shared
            .instances
            .borrow_mut()
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .collect();
        for shared in sessions {
            Webview::from_shared(shared, self.clone()).destroy();
        }
        let _ = self.call(NativeCall::Close);
    }

    pub(crate) fn register_session(&self, session: Weak<SessionShared>) {
        self.shared.instances.borrow_mut().push(session);
    }

    /// Issue a call. Recording (queuing), synchronous dispatch (live) or an
    /// immediate error (closed); in every mode the caller gets a future.
    pub(crate) fn call(&self, call: NativeCall) -> ReplyRx {
        let (tx, rx) = oneshot::channel();
        let backend = {
            let mut state = self.shared.state.borrow_mut();
            match &mut *state {
                LibraryState::Queuing(pending) => {
                    pending.push(PendingInvocation { call, tx });
                    return rx;
                }
                LibraryState::Live(backend) => backend.clone(),
                LibraryState::Closed => {
                    let _ = tx.send(Err(Error::LibraryClosed));
                    return rx;
                }
            }
        };
        // The state borrow is released before dispatch so a native callback
        // re-entering `call` (e.g. `webview_return` from inside `run`) finds
        // the library unlocked.
        let _ = tx.send(self.dispatch(&backend, call));
        rx
    }

    fn dispatch(&self, backend: &Rc<dyn NativeBackend>, call: NativeCall) -> Result<CallReply> {
        let reply = match call {
            NativeCall::Close => {
                // Dropping the backend releases the dlopen mapping once the
                // replay loop lets go of its clone.
                *self.shared.state.borrow_mut() = LibraryState::Closed;
                CallReply::Unit
            }
            NativeCall::Create { debug, window } => {
                CallReply::Webview(backend.create(debug, window))
            }
            NativeCall::Destroy { webview } => {
                backend.destroy(webview);
                CallReply::Unit
            }
            NativeCall::Run { webview } => {
                backend.run(webview);
                CallReply::Unit
            }
            NativeCall::Terminate { webview } => {
                backend.terminate(webview);
                CallReply::Unit
            }
            NativeCall::GetWindow { webview } => CallReply::Window(backend.get_window(webview)),
            NativeCall::SetTitle { webview, title } => {
                backend.set_title(webview, &title);
                CallReply::Unit
            }
            NativeCall::SetSize { webview, width, height, hint } => {
                backend.set_size(webview, width, height, hint);
                CallReply::Unit
            }
            NativeCall::Navigate { webview, url } => {
                backend.navigate(webview, &url);
                CallReply::Unit
            }
            NativeCall::SetHtml { webview, html } => {
                backend.set_html(webview, &html);
                CallReply::Unit
            }
            NativeCall::Init { webview, js } => {
                backend.init(webview, &js);
                CallReply::Unit
            }
            NativeCall::Eval { webview, js } => {
                backend.eval(webview, &js);
                CallReply::Unit
            }
            NativeCall::Bind { webview, name, trampoline, arg } => {
                backend.bind(webview, &name, trampoline, arg);
                CallReply::Unit
            }
            NativeCall::Unbind { webview, name } => {
                backend.unbind(webview, &name);
                CallReply::Unit
            }
            NativeCall::Return { webview, seq, status, result } => {
                backend.ret(webview, &seq, status, &result);
                CallReply::Unit
            }
        };
        Ok(reply)
    }

    /// Issue a call whose reply carries no value.
    pub(crate) fn unit_call(&self, call: NativeCall) -> impl Future<Output = Result<()>> {
        let rx = self.call(call);
        async move {
            await_reply(rx).await?;
            Ok(())
        }
    }

    /// `webview_create`: resolves with the new window handle.
    pub(crate) fn create(
        &self,
        debug: bool,
        window: *mut c_void,
    ) -> impl Future<Output = Result<RawWebview>> {
        let rx = self.call(NativeCall::Create { debug, window });
        async move {
            match await_reply(rx).await? {
                CallReply::Webview(webview) => Ok(webview),
                _ => Err(Error::UnexpectedReply),
            }
        }
    }

    /// `webview_get_window`: resolves with the platform window pointer.
    pub(crate) fn get_window(
        &self,
        webview: RawWebview,
    ) -> impl Future<Output = Result<RawWindow>> {
        let rx = self.call(NativeCall::GetWindow { webview });
        async move {
            match await_reply(rx).await? {
                CallReply::Window(window) => Ok(window),
                _ => Err(Error::UnexpectedReply),
            }
        }
    }
}

async fn await_reply(rx: ReplyRx) -> Result<CallReply> {
    // The sender only disappears when the library (and its queue) is gone.
    rx.await.unwrap_or(Err(Error::LibraryClosed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordedCall, Recorder};
    use std::ptr;
    use std::time::Duration;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn fake_webview() -> RawWebview {
        0x1000 as RawWebview
    }

    #[tokio::test]
    async fn test_queued_calls_replay_in_issue_order() {
        let recorder = Recorder::new();
        let lib = WebviewLibrary::load_never();
        let w = fake_webview();

        let _nav = lib.call(NativeCall::Navigate { webview: w, url: cstr("https://a.example") });
        let _title = lib.call(NativeCall::SetTitle { webview: w, title: cstr("first") });
        let _html = lib.call(NativeCall::SetHtml { webview: w, html: cstr("<p>hi</p>") });
        assert!(recorder.calls().is_empty());

        lib.go_live(recorder.backend());

        assert_eq!(
            recorder.calls(),
            vec![
                RecordedCall::Navigate("https://a.example".into()),
                RecordedCall::SetTitle("first".into()),
                RecordedCall::SetHtml("<p>hi</p>".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_settles_original_futures_with_real_results() {
        let recorder = Recorder::new();
        let lib = WebviewLibrary::load_never();

        let create = lib.create(false, ptr::null_mut());
        lib.go_live(recorder.backend());

        let handle = create.await.unwrap();
        assert_eq!(handle, recorder.last_created_handle().unwrap());
    }

    #[tokio::test]
    async fn test_live_calls_dispatch_immediately() {
        let recorder = Recorder::new();
        let lib = WebviewLibrary::with_backend(recorder.backend());

        let handle = lib.create(true, ptr::null_mut()).await.unwrap();
        lib.unit_call(NativeCall::Eval { webview: handle, js: cstr("1+1") })
            .await
            .unwrap();

        assert_eq!(
            recorder.calls(),
            vec![RecordedCall::Create { debug: true }, RecordedCall::Eval("1+1".into())]
        );
    }

    #[tokio::test]
    async fn test_calls_never_settle_without_a_backend() {
        let lib = WebviewLibrary::load_never();
        let create = lib.create(false, ptr::null_mut());

        let settled = tokio::time::timeout(Duration::from_millis(50), create).await;
        assert!(settled.is_err(), "call settled with no library loaded");
    }

    #[tokio::test]
    async fn test_calls_after_queued_close_settle_closed() {
        let recorder = Recorder::new();
        let lib = WebviewLibrary::load_never();
        let w = fake_webview();

        let before = lib.unit_call(NativeCall::Navigate { webview: w, url: cstr("https://a.example") });
        let close = lib.unit_call(NativeCall::Close);
        let after = lib.unit_call(NativeCall::Navigate { webview: w, url: cstr("https://b.example") });

        lib.go_live(recorder.backend());

        before.await.unwrap();
        close.await.unwrap();
        assert!(matches!(after.await, Err(Error::LibraryClosed)));

        // Only the pre-close navigate reached the backend, and the backend
        // itself was dropped exactly once.
        assert_eq!(
            recorder.calls(),
            vec![RecordedCall::Navigate("https://a.example".into()), RecordedCall::Close]
        );
    }

    #[tokio::test]
    async fn test_calls_after_live_close_settle_closed() {
        let recorder = Recorder::new();
        let lib = WebviewLibrary::with_backend(recorder.backend());

        lib.unit_call(NativeCall::Close).await.unwrap();
        assert!(!lib.is_live());

        let err = lib.create(false, ptr::null_mut()).await.unwrap_err();
        assert!(matches!(err, Error::LibraryClosed));
    }

    #[tokio::test]
    async fn test_go_live_twice_is_ignored() {
        let first = Recorder::new();
        let second = Recorder::new();
        let lib = WebviewLibrary::load_never();

        lib.go_live(first.backend());
        lib.go_live(second.backend());

        let w = fake_webview();
        lib.unit_call(NativeCall::Eval { webview: w, js: cstr("x") }).await.unwrap();

        assert_eq!(first.calls(), vec![RecordedCall::Eval("x".into())]);
        // The rejected backend saw nothing but its own drop.
        assert_eq!(second.calls(), vec![RecordedCall::Close]);
    }
}

#[cfg(test)]
impl WebviewLibrary {
    /// A library that never resolves: queuing mode with no loader task.
    pub(crate) fn load_never() -> Self {
        Self::new_queuing()
    }
}
