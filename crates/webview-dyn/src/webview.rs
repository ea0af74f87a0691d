//! Window sessions
//!
//! `Webview` represents one logical window. Its native handle arrives
//! asynchronously from `webview_create`, so every window-mutating operation
//! passes through a ready gate: with the handle present the action runs
//! synchronously in the calling context, otherwise it is queued and flushed
//! in FIFO order the moment the handle resolves.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_int, CString};
use std::mem;
use std::ptr;
use std::rc::Rc;

use log::{debug, warn};

use webview_dyn_sys as sys;

use crate::backend::{RawWebview, RawWindow};
use crate::bind::BindSlot;
use crate::error::{Error, Result};
use crate::library::{NativeCall, WebviewLibrary};

/// Window size hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeHint {
    /// Width and height are default size
    #[default]
    None,
    /// Width and height are minimum bounds
    Min,
    /// Width and height are maximum bounds
    Max,
    /// Window size can not be changed by a user
    Fixed,
}

impl SizeHint {
    pub(crate) fn code(self) -> c_int {
        match self {
            SizeHint::None => sys::WEBVIEW_HINT_NONE,
            SizeHint::Min => sys::WEBVIEW_HINT_MIN,
            SizeHint::Max => sys::WEBVIEW_HINT_MAX,
            SizeHint::Fixed => sys::WEBVIEW_HINT_FIXED,
        }
    }
}

/// Window size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
    pub hint: SizeHint,
}

impl Default for Size {
    fn default() -> Self {
        Self { width: 1024, height: 768, hint: SizeHint::None }
    }
}

type ReadyAction = Box<dyn FnOnce(&Webview, RawWebview)>;

/// State shared by all clones of one window session
pub(crate) struct SessionShared {
    handle: Cell<Option<RawWebview>>,
    /// Bound-function slots; the native side holds only their addresses
    /// between bind and unbind/destroy, and the trampoline pins the invoked
    /// slot for the duration of each callback frame
    pub(crate) bindings: RefCell<HashMap<String, Rc<BindSlot>>>,
    ready_queue: RefCell<Vec<ReadyAction>>,
}

/// A webview window.
///
/// Cheap to clone; clones share the same window. Operations issued before
/// the native handle resolves are queued and run in issue order once it does.
#[derive(Clone)]
pub struct Webview {
    shared: Rc<SessionShared>,
    lib: WebviewLibrary,
}

impl Webview {
    /// Create a window with the default 1024x768 size and no size hint.
    ///
    /// `debug` enables developer tools on supported platforms. Must be
    /// called inside a tokio `LocalSet`.
    pub fn new(lib: &WebviewLibrary, debug: bool) -> Self {
        Self::create(lib, debug, Some(Size::default()), None)
    }

    /// Create a window.
    ///
    /// The native create call is issued immediately (and possibly queued by
    /// the library's own load gate). `size`, when given, is applied through
    /// the ready gate right after construction; pass `None` to keep the
    /// platform default. A non-null `parent` embeds the webview into that
    /// platform window instead of creating a new one.
    pub fn create(
        lib: &WebviewLibrary,
        debug: bool,
        size: Option<Size>,
        parent: Option<RawWindow>,
    ) -> Self {
        let webview = Self {
            shared: Rc::new(SessionShared {
                handle: Cell::new(None),
                bindings: RefCell::new(HashMap::new()),
                ready_queue: RefCell::new(Vec::new()),
            }),
            lib: lib.clone(),
        };
        lib.register_session(Rc::downgrade(&webview.shared));

        let created = lib.create(debug, parent.unwrap_or(ptr::null_mut()));
        let resolver = webview.clone();
        tokio::task::spawn_local(async move {
            match created.await {
                Ok(handle) => resolver.resolve_handle(handle),
                Err(err) => warn!("webview_create failed: {err}"),
            }
        });

        if let Some(size) = size {
            webview.set_size(size);
        }
        webview
    }

    /// Wrap an existing native handle; the ready gate is open from the start.
    ///
    /// # Safety
    ///
    /// The caller must ensure `handle` is a live webview created by the same
    /// library and not owned by another session.
    pub unsafe fn from_raw(lib: &WebviewLibrary, handle: RawWebview) -> Self {
        let webview = Self {
            shared: Rc::new(SessionShared {
                handle: Cell::new(Some(handle)),
                bindings: RefCell::new(HashMap::new()),
                ready_queue: RefCell::new(Vec::new()),
            }),
            lib: lib.clone(),
        };
        lib.register_session(Rc::downgrade(&webview.shared));
        webview
    }

    pub(crate) fn from_shared(shared: Rc<SessionShared>, lib: WebviewLibrary) -> Self {
        Self { shared, lib }
    }

    /// The raw native handle, if it has resolved.
    ///
    /// Anything done with it bypasses this session's sequencing guarantees.
    pub fn raw_handle(&self) -> Option<RawWebview> {
        self.shared.handle.get()
    }

    /// The platform window pointer backing this webview (`GtkWindow`,
    /// `NSWindow` or `HWND` depending on the backend).
    pub async fn native_window(&self) -> Result<RawWindow> {
        let handle = self.shared.handle.get().ok_or(Error::NotReady)?;
        self.lib.get_window(handle).await
    }

    // ========== Ready gate ==========

    /// Run `action` now if the handle is present, otherwise queue it.
    pub(crate) fn when_ready(&self, action: impl FnOnce(&Webview, RawWebview) + 'static) {
        if let Some(handle) = self.shared.handle.get() {
            action(self, handle);
        } else {
            self.shared.ready_queue.borrow_mut().push(Box::new(action));
        }
    }

    /// Store the handle, then flush the queue exactly once, in FIFO order.
    /// The handle is set first so an action that re-enters the gate runs
    /// immediately instead of re-queuing into the drained buffer.
    fn resolve_handle(&self, handle: RawWebview) {
        self.shared.handle.set(Some(handle));
        let queued = mem::take(&mut *self.shared.ready_queue.borrow_mut());
        if !queued.is_empty() {
            debug!("webview ready; running {} queued actions", queued.len());
        }
        for action in queued {
            action(self, handle);
        }
    }

    // ========== Gated operations ==========

    /// Navigate to the given URL (data URIs work too).
    pub fn navigate(&self, url: &str) -> Result<()> {
        let url = CString::new(url)?;
        self.when_ready(move |wv, handle| {
            let _ = wv.lib.unit_call(NativeCall::Navigate { webview: handle, url });
        });
        Ok(())
    }

    /// Replace the current document with the given HTML.
    pub fn set_html(&self, html: &str) -> Result<()> {
        let html = CString::new(html)?;
        self.when_ready(move |wv, handle| {
            let _ = wv.lib.unit_call(NativeCall::SetHtml { webview: handle, html });
        });
        Ok(())
    }

    /// Set the native window title.
    pub fn set_title(&self, title: &str) -> Result<()> {
        let title = CString::new(title)?;
        self.when_ready(move |wv, handle| {
            let _ = wv.lib.unit_call(NativeCall::SetTitle { webview: handle, title });
        });
        Ok(())
    }

    /// Set the native window size according to the hint.
    pub fn set_size(&self, size: Size) {
        self.when_ready(move |wv, handle| {
            let _ = wv.lib.unit_call(NativeCall::SetSize {
                webview: handle,
                width: size.width,
                height: size.height,
                hint: size.hint.code(),
            });
        });
    }

    /// Run the native event loop until it terminates, then destroy the
    /// webview. Blocks the calling thread for the lifetime of the window once
    /// the library is live; do not expect a prompt return.
    pub fn run(&self) {
        self.when_ready(|wv, handle| {
            let _ = wv.lib.unit_call(NativeCall::Run { webview: handle });
            wv.destroy();
        });
    }

    /// Unbind every bound function, close the window and free the native
    /// resources. Safe to call more than once: after the handle is cleared
    /// the protocol sees a no-op.
    pub fn destroy(&self) {
        self.when_ready(|wv, handle| {
            let names: Vec<String> = wv.shared.bindings.borrow().keys().cloned().collect();
            for name in names {
                if let Err(err) = wv.unbind(&name) {
                    warn!("unbind of {name} during destroy failed: {err}");
                }
            }
            let _ = wv.lib.unit_call(NativeCall::Terminate { webview: handle });
            let _ = wv.lib.unit_call(NativeCall::Destroy { webview: handle });
            wv.shared.handle.set(None);
        });
    }

    // ========== Handle-required operations ==========
    //
    // These do not pass through the ready gate; callers must only use them
    // once the session is known ready (`eval`/`init`) or from inside a
    // dispatched bound-callback frame (`ret`).

    /// Evaluate JavaScript asynchronously; the result is discarded. Use
    /// bindings to get values back.
    pub fn eval(&self, js: &str) -> Result<()> {
        let handle = self.shared.handle.get().ok_or(Error::NotReady)?;
        let js = CString::new(js)?;
        let _ = self.lib.unit_call(NativeCall::Eval { webview: handle, js });
        Ok(())
    }

    /// Inject JavaScript evaluated on every new page before `window.onload`.
    pub fn init(&self, js: &str) -> Result<()> {
        let handle = self.shared.handle.get().ok_or(Error::NotReady)?;
        let js = CString::new(js)?;
        let _ = self.lib.unit_call(NativeCall::Init { webview: handle, js });
        Ok(())
    }

    pub(crate) fn library(&self) -> &WebviewLibrary {
        &self.lib
    }

    pub(crate) fn shared(&self) -> &Rc<SessionShared> {
        &self.shared
    }

    pub(crate) fn handle_or_not_ready(&self) -> Result<RawWebview> {
        self.shared.handle.get().ok_or(Error::NotReady)
    }
}
