//! Ergonomic bindings to the webview native library
//!
//! The webview shared library is opened at runtime, so nothing here blocks on
//! it being present: a [`WebviewLibrary`] accepts calls from the moment it is
//! constructed, queues them while the artifact loads, and replays them in
//! issue order once the symbol table resolves. A [`Webview`] adds its own
//! gate on top: operations issued before the native window handle exists are
//! queued and flushed, in order, the moment `webview_create` resolves.
//!
//! Background completion (library loading, handle resolution, deferred bind
//! results) runs on `tokio::task::spawn_local`, so construct libraries and
//! webviews inside a [`tokio::task::LocalSet`] on a current-thread runtime.
//!
//! # Example
//!
//! ```no_run
//! use tokio::task::LocalSet;
//! use webview_dyn::{BindOutcome, Size, SizeHint, Webview, WebviewLibrary};
//!
//! fn main() -> webview_dyn::Result<()> {
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()
//!         .expect("tokio runtime");
//!     let local = LocalSet::new();
//!     local.block_on(&runtime, async {
//!         let lib = WebviewLibrary::load();
//!         let webview = Webview::new(&lib, true);
//!
//!         webview.set_title("Hello")?;
//!         webview.set_size(Size { width: 480, height: 320, hint: SizeHint::Fixed });
//!         webview.bind("add", |args| {
//!             let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
//!             BindOutcome::resolve(sum)
//!         })?;
//!         webview.navigate("https://example.com")?;
//!
//!         // Blocks until the window closes, then tears the webview down.
//!         webview.run();
//!         Ok(())
//!     })
//! }
//! ```

mod backend;
mod bind;
mod error;
mod library;
mod platform;
mod webview;

#[cfg(test)]
mod testutil;

pub use backend::{BindTrampoline, NativeBackend, RawWebview, RawWindow};
pub use bind::{BindOutcome, BindStatus};
pub use error::{Error, Result};
pub use library::WebviewLibrary;
pub use platform::{resolve_library_path, WEBVIEW_PATH_ENV};
pub use webview::{Size, SizeHint, Webview};

// Re-export the raw FFI surface for callers that need the symbol table.
pub use webview_dyn_sys as sys;
