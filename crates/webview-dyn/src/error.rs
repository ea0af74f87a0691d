//! Error types for webview-dyn

use thiserror::Error;

/// Errors that can occur when driving a webview
#[derive(Error, Debug)]
pub enum Error {
    /// The operation needs the native window handle, which has not resolved yet
    #[error("webview handle is not ready yet")]
    NotReady,

    /// The native library has been closed by a global unload
    #[error("native library has been closed")]
    LibraryClosed,

    /// A native call settled with a reply of the wrong shape
    #[error("native call produced an unexpected reply")]
    UnexpectedReply,

    /// A string argument contains an interior nul byte and cannot cross the C boundary
    #[error("string argument contains an interior nul byte: {0}")]
    InvalidString(#[from] std::ffi::NulError),
}

/// Result type alias for webview-dyn operations
pub type Result<T> = std::result::Result<T, Error>;
