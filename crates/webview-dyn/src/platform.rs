//! Native artifact resolution
//!
//! Picks the shared-library file for the current platform, or honors an
//! explicit override. This is deliberately thin glue: when nothing resolves
//! the deferred interface simply never goes live.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the library artifact path
pub const WEBVIEW_PATH_ENV: &str = "WEBVIEW_PATH";

/// Directory searched for bundled artifacts, relative to the working directory
const ARTIFACT_DIR: &str = "build";

/// Resolve the webview library artifact for the current platform.
///
/// The `WEBVIEW_PATH` environment variable wins. Otherwise the bundled
/// artifact name is derived from the OS (and, on Linux, the architecture).
/// Returns `None` on platforms with no known artifact.
pub fn resolve_library_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(WEBVIEW_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let file = match env::consts::OS {
        "windows" => "libwebview.dll".to_string(),
        "macos" => "libwebview.dylib".to_string(),
        "linux" => format!("libwebview-{}.so", env::consts::ARCH),
        _ => return None,
    };

    Some(PathBuf::from(ARTIFACT_DIR).join(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the override and the fallback share one env var, and
    // parallel tests mutating it would race.
    #[test]
    fn test_resolution_order() {
        env::set_var(WEBVIEW_PATH_ENV, "/tmp/custom-webview.so");
        assert_eq!(
            resolve_library_path(),
            Some(PathBuf::from("/tmp/custom-webview.so"))
        );
        env::remove_var(WEBVIEW_PATH_ENV);

        #[cfg(target_os = "linux")]
        {
            let path = resolve_library_path().unwrap();
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("libwebview-"));
            assert!(name.ends_with(".so"));
            assert!(name.contains(env::consts::ARCH));
        }
    }
}
