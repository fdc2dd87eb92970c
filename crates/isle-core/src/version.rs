use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header value sent with bundles when a build stamp pins the content.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Header value sent with bundles in development (no build stamp).
pub const NO_CACHE: &str = "no-cache";

/// Content type of every bundle the service returns.
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript";

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("isle {VERSION}");

    if let Some(hash) = option_env!("ISLE_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}
