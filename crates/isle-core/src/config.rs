use crate::cache::EvictionPolicy;
use crate::paths::normalize_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the build stamp.
pub const BUILD_STAMP_ENV: &str = "ISLE_BUILD_SHA";

/// Commit hash exported by the deployment platform; used when
/// [`BUILD_STAMP_ENV`] is unset.
pub const PLATFORM_BUILD_STAMP_ENV: &str = "RAILWAY_GIT_COMMIT_SHA";

/// Runtime configuration for the island server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Working root. Sources and `package.json` are resolved against it.
    pub cwd: PathBuf,

    /// Directory `~/` specifiers point at, relative to `cwd` unless absolute.
    pub app_dir: PathBuf,

    /// Directories the script endpoint may serve from, relative to `cwd` unless absolute.
    pub allowed_dirs: Vec<PathBuf>,

    /// URL path of the script endpoint.
    pub endpoint: String,

    /// CDN origin bare imports are rewritten to.
    pub cdn_host: String,

    /// Package name of the UI runtime (hydration entry point and compat shim).
    pub runtime_package: String,

    /// Opaque identifier of the deployed build, if any.
    pub build_stamp: Option<String>,

    /// Eviction policy for the bundle cache.
    pub cache_policy: EvictionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            app_dir: PathBuf::from("app"),
            allowed_dirs: vec![PathBuf::from("app").join("islands")],
            endpoint: "/_script".to_string(),
            cdn_host: "https://esm.sh".to_string(),
            runtime_package: "preact".to_string(),
            build_stamp: None,
            cache_policy: EvictionPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set the app directory used for `~/` specifiers.
    #[must_use]
    pub fn with_app_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_dir = dir.into();
        self
    }

    /// Replace the allow-listed directories.
    #[must_use]
    pub fn with_allowed_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.allowed_dirs = dirs;
        self
    }

    /// Set the script endpoint path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the CDN origin. A trailing slash is dropped.
    #[must_use]
    pub fn with_cdn_host(mut self, host: impl Into<String>) -> Self {
        self.cdn_host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the UI runtime package.
    #[must_use]
    pub fn with_runtime_package(mut self, package: impl Into<String>) -> Self {
        self.runtime_package = package.into();
        self
    }

    /// Set the build stamp. Empty stamps are treated as absent.
    #[must_use]
    pub fn with_build_stamp(mut self, stamp: Option<String>) -> Self {
        self.build_stamp = stamp.filter(|s| !s.trim().is_empty());
        self
    }

    /// Set the cache eviction policy.
    #[must_use]
    pub fn with_cache_policy(mut self, policy: EvictionPolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Absolute, normalized app directory.
    #[must_use]
    pub fn app_root(&self) -> PathBuf {
        normalize_path(&self.cwd.join(&self.app_dir))
    }

    /// Absolute, normalized allow-listed roots.
    #[must_use]
    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        self.allowed_dirs
            .iter()
            .map(|dir| normalize_path(&self.cwd.join(dir)))
            .collect()
    }

    /// Path of the project manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.cwd.join("package.json")
    }
}

/// Read the build stamp from the environment.
///
/// [`BUILD_STAMP_ENV`] wins over [`PLATFORM_BUILD_STAMP_ENV`]; empty values are ignored.
#[must_use]
pub fn build_stamp_from_env() -> Option<String> {
    [BUILD_STAMP_ENV, PLATFORM_BUILD_STAMP_ENV]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_roots_are_absolute() {
        let config = ServerConfig::new(PathBuf::from("/project"));
        assert_eq!(config.app_root(), PathBuf::from("/project/app"));
        assert_eq!(
            config.allowed_roots(),
            vec![PathBuf::from("/project/app/islands")]
        );
    }

    #[test]
    fn test_empty_build_stamp_is_absent() {
        let config = ServerConfig::default().with_build_stamp(Some("  ".to_string()));
        assert!(config.build_stamp.is_none());

        let config = ServerConfig::default().with_build_stamp(Some("abc123".to_string()));
        assert_eq!(config.build_stamp.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cdn_host_trailing_slash() {
        let config = ServerConfig::default().with_cdn_host("https://cdn.example/");
        assert_eq!(config.cdn_host, "https://cdn.example");
    }

    #[test]
    #[serial]
    fn test_build_stamp_env_precedence() {
        std::env::set_var(PLATFORM_BUILD_STAMP_ENV, "platform");
        std::env::remove_var(BUILD_STAMP_ENV);
        assert_eq!(build_stamp_from_env().as_deref(), Some("platform"));

        std::env::set_var(BUILD_STAMP_ENV, "explicit");
        assert_eq!(build_stamp_from_env().as_deref(), Some("explicit"));

        std::env::set_var(BUILD_STAMP_ENV, "");
        assert_eq!(build_stamp_from_env().as_deref(), Some("platform"));

        std::env::remove_var(BUILD_STAMP_ENV);
        std::env::remove_var(PLATFORM_BUILD_STAMP_ENV);
        assert_eq!(build_stamp_from_env(), None);
    }
}
