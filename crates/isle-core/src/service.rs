//! The script endpoint: request → validated path → cached or freshly built module.

use crate::cache::BundleCache;
use crate::config::ServerConfig;
use crate::endpoint::ScriptEndpoint;
use crate::engine::{BuildOptions, BundlerEngine, SwcEngine};
use crate::error::Error;
use crate::manifest::{DependencyManifest, RuntimePackage};
use crate::paths::{resolve_source, AllowList};
use crate::resolve::{CdnAliasHook, OnDemandHook, ResolverChain};
use crate::version::{IMMUTABLE_CACHE_CONTROL, JAVASCRIPT_CONTENT_TYPE, NO_CACHE};
use bytes::Bytes;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Query parameters of a script request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptQuery {
    pub source: Option<String>,
    /// Build stamp echoed by generated URLs. Only busts browser caches.
    pub sha: Option<String>,
}

impl ScriptQuery {
    #[must_use]
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            sha: None,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ServedScript {
    pub body: Bytes,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

/// Why a request was refused. Messages are safe to send to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServeError {
    #[error("No source provided")]
    MissingSource,

    #[error("Invalid source")]
    InvalidSource,

    #[error("Source not allowed")]
    NotAllowed,

    /// The entry or one of its imports is not servable.
    #[error("Could not resolve source")]
    Rejected,

    #[error("No output file")]
    BuildFailed,
}

impl ServeError {
    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::BuildFailed => 500,
            _ => 400,
        }
    }
}

/// Bundling service shared by every request.
pub struct ScriptService {
    config: ServerConfig,
    allow: AllowList,
    cache: Arc<BundleCache>,
    engine: Arc<dyn BundlerEngine>,
    resolvers: ResolverChain,
}

impl ScriptService {
    /// Load `package.json` from the configured cwd and use the swc engine.
    pub fn load(config: ServerConfig) -> Result<Self, Error> {
        let manifest = DependencyManifest::load(&config.manifest_path())?;
        Self::new(config, Arc::new(manifest), Arc::new(SwcEngine::new()))
    }

    /// Build a service around an explicit manifest and engine.
    ///
    /// Fails if the runtime package is not a declared dependency.
    pub fn new(
        config: ServerConfig,
        manifest: Arc<DependencyManifest>,
        engine: Arc<dyn BundlerEngine>,
    ) -> Result<Self, Error> {
        let runtime = manifest.runtime(&config.runtime_package)?;
        let resolvers = standard_resolvers(&config, manifest, runtime);
        let cache = Arc::new(BundleCache::new(config.cache_policy));
        let allow = AllowList::new(config.allowed_roots());

        debug!(
            engine = engine.name(),
            hooks = ?resolvers,
            roots = ?allow.roots(),
            "script service ready"
        );

        Ok(Self {
            config,
            allow,
            cache,
            engine,
            resolvers,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<BundleCache> {
        &self.cache
    }

    #[must_use]
    pub fn endpoint(&self) -> ScriptEndpoint {
        ScriptEndpoint::new(self.config.endpoint.clone())
    }

    /// Answer one script request.
    pub fn serve(&self, query: &ScriptQuery) -> Result<ServedScript, ServeError> {
        let source = query
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ServeError::MissingSource)?;

        let path = resolve_source(&self.config.cwd, &self.config.app_root(), source)
            .ok_or(ServeError::InvalidSource)?;

        if let Some(body) = self.cache.get(&path) {
            debug!(path = %path.display(), "cache hit");
            return Ok(self.respond(body));
        }

        if !self.allow.contains(&path) || !self.allow.contains_real(&path) {
            warn!(source, path = %path.display(), "source outside allowed directories");
            return Err(ServeError::NotAllowed);
        }

        let body = self.build(&path)?;
        self.cache.insert(path, body.clone());
        Ok(self.respond(body))
    }

    fn build(&self, path: &Path) -> Result<Bytes, ServeError> {
        let options = BuildOptions::for_entry(path.to_path_buf(), &self.config.runtime_package);
        let result = self.engine.build(&options, &self.resolvers);

        if let Some(output) = result.output_for(path) {
            info!(path = %path.display(), bytes = output.contents.len(), "built module");
            return Ok(output.contents.clone());
        }

        for diagnostic in &result.errors {
            error!(path = %path.display(), kind = ?diagnostic.kind, "{diagnostic}");
        }

        if result.errors.iter().any(|d| d.kind.is_client_error()) {
            Err(ServeError::Rejected)
        } else {
            Err(ServeError::BuildFailed)
        }
    }

    fn respond(&self, body: Bytes) -> ServedScript {
        let cache_control = if self.config.build_stamp.is_some() {
            IMMUTABLE_CACHE_CONTROL
        } else {
            NO_CACHE
        };
        ServedScript {
            body,
            content_type: JAVASCRIPT_CONTENT_TYPE,
            cache_control,
        }
    }
}

impl std::fmt::Debug for ScriptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptService")
            .field("config", &self.config)
            .field("engine", &self.engine.name())
            .field("resolvers", &self.resolvers)
            .finish_non_exhaustive()
    }
}

/// CDN aliasing first, then on-demand local imports.
fn standard_resolvers(
    config: &ServerConfig,
    manifest: Arc<DependencyManifest>,
    runtime: RuntimePackage,
) -> ResolverChain {
    ResolverChain::new()
        .with(CdnAliasHook::new(config.cdn_host.clone(), manifest, runtime))
        .with(OnDemandHook::new(
            config.cwd.clone(),
            config.app_root(),
            ScriptEndpoint::new(config.endpoint.clone()),
            config.build_stamp.clone(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BuildResult, Diagnostic, DiagnosticKind, OutputFile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    /// Echoes the entry path and counts invocations.
    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
        fail_with: Option<DiagnosticKind>,
    }

    impl BundlerEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn build(&self, options: &BuildOptions, resolvers: &ResolverChain) -> BuildResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                resolvers.hook_names().collect::<Vec<_>>(),
                ["cdn-alias", "on-demand"]
            );
            if let Some(kind) = self.fail_with {
                return BuildResult::failed(Diagnostic::new(kind, "nope"));
            }
            BuildResult {
                output_files: vec![OutputFile {
                    path: options.entry.clone(),
                    contents: Bytes::from(format!(
                        "export default {:?};",
                        options.entry.display().to_string()
                    )),
                }],
                errors: Vec::new(),
            }
        }
    }

    fn project() -> TempDir {
        let dir = tempdir().unwrap();
        let islands = dir.path().join("app").join("islands");
        std::fs::create_dir_all(&islands).unwrap();
        std::fs::write(islands.join("counter.tsx"), "export default 1;").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        dir
    }

    fn service(dir: &TempDir, stamp: Option<&str>, engine: Arc<CountingEngine>) -> ScriptService {
        let config = ServerConfig::new(dir.path().to_path_buf())
            .with_build_stamp(stamp.map(str::to_string));
        let manifest = Arc::new(DependencyManifest::from_entries([("preact", "^10.19.2")]));
        ScriptService::new(config, manifest, engine).unwrap()
    }

    #[test]
    fn test_second_request_is_cached() {
        let dir = project();
        let engine = Arc::new(CountingEngine::default());
        let service = service(&dir, None, engine.clone());

        let first = service.serve(&ScriptQuery::source("app/islands/counter")).unwrap();
        let second = service.serve(&ScriptQuery::source("~/islands/counter")).unwrap();

        assert_eq!(first.body, second.body);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.content_type, "application/javascript");
    }

    #[test]
    fn test_missing_and_invalid_source() {
        let dir = project();
        let service = service(&dir, None, Arc::new(CountingEngine::default()));

        assert_eq!(
            service.serve(&ScriptQuery::default()).unwrap_err(),
            ServeError::MissingSource
        );
        assert_eq!(
            service.serve(&ScriptQuery::source("")).unwrap_err(),
            ServeError::MissingSource
        );
        assert_eq!(
            service.serve(&ScriptQuery::source("app/\0x")).unwrap_err(),
            ServeError::InvalidSource
        );
    }

    #[test]
    fn test_outside_allowed_roots_is_rejected() {
        let dir = project();
        let engine = Arc::new(CountingEngine::default());
        let service = service(&dir, None, engine.clone());

        for source in [
            "package.json",
            "app/islands/../../package.json",
            "~/../package.json",
            "/etc/passwd",
        ] {
            let err = service.serve(&ScriptQuery::source(source)).unwrap_err();
            assert_eq!(err, ServeError::NotAllowed, "{source}");
            assert_eq!(err.status(), 400);
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let dir = project();
        std::fs::write(dir.path().join("secret.js"), "export default 'x';").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("secret.js"),
            dir.path().join("app/islands/secret.js"),
        )
        .unwrap();
        let service = service(&dir, None, Arc::new(CountingEngine::default()));

        assert_eq!(
            service.serve(&ScriptQuery::source("app/islands/secret")).unwrap_err(),
            ServeError::NotAllowed
        );
    }

    #[test]
    fn test_cache_control_follows_build_stamp() {
        let dir = project();
        let stamped = service(&dir, Some("abc123"), Arc::new(CountingEngine::default()));
        let unstamped = service(&dir, None, Arc::new(CountingEngine::default()));
        let query = ScriptQuery::source("app/islands/counter");

        assert_eq!(
            stamped.serve(&query).unwrap().cache_control,
            "public, max-age=31536000, immutable"
        );
        assert_eq!(unstamped.serve(&query).unwrap().cache_control, "no-cache");
    }

    #[test]
    fn test_build_failures_map_to_status() {
        let dir = project();
        let query = ScriptQuery::source("app/islands/counter");

        let undeclared = service(
            &dir,
            None,
            Arc::new(CountingEngine {
                fail_with: Some(DiagnosticKind::UndeclaredDependency),
                ..Default::default()
            }),
        );
        let err = undeclared.serve(&query).unwrap_err();
        assert_eq!(err, ServeError::BuildFailed);
        assert_eq!(err.status(), 500);
        assert!(undeclared.cache().is_empty());

        let unsupported = service(
            &dir,
            None,
            Arc::new(CountingEngine {
                fail_with: Some(DiagnosticKind::UnsupportedImport),
                ..Default::default()
            }),
        );
        assert_eq!(unsupported.serve(&query).unwrap_err(), ServeError::Rejected);
    }

    #[test]
    fn test_runtime_must_be_declared() {
        let dir = project();
        let config = ServerConfig::new(dir.path().to_path_buf());
        let manifest = Arc::new(DependencyManifest::from_entries([("react", "18.2.0")]));
        let err = ScriptService::new(config, manifest, Arc::new(SwcEngine::new())).unwrap_err();
        assert!(matches!(err, Error::RuntimeNotDeclared { .. }));
    }

    #[test]
    fn test_concurrent_cold_requests_agree() {
        let dir = project();
        let service = Arc::new(service(&dir, None, Arc::new(CountingEngine::default())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    service
                        .serve(&ScriptQuery::source("app/islands/counter"))
                        .unwrap()
                        .body
                })
            })
            .collect();

        let bodies: Vec<Bytes> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(service.cache().len(), 1);
    }
}
