//! Import resolution hooks.
//!
//! Every import specifier the engine meets is offered to an ordered chain of
//! [`ResolveHook`]s. The first hook that returns `Some` decides the import;
//! an error from any hook fails the whole build.
//!
//! ## Example
//!
//! ```ignore
//! use isle_core::resolve::{ImportContext, ResolveHook, ResolveIdResult, HookResult};
//!
//! struct PinnedCdn;
//!
//! impl ResolveHook for PinnedCdn {
//!     fn name(&self) -> &'static str { "pinned-cdn" }
//!
//!     fn resolve_id(&self, specifier: &str, _ctx: &ImportContext<'_>) -> HookResult<Option<ResolveIdResult>> {
//!         if specifier == "confetti" {
//!             return Ok(Some(ResolveIdResult::external("https://cdn.example/confetti@1.0.0")));
//!         }
//!         Ok(None)
//!     }
//! }
//! ```

mod cdn;
mod on_demand;

pub use cdn::{CdnAliasHook, REACT_PACKAGES};
pub use on_demand::OnDemandHook;

use std::path::Path;
use thiserror::Error;

/// Result type for resolve hooks.
pub type HookResult<T> = Result<T, ResolveError>;

/// How an import was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// The module being bundled itself.
    EntryPoint,
    /// `import x from '...'`, `import '...'`
    Static,
    /// `import('...')`
    Dynamic,
    /// `export ... from '...'`
    ReExport,
}

/// Where an import was found.
#[derive(Debug, Clone, Copy)]
pub struct ImportContext<'a> {
    /// Directory relative specifiers are resolved against.
    pub resolve_dir: &'a Path,
    pub kind: ImportKind,
}

/// Result of a resolve hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveIdResult {
    /// Resolved module ID: a file path, or a URL for external modules.
    pub id: String,
    /// Whether the import is left for the browser to fetch.
    pub external: bool,
}

impl ResolveIdResult {
    /// Create an external module result.
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
        }
    }
}

/// Why a hook refused an import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A bare import whose package is missing from the manifest.
    #[error("Could not resolve \"{specifier}\": package \"{package}\" is not a declared dependency")]
    UndeclaredDependency { specifier: String, package: String },

    /// An import form the service cannot serve (absolute paths).
    #[error("Cannot resolve \"{specifier}\"")]
    Unsupported { specifier: String },
}

impl ResolveError {
    /// Additional guidance for the log line.
    #[must_use]
    pub fn detail(&self) -> &'static str {
        match self {
            Self::UndeclaredDependency { .. } => {
                "Add the package to the dependencies section of package.json."
            }
            Self::Unsupported { .. } => {
                "You can only import relative paths or bare modules defined in your package.json."
            }
        }
    }
}

/// A [`ResolveError`] tagged with the hook that raised it.
#[derive(Debug, Clone, Error)]
#[error("[{hook}] {error}")]
pub struct HookError {
    pub hook: &'static str,
    #[source]
    pub error: ResolveError,
}

/// A resolution strategy.
///
/// Hooks must be pure: the same specifier in the same context always yields
/// the same answer, so bundles stay deterministic.
pub trait ResolveHook: Send + Sync {
    /// Hook name for diagnostics.
    fn name(&self) -> &'static str;

    /// Return `Some(result)` to handle this import, or `None` to let the next hook try.
    fn resolve_id(
        &self,
        specifier: &str,
        ctx: &ImportContext<'_>,
    ) -> HookResult<Option<ResolveIdResult>>;
}

/// Ordered, short-circuiting list of resolve hooks.
#[derive(Default)]
pub struct ResolverChain {
    hooks: Vec<Box<dyn ResolveHook>>,
}

impl ResolverChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; earlier hooks take priority.
    pub fn add(&mut self, hook: Box<dyn ResolveHook>) {
        self.hooks.push(hook);
    }

    /// Builder form of [`ResolverChain::add`].
    #[must_use]
    pub fn with(mut self, hook: impl ResolveHook + 'static) -> Self {
        self.add(Box::new(hook));
        self
    }

    /// Offer a specifier to each hook in order.
    ///
    /// Returns `None` if no hook handled it.
    pub fn resolve_id(
        &self,
        specifier: &str,
        ctx: &ImportContext<'_>,
    ) -> Result<Option<ResolveIdResult>, HookError> {
        for hook in &self.hooks {
            let result = hook
                .resolve_id(specifier, ctx)
                .map_err(|error| HookError {
                    hook: hook.name(),
                    error,
                })?;
            if let Some(result) = result {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Hook names in priority order.
    pub fn hook_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.iter().map(|h| h.name())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.hook_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Fixed(&'static str, &'static str);

    impl ResolveHook for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn resolve_id(
            &self,
            specifier: &str,
            _ctx: &ImportContext<'_>,
        ) -> HookResult<Option<ResolveIdResult>> {
            if specifier == self.1 {
                Ok(Some(ResolveIdResult::external(format!("{}:{}", self.0, specifier))))
            } else {
                Ok(None)
            }
        }
    }

    struct Refuse;

    impl ResolveHook for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        fn resolve_id(
            &self,
            specifier: &str,
            _ctx: &ImportContext<'_>,
        ) -> HookResult<Option<ResolveIdResult>> {
            Err(ResolveError::Unsupported {
                specifier: specifier.to_string(),
            })
        }
    }

    fn ctx(dir: &Path) -> ImportContext<'_> {
        ImportContext {
            resolve_dir: dir,
            kind: ImportKind::Static,
        }
    }

    #[test]
    fn test_first_hook_wins() {
        let chain = ResolverChain::new()
            .with(Fixed("first", "a"))
            .with(Fixed("second", "a"));
        let dir = PathBuf::from("/project");

        let result = chain.resolve_id("a", &ctx(&dir)).unwrap().unwrap();
        assert_eq!(result.id, "first:a");
        assert!(result.external);
    }

    #[test]
    fn test_unhandled_returns_none() {
        let chain = ResolverChain::new().with(Fixed("only", "a"));
        let dir = PathBuf::from("/project");
        assert!(chain.resolve_id("b", &ctx(&dir)).unwrap().is_none());
    }

    #[test]
    fn test_error_short_circuits_with_hook_name() {
        let chain = ResolverChain::new()
            .with(Fixed("first", "a"))
            .with(Refuse)
            .with(Fixed("never", "b"));
        let dir = PathBuf::from("/project");

        // Handled before the refusing hook.
        assert!(chain.resolve_id("a", &ctx(&dir)).is_ok());

        let err = chain.resolve_id("b", &ctx(&dir)).unwrap_err();
        assert_eq!(err.hook, "refuse");
        assert!(err.to_string().starts_with("[refuse]"));
    }

    #[test]
    fn test_debug_lists_hooks() {
        let chain = ResolverChain::new().with(Fixed("a", "")).with(Refuse);
        assert_eq!(format!("{chain:?}"), r#"["a", "refuse"]"#);
    }
}
