//! Bare imports → pinned CDN URLs.

use super::{HookResult, ImportContext, ResolveError, ResolveHook, ResolveIdResult};
use crate::manifest::{is_bare_specifier, DependencyManifest, PackageSpecifier, RuntimePackage};
use std::sync::Arc;

/// Packages whose imports are served by the runtime's compat shim.
pub const REACT_PACKAGES: &[&str] = &["react", "react-dom"];

/// Rewrites bare imports to `<cdn>/<package>@<version><subpath>`.
///
/// Versions come from the dependency manifest with range qualifiers
/// stripped. Packages other than the runtime get CDN directives that alias
/// React to the runtime's compat shim and pin the runtime version, so a
/// dependency that imports React never pulls a second runtime copy.
#[derive(Debug, Clone)]
pub struct CdnAliasHook {
    cdn_host: String,
    manifest: Arc<DependencyManifest>,
    runtime: RuntimePackage,
}

impl CdnAliasHook {
    #[must_use]
    pub fn new(
        cdn_host: impl Into<String>,
        manifest: Arc<DependencyManifest>,
        runtime: RuntimePackage,
    ) -> Self {
        Self {
            cdn_host: cdn_host.into(),
            manifest,
            runtime,
        }
    }

    /// Whether React imports are redirected to the runtime (false when the runtime is React).
    fn aliases_react(&self) -> bool {
        !REACT_PACKAGES.contains(&self.runtime.name.as_str())
    }

    /// URL of the runtime's compat entry standing in for a React import.
    fn compat_url(&self, subpath: &str) -> String {
        let target = match subpath {
            "" => "/compat".to_string(),
            "/jsx-runtime" | "/jsx-dev-runtime" => "/jsx-runtime".to_string(),
            other => format!("/compat{other}"),
        };
        format!("{}{}", self.runtime.cdn_url(&self.cdn_host), target)
    }

    /// CDN directives appended to every non-runtime package.
    fn dedupe_query(&self) -> String {
        let runtime = &self.runtime;
        if self.aliases_react() {
            format!(
                "?alias=react:{name}/compat,react-dom:{name}/compat&deps={name}@{version}",
                name = runtime.name,
                version = runtime.version
            )
        } else {
            format!("?deps={}@{}", runtime.name, runtime.version)
        }
    }
}

impl ResolveHook for CdnAliasHook {
    fn name(&self) -> &'static str {
        "cdn-alias"
    }

    fn resolve_id(
        &self,
        specifier: &str,
        _ctx: &ImportContext<'_>,
    ) -> HookResult<Option<ResolveIdResult>> {
        if !is_bare_specifier(specifier) {
            return Ok(None);
        }

        let package = PackageSpecifier::parse(specifier);
        let version =
            self.manifest
                .pinned(package.name)
                .ok_or_else(|| ResolveError::UndeclaredDependency {
                    specifier: specifier.to_string(),
                    package: package.name.to_string(),
                })?;

        if package.name == self.runtime.name {
            return Ok(Some(ResolveIdResult::external(format!(
                "{}{}",
                self.runtime.cdn_url(&self.cdn_host),
                package.subpath
            ))));
        }

        if self.aliases_react() && REACT_PACKAGES.contains(&package.name) {
            return Ok(Some(ResolveIdResult::external(
                self.compat_url(package.subpath),
            )));
        }

        Ok(Some(ResolveIdResult::external(format!(
            "{}/{}@{}{}{}",
            self.cdn_host,
            package.name,
            version,
            package.subpath,
            self.dedupe_query()
        ))))
    }
}
