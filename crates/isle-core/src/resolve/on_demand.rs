//! Local imports → recursive requests to the script endpoint.

use super::{HookResult, ImportContext, ImportKind, ResolveError, ResolveHook, ResolveIdResult};
use crate::endpoint::ScriptEndpoint;
use crate::paths::{normalize_path, relative_to, to_slash};
use std::path::{Path, PathBuf};

/// Rewrites relative and `~/` imports to URLs on the script endpoint.
///
/// Each local module therefore becomes its own bundle, compiled the first
/// time a browser asks for it. Absolute specifiers are rejected outright.
#[derive(Debug, Clone)]
pub struct OnDemandHook {
    cwd: PathBuf,
    app_root: PathBuf,
    endpoint: ScriptEndpoint,
    build_stamp: Option<String>,
}

impl OnDemandHook {
    #[must_use]
    pub fn new(
        cwd: PathBuf,
        app_root: PathBuf,
        endpoint: ScriptEndpoint,
        build_stamp: Option<String>,
    ) -> Self {
        Self {
            cwd,
            app_root,
            endpoint,
            build_stamp,
        }
    }
}

fn is_absolute_specifier(specifier: &str) -> bool {
    specifier.starts_with('/') || specifier.starts_with('\\') || Path::new(specifier).is_absolute()
}

impl ResolveHook for OnDemandHook {
    fn name(&self) -> &'static str {
        "on-demand"
    }

    fn resolve_id(
        &self,
        specifier: &str,
        ctx: &ImportContext<'_>,
    ) -> HookResult<Option<ResolveIdResult>> {
        if ctx.kind == ImportKind::EntryPoint {
            return Ok(None);
        }

        let app_rooted = specifier.starts_with('~');
        if !app_rooted && !specifier.starts_with('.') {
            if is_absolute_specifier(specifier) {
                return Err(ResolveError::Unsupported {
                    specifier: specifier.to_string(),
                });
            }
            return Ok(None);
        }

        let resolved = if app_rooted {
            let rest = specifier.trim_start_matches('~').trim_start_matches(['/', '\\']);
            self.app_root.join(rest)
        } else {
            ctx.resolve_dir.join(specifier)
        };

        let source = to_slash(&relative_to(&normalize_path(&resolved), &self.cwd));
        Ok(Some(ResolveIdResult::external(
            self.endpoint.url_for(&source, self.build_stamp.as_deref()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::form_urlencoded;

    fn hook(stamp: Option<&str>) -> OnDemandHook {
        OnDemandHook::new(
            PathBuf::from("/project"),
            PathBuf::from("/project/app"),
            ScriptEndpoint::default(),
            stamp.map(str::to_string),
        )
    }

    fn ctx(kind: ImportKind) -> ImportContext<'static> {
        ImportContext {
            resolve_dir: Path::new("/project/app/islands"),
            kind,
        }
    }

    fn param(url: &str, key: &str) -> Option<String> {
        let (path, query) = url.split_once('?')?;
        assert_eq!(path, "/_script");
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_relative_import_points_back_at_endpoint() {
        let result = hook(None)
            .resolve_id("./helper", &ctx(ImportKind::Static))
            .unwrap()
            .unwrap();

        assert!(result.external);
        assert_eq!(param(&result.id, "source").as_deref(), Some("app/islands/helper"));
        assert_eq!(param(&result.id, "sha"), None);
    }

    #[test]
    fn test_build_stamp_is_propagated() {
        let result = hook(Some("abc123"))
            .resolve_id("../shared/format.ts", &ctx(ImportKind::Dynamic))
            .unwrap()
            .unwrap();

        assert_eq!(param(&result.id, "source").as_deref(), Some("app/shared/format.ts"));
        assert_eq!(param(&result.id, "sha").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_app_rooted_import() {
        let result = hook(None)
            .resolve_id("~/components/button", &ctx(ImportKind::ReExport))
            .unwrap()
            .unwrap();
        assert_eq!(
            param(&result.id, "source").as_deref(),
            Some("app/components/button")
        );
    }

    #[test]
    fn test_absolute_import_is_rejected() {
        let err = hook(None)
            .resolve_id("/etc/passwd", &ctx(ImportKind::Static))
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Unsupported {
                specifier: "/etc/passwd".to_string()
            }
        );
        assert!(err.detail().contains("relative paths"));
    }

    #[test]
    fn test_entry_point_and_bare_are_skipped() {
        let hook = hook(None);
        assert_eq!(
            hook.resolve_id("/project/app/islands/counter", &ctx(ImportKind::EntryPoint))
                .unwrap(),
            None
        );
        assert_eq!(hook.resolve_id("preact", &ctx(ImportKind::Static)).unwrap(), None);
    }
}
