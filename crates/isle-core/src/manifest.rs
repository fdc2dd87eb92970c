//! Project dependency manifest.
//!
//! The `dependencies` object of `package.json` pins the version every bare
//! import is rewritten to. It is read once at startup and shared read-only.

use crate::error::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

/// Declared dependencies: package name → version range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    deps: BTreeMap<String, String>,
}

impl DependencyManifest {
    /// Load the `dependencies` section of a `package.json`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse `package.json` content.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let pkg: PackageJson = serde_json::from_str(content)?;
        Ok(Self {
            deps: pkg.dependencies,
        })
    }

    /// Build a manifest from `(name, range)` pairs.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            deps: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The declared range for a package, verbatim.
    #[must_use]
    pub fn declared(&self, package: &str) -> Option<&str> {
        self.deps.get(package).map(String::as_str)
    }

    /// The declared version with its range qualifier stripped.
    #[must_use]
    pub fn pinned(&self, package: &str) -> Option<&str> {
        self.declared(package).map(strip_range_prefix)
    }

    /// Resolve the UI runtime package and its pinned version.
    pub fn runtime(&self, package: &str) -> Result<RuntimePackage, Error> {
        let version = self
            .pinned(package)
            .ok_or_else(|| Error::RuntimeNotDeclared {
                package: package.to_string(),
            })?;
        Ok(RuntimePackage {
            name: package.to_string(),
            version: version.to_string(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

/// The UI runtime, pinned to the exact installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePackage {
    pub name: String,
    pub version: String,
}

impl RuntimePackage {
    /// `<cdn>/<name>@<version>`
    #[must_use]
    pub fn cdn_url(&self, cdn_host: &str) -> String {
        format!("{}/{}@{}", cdn_host, self.name, self.version)
    }
}

/// Strip a leading `^` or `~` range qualifier.
#[must_use]
pub fn strip_range_prefix(range: &str) -> &str {
    range
        .strip_prefix('^')
        .or_else(|| range.strip_prefix('~'))
        .unwrap_or(range)
}

/// A bare specifier split into package name and subpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSpecifier<'a> {
    /// `react`, `@scope/pkg`
    pub name: &'a str,
    /// Empty, or `/`-prefixed (`/jsx-runtime`, `/sub/path`).
    pub subpath: &'a str,
}

impl<'a> PackageSpecifier<'a> {
    /// Split a bare specifier. Scoped packages consume two segments.
    #[must_use]
    pub fn parse(specifier: &'a str) -> Self {
        let segments = if specifier.starts_with('@') { 2 } else { 1 };
        let split_at = specifier
            .match_indices('/')
            .nth(segments - 1)
            .map_or(specifier.len(), |(idx, _)| idx);

        let (name, subpath) = specifier.split_at(split_at);
        let subpath = if subpath == "/" { "" } else { subpath };
        Self { name, subpath }
    }
}

/// Check if a specifier names a package (not relative, absolute, app-rooted or a URL).
#[must_use]
pub fn is_bare_specifier(specifier: &str) -> bool {
    !specifier.is_empty()
        && !specifier.starts_with('.')
        && !specifier.starts_with('~')
        && !specifier.starts_with('/')
        && !specifier.starts_with('\\')
        && !Path::new(specifier).is_absolute()
        && !is_url_specifier(specifier)
}

/// Check if a specifier is already a URL and should be left untouched.
#[must_use]
pub fn is_url_specifier(specifier: &str) -> bool {
    specifier.starts_with("https://")
        || specifier.starts_with("http://")
        || specifier.starts_with("data:")
}
