//! Path resolution and the allow-list that guards the script endpoint.
//!
//! All comparisons happen on lexically normalized absolute paths; raw request
//! strings are never prefix-matched.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Extensions probed, in order, when a module path has none.
pub const MODULE_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js", ".mjs"];

/// Index files probed when a module path names a directory.
const INDEX_FILES: &[&str] = &["index.tsx", "index.ts", "index.jsx", "index.js"];

/// Normalize a path by removing `.` and resolving `..` components.
///
/// Purely lexical: the filesystem is not consulted, and `..` at the root stays at the root.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}

/// Resolve a requested source to an absolute, normalized path.
///
/// `~/` prefixed sources are relative to `app_root`, everything else to `cwd`
/// (absolute sources stay absolute). Returns `None` for input that cannot name
/// a file.
#[must_use]
pub fn resolve_source(cwd: &Path, app_root: &Path, source: &str) -> Option<PathBuf> {
    if source.trim().is_empty() || source.contains('\0') {
        return None;
    }

    let joined = match source.strip_prefix("~/") {
        Some(rest) => app_root.join(rest),
        None => cwd.join(source),
    };
    Some(normalize_path(&joined))
}

/// Express `path` relative to `base`, using `..` where `path` lies outside it.
///
/// Both paths are expected to be absolute and normalized.
#[must_use]
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component<'_>> = path.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_parts.len() {
        result.push("..");
    }
    for part in &path_parts[common..] {
        result.push(part);
    }
    result
}

/// Render a relative path with `/` separators, as used in URLs.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Locate the module file a path refers to.
///
/// Tries the exact path, then each of [`MODULE_EXTENSIONS`] appended, then
/// index files inside a directory of that name.
#[must_use]
pub fn resolve_module_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    for ext in MODULE_EXTENSIONS {
        let mut with_ext = OsString::from(path.as_os_str());
        with_ext.push(ext);
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }

    if path.is_dir() {
        for index in INDEX_FILES {
            let index_path = path.join(index);
            if index_path.is_file() {
                return Some(index_path);
            }
        }
    }

    None
}

/// The set of directories the script endpoint may serve from.
#[derive(Debug, Clone)]
pub struct AllowList {
    /// Normalized absolute roots.
    roots: Vec<PathBuf>,
    /// The same roots with symlinks resolved.
    real_roots: Vec<PathBuf>,
}

impl AllowList {
    /// Create an allow-list from absolute root directories.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        let roots: Vec<PathBuf> = roots.iter().map(|r| normalize_path(r)).collect();
        let real_roots = roots
            .iter()
            .map(|r| dunce::canonicalize(r).unwrap_or_else(|_| r.clone()))
            .collect();
        Self { roots, real_roots }
    }

    /// Roots in configuration order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lexical containment: some root is a component-wise prefix of `path`.
    ///
    /// `path` must already be normalized (see [`resolve_source`]).
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }

    /// Containment after following symlinks.
    ///
    /// When `path` refers to a module on disk, its real location must also lie
    /// under a real root. A path with no module on disk has nothing to escape
    /// through and passes.
    #[must_use]
    pub fn contains_real(&self, path: &Path) -> bool {
        let Some(file) = resolve_module_file(path) else {
            return true;
        };
        match dunce::canonicalize(&file) {
            Ok(real) => self.real_roots.iter().any(|root| real.starts_with(root)),
            Err(_) => false,
        }
    }
}
