//! Bundler engine capability.
//!
//! The service hands an engine one entry file and a [`ResolverChain`]; the
//! engine compiles the entry and asks the chain what every import becomes.
//! Diagnostics are returned as values so the caller decides how a failed
//! build maps to a response.

mod swc;

pub use swc::SwcEngine;

use crate::resolve::ResolverChain;
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Esm,
}

/// Environment the output runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Browser,
}

/// Build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Absolute, normalized entry path (extension optional).
    pub entry: PathBuf,
    /// Emit compact output.
    pub minify: bool,
    pub format: OutputFormat,
    pub platform: Platform,
    /// Package the automatic JSX runtime is imported from.
    pub jsx_import_source: String,
}

impl BuildOptions {
    /// Options used by the script endpoint: minified ESM for the browser.
    #[must_use]
    pub fn for_entry(entry: PathBuf, jsx_import_source: impl Into<String>) -> Self {
        Self {
            entry,
            minify: true,
            format: OutputFormat::Esm,
            platform: Platform::Browser,
            jsx_import_source: jsx_import_source.into(),
        }
    }
}

/// Category of a build diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The entry path names no module file.
    UnresolvedEntry,
    /// A hook refused an import form (absolute paths).
    UnsupportedImport,
    /// A bare import of a package missing from the manifest.
    UndeclaredDependency,
    /// No hook handled the import.
    UnresolvedImport,
    Parse,
    Io,
    Emit,
}

impl DiagnosticKind {
    /// Whether the failure was caused by the request rather than the project.
    #[must_use]
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::UnresolvedEntry | Self::UnsupportedImport)
    }
}

/// A build error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub text: String,
    /// Extra guidance, when there is any.
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// A file produced by a build, held in memory.
#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Path the file is keyed by. Equals the entry path for the entry's output.
    pub path: PathBuf,
    pub contents: Bytes,
}

/// Build result.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub output_files: Vec<OutputFile>,
    pub errors: Vec<Diagnostic>,
}

impl BuildResult {
    /// A failed build with a single diagnostic.
    #[must_use]
    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            output_files: Vec::new(),
            errors: vec![diagnostic],
        }
    }

    /// The output keyed by `path`, if the build produced one.
    #[must_use]
    pub fn output_for(&self, path: &Path) -> Option<&OutputFile> {
        self.output_files.iter().find(|file| file.path == path)
    }
}

/// Something that can turn an entry file into a browser module.
pub trait BundlerEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Build `options.entry`, consulting `resolvers` for every import.
    ///
    /// Never panics on bad input; every failure is reported in
    /// [`BuildResult::errors`].
    fn build(&self, options: &BuildOptions, resolvers: &ResolverChain) -> BuildResult;
}
