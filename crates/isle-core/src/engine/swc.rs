//! swc-backed engine.
//!
//! Compiles a single entry file: TypeScript is stripped, JSX is lowered to
//! the automatic runtime, and every import specifier (including the JSX
//! runtime import the transform injects) is replaced by whatever the
//! resolver chain returns. Nothing is inlined. Minified builds go through
//! the swc minifier (compress + mangle) before code generation.

#![allow(clippy::default_trait_access)]

use super::{BuildOptions, BuildResult, BundlerEngine, Diagnostic, DiagnosticKind, OutputFile};
use crate::manifest::is_url_specifier;
use crate::paths::resolve_module_file;
use crate::resolve::{HookError, ImportContext, ImportKind, ResolveError, ResolverChain};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use swc_common::{
    comments::{Comments, SingleThreadedComments},
    sync::Lrc,
    FileName, Globals, Mark, SourceMap, GLOBALS,
};
use swc_ecma_ast::{
    CallExpr, Callee, EsVersion, ExportAll, Expr, ImportDecl, Lit, Module, ModuleItem,
    NamedExport, Program, Str,
};
use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
use swc_ecma_minifier::{
    optimize,
    option::{CompressOptions, ExtraOptions, MangleOptions, MinifyOptions},
};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_transforms_base::{fixer::fixer, hygiene::hygiene, resolver};
use swc_ecma_transforms_react::{react, Options as ReactOptions, Runtime};
use swc_ecma_transforms_typescript::strip;
use swc_ecma_visit::{FoldWith, VisitMut, VisitMutWith};

const TARGET: EsVersion = EsVersion::Es2022;

/// In-process engine built on swc.
///
/// `SwcEngine` is stateless; one instance can serve every request.
#[derive(Debug, Clone, Default)]
pub struct SwcEngine {
    _private: (),
}

impl SwcEngine {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn is_typescript(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "ts" | "tsx" | "mts" | "cts"))
    }

    /// `.ts` files never contain JSX; every other module may.
    fn is_jsx(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "tsx" | "jsx" | "js" | "mjs"))
    }

    /// Locate the file behind the entry path.
    fn resolve_entry(
        options: &BuildOptions,
        resolvers: &ResolverChain,
    ) -> Result<PathBuf, Diagnostic> {
        let entry = options.entry.to_string_lossy();
        let dir = options.entry.parent().unwrap_or(Path::new("/"));
        let ctx = ImportContext {
            resolve_dir: dir,
            kind: ImportKind::EntryPoint,
        };

        let unresolved = || {
            Diagnostic::new(
                DiagnosticKind::UnresolvedEntry,
                format!("Could not resolve \"{entry}\""),
            )
        };

        let path = match resolvers.resolve_id(&entry, &ctx) {
            Ok(Some(result)) if !result.external => PathBuf::from(result.id),
            Ok(Some(_)) => return Err(unresolved()),
            Ok(None) => options.entry.clone(),
            Err(err) => return Err(hook_diagnostic(&err)),
        };

        resolve_module_file(&path).ok_or_else(unresolved)
    }

    fn compile(
        file: &Path,
        source: String,
        options: &BuildOptions,
        resolvers: &ResolverChain,
    ) -> Result<Vec<u8>, Vec<Diagnostic>> {
        let is_ts = Self::is_typescript(file);
        let is_jsx = Self::is_jsx(file);

        let cm: Lrc<SourceMap> = Default::default();
        let filename = file.to_string_lossy().into_owned();
        let fm = cm.new_source_file(Lrc::new(FileName::Custom(filename)), source);

        let syntax = if is_ts {
            Syntax::Typescript(TsSyntax {
                tsx: is_jsx,
                decorators: true,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: is_jsx,
                decorators: true,
                ..Default::default()
            })
        };

        let comments = SingleThreadedComments::default();
        let lexer = Lexer::new(syntax, TARGET, StringInput::from(&*fm), Some(&comments));
        let mut parser = Parser::new_from(lexer);

        let module = parser.parse_module().map_err(|e| {
            vec![Diagnostic::new(
                DiagnosticKind::Parse,
                format!("Failed to parse: {:?}", e.kind()),
            )]
        })?;

        let recovered: Vec<Diagnostic> = parser
            .take_errors()
            .into_iter()
            .map(|e| Diagnostic::new(DiagnosticKind::Parse, format!("{:?}", e.kind())))
            .collect();
        if !recovered.is_empty() {
            return Err(recovered);
        }

        let resolve_dir = file.parent().unwrap_or(Path::new("/"));
        let mut rewriter = ImportRewriter::new(resolvers, resolve_dir);

        let output = GLOBALS.set(&Globals::default(), || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            let mut program = Program::Module(module);
            program = program.fold_with(&mut resolver(unresolved_mark, top_level_mark, is_ts));
            if is_ts {
                program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));
            }

            let mut module = into_module(program);

            if is_jsx {
                let react_options = ReactOptions {
                    runtime: Some(Runtime::Automatic),
                    import_source: Some(options.jsx_import_source.clone()),
                    ..Default::default()
                };
                module = module.fold_with(&mut react(
                    cm.clone(),
                    Some(&comments),
                    react_options,
                    top_level_mark,
                    unresolved_mark,
                ));
            }

            module.visit_mut_with(&mut rewriter);

            let mut program = Program::Module(module);
            if options.minify {
                program = optimize(
                    program,
                    cm.clone(),
                    Some(&comments),
                    None,
                    &MinifyOptions {
                        compress: Some(CompressOptions::default()),
                        mangle: Some(MangleOptions::default()),
                        ..Default::default()
                    },
                    &ExtraOptions {
                        unresolved_mark,
                        top_level_mark,
                        mangle_name_cache: None,
                    },
                );
            }

            program = program.fold_with(&mut hygiene());
            into_module(program.fold_with(&mut fixer(Some(&comments))))
        });

        if !rewriter.errors.is_empty() {
            return Err(rewriter.errors);
        }

        let mut buf = Vec::new();
        {
            let emitted_comments: Option<&dyn Comments> =
                if options.minify { None } else { Some(&comments) };
            let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
            let mut emitter = Emitter {
                cfg: swc_ecma_codegen::Config::default()
                    .with_minify(options.minify)
                    .with_target(TARGET),
                cm: cm.clone(),
                comments: emitted_comments,
                wr: writer,
            };
            emitter.emit_module(&output).map_err(|e| {
                vec![Diagnostic::new(
                    DiagnosticKind::Emit,
                    format!("Failed to emit: {e}"),
                )]
            })?;
        }

        Ok(buf)
    }
}

impl BundlerEngine for SwcEngine {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn build(&self, options: &BuildOptions, resolvers: &ResolverChain) -> BuildResult {
        let file = match Self::resolve_entry(options, resolvers) {
            Ok(file) => file,
            Err(diagnostic) => return BuildResult::failed(diagnostic),
        };

        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            Err(e) => {
                return BuildResult::failed(Diagnostic::new(
                    DiagnosticKind::Io,
                    format!("Failed to read {}: {e}", file.display()),
                ))
            }
        };

        tracing::debug!(entry = %options.entry.display(), file = %file.display(), "compiling");

        match Self::compile(&file, source, options, resolvers) {
            Ok(code) => BuildResult {
                output_files: vec![OutputFile {
                    path: options.entry.clone(),
                    contents: Bytes::from(code),
                }],
                errors: Vec::new(),
            },
            Err(errors) => BuildResult {
                output_files: Vec::new(),
                errors,
            },
        }
    }
}

fn into_module(program: Program) -> Module {
    match program {
        Program::Module(m) => m,
        Program::Script(s) => Module {
            span: s.span,
            body: s.body.into_iter().map(ModuleItem::Stmt).collect(),
            shebang: s.shebang,
        },
    }
}

fn hook_diagnostic(err: &HookError) -> Diagnostic {
    let kind = match err.error {
        ResolveError::UndeclaredDependency { .. } => DiagnosticKind::UndeclaredDependency,
        ResolveError::Unsupported { .. } => DiagnosticKind::UnsupportedImport,
    };
    Diagnostic::new(kind, err.to_string()).with_detail(err.error.detail())
}

/// Replaces import specifiers in place with the resolver chain's answer.
struct ImportRewriter<'a> {
    resolvers: &'a ResolverChain,
    resolve_dir: &'a Path,
    errors: Vec<Diagnostic>,
}

impl<'a> ImportRewriter<'a> {
    fn new(resolvers: &'a ResolverChain, resolve_dir: &'a Path) -> Self {
        Self {
            resolvers,
            resolve_dir,
            errors: Vec::new(),
        }
    }

    fn rewrite(&mut self, src: &mut Str, kind: ImportKind) {
        let specifier = src.value.to_string();
        let ctx = ImportContext {
            resolve_dir: self.resolve_dir,
            kind,
        };

        match self.resolvers.resolve_id(&specifier, &ctx) {
            Ok(Some(result)) => {
                src.value = result.id.into();
                src.raw = None;
            }
            Ok(None) if is_url_specifier(&specifier) => {}
            Ok(None) => self.errors.push(Diagnostic::new(
                DiagnosticKind::UnresolvedImport,
                format!("Could not resolve \"{specifier}\""),
            )),
            Err(err) => self.errors.push(hook_diagnostic(&err)),
        }
    }
}

impl VisitMut for ImportRewriter<'_> {
    fn visit_mut_import_decl(&mut self, decl: &mut ImportDecl) {
        self.rewrite(&mut decl.src, ImportKind::Static);
    }

    fn visit_mut_named_export(&mut self, export: &mut NamedExport) {
        if let Some(src) = export.src.as_deref_mut() {
            self.rewrite(src, ImportKind::ReExport);
        }
    }

    fn visit_mut_export_all(&mut self, export: &mut ExportAll) {
        self.rewrite(&mut export.src, ImportKind::ReExport);
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        call.visit_mut_children_with(self);

        if !matches!(call.callee, Callee::Import(_)) {
            return;
        }
        let Some(first) = call.args.first_mut() else {
            return;
        };

        // A template literal without substitutions is a plain specifier.
        let replacement = match &mut *first.expr {
            Expr::Lit(Lit::Str(src)) => {
                self.rewrite(src, ImportKind::Dynamic);
                None
            }
            Expr::Tpl(tpl) if tpl.exprs.is_empty() && tpl.quasis.len() == 1 => {
                let quasi = &tpl.quasis[0];
                let mut src = Str {
                    span: tpl.span,
                    value: quasi.cooked.clone().unwrap_or_else(|| quasi.raw.clone()),
                    raw: None,
                };
                self.rewrite(&mut src, ImportKind::Dynamic);
                Some(src)
            }
            _ => None,
        };

        if let Some(src) = replacement {
            *first.expr = Expr::Lit(Lit::Str(src));
        }
    }
}
