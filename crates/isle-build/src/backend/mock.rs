//! File-backed test doubles for the external collaborators.
//!
//! Mock modules are plain text files with one directive per line:
//!
//! | line              | meaning                                               |
//! |-------------------|-------------------------------------------------------|
//! | `import <rel>`    | dependency relative to the file; `.css` files become CSS entries, anything else is inlined |
//! | `island <src>`    | render-time island reference, emitted as a marker `<div>` |
//! | `title <text>`    | sets `meta.title`                                     |
//! | `export none`     | the module has no default export                      |
//! | `fail`            | compilation fails                                     |
//! | anything else     | emitted verbatim as HTML                              |
//!
//! Because the doubles read real files, the orchestrator's staleness logic
//! runs against the real filesystem in tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{
    CompiledModule, Compiler, CssEntry, Optimizer, PageRuntime, RenderContext, Rendered, Target,
};
use crate::error::{CompileError, OptimizeError, RenderError};

/// Compiler that flattens `import` lines and records every file it read.
#[derive(Default)]
pub struct MockCompiler {
    calls: Mutex<HashMap<PathBuf, usize>>,
}

impl MockCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `entry` has been compiled.
    #[must_use]
    pub fn compile_count(&self, entry: &Path) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(entry).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total compilations across all entries.
    #[must_use]
    pub fn total_compiles(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    fn collect(
        &self,
        path: &Path,
        code: &mut Vec<String>,
        css: &mut Vec<CssEntry>,
        deps: &mut Vec<PathBuf>,
    ) -> Result<(), CompileError> {
        if deps.iter().any(|p| p == path) {
            return Ok(());
        }
        let content = fs::read_to_string(path)?;
        deps.push(path.to_path_buf());

        let dir = path.parent().unwrap_or(Path::new("."));
        for line in content.lines() {
            if line.trim() == "fail" {
                return Err(CompileError::Failed {
                    entry: path.to_path_buf(),
                    stderr: "mock compile failure".to_owned(),
                });
            }
            if let Some(rel) = line.strip_prefix("import ") {
                let import = dir.join(rel.trim());
                if import.extension().is_some_and(|ext| ext == "css") {
                    let content = fs::read_to_string(&import)?;
                    deps.push(import.clone());
                    css.push(CssEntry {
                        path: import,
                        content,
                    });
                } else {
                    self.collect(&import, code, css, deps)?;
                }
                continue;
            }
            code.push(line.to_owned());
        }
        Ok(())
    }
}

impl Compiler for MockCompiler {
    fn compile(&self, entry: &Path, _target: &Target) -> Result<CompiledModule, CompileError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(entry.to_path_buf()).or_default() += 1;
        }

        let mut code = Vec::new();
        let mut css = Vec::new();
        let mut dependencies = Vec::new();
        self.collect(entry, &mut code, &mut css, &mut dependencies)?;

        Ok(CompiledModule {
            entry: entry.to_path_buf(),
            code: code.join("\n"),
            css,
            dependencies,
        })
    }
}

/// Runtime that interprets flattened mock modules.
#[derive(Default)]
pub struct MockRuntime;

impl MockRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PageRuntime for MockRuntime {
    fn render(
        &self,
        module: &CompiledModule,
        ctx: &mut RenderContext,
    ) -> Result<Rendered, RenderError> {
        let mut rendered = Rendered::default();
        let mut html = Vec::new();

        for line in module.code.lines() {
            if line.trim() == "export none" {
                return Err(RenderError::NoDefaultExport);
            }
            if let Some(title) = line.strip_prefix("title ") {
                rendered
                    .meta
                    .insert("title".to_owned(), title.trim().into());
            } else if let Some(source) = line.strip_prefix("island ") {
                let id = ctx.register_island(source.trim());
                html.push(format!(r#"<div data-island="{id}"></div>"#));
            } else {
                html.push(line.to_owned());
            }
        }

        rendered.html = html.join("\n");
        Ok(rendered)
    }
}

/// Optimizer that tags its output, or always fails.
pub struct MockOptimizer {
    fail: bool,
}

impl MockOptimizer {
    /// Prefixes bundles with `/*optimized*/`.
    #[must_use]
    pub fn new() -> Self {
        Self { fail: false }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for MockOptimizer {
    fn optimize(&self, code: &str) -> Result<String, OptimizeError> {
        if self.fail {
            return Err(OptimizeError::Failed {
                status: "exit status: 1".to_owned(),
                stderr: "mock optimizer failure".to_owned(),
            });
        }
        Ok(format!("/*optimized*/{code}"))
    }
}
