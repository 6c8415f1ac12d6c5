//! Page builder: compile, render, collect.

use std::path::Path;

use isle_cache::DependencySnapshot;

use crate::backend::{Compiler, CssEntry, PageMeta, PageRuntime, RenderContext, Target};
use crate::error::{RenderError, UnitError};

/// A rendered page before document assembly.
#[derive(Debug, Clone)]
pub struct PageBuild {
    /// Rendered body HTML.
    pub html: String,
    pub meta: PageMeta,
    /// Islands referenced while rendering, in first-reference order.
    pub island_sources: Vec<String>,
    /// CSS collected from the page's imports.
    pub css_entries: Vec<CssEntry>,
    /// Snapshot over every file the compilation touched.
    pub dep_hashes: DependencySnapshot,
}

/// Compiles and renders page modules.
pub struct PageBuilder<'a> {
    pub compiler: &'a dyn Compiler,
    pub runtime: &'a dyn PageRuntime,
}

impl PageBuilder<'_> {
    /// Build the page at `path`.
    ///
    /// Returns `Ok(None)` when the module has nothing to render.
    pub fn build(&self, path: &Path) -> Result<Option<PageBuild>, UnitError> {
        let module = self.compiler.compile(path, &Target::Server)?;

        // Fresh registry per page: only this render's islands end up in it.
        let mut ctx = RenderContext::new();
        let rendered = match self.runtime.render(&module, &mut ctx) {
            Ok(rendered) => rendered,
            Err(RenderError::NoDefaultExport) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(PageBuild {
            html: rendered.html,
            meta: rendered.meta,
            island_sources: ctx.into_islands(),
            dep_hashes: DependencySnapshot::compute(module.dependencies),
            css_entries: module.css,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockCompiler, MockRuntime};
    use std::fs;

    #[test]
    fn test_build_collects_islands_css_and_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.tsx");
        fs::write(
            &page,
            "import ./layout.tsx\nimport ./site.css\ntitle Home\nisland ./counter.ts\n",
        )
        .unwrap();
        fs::write(dir.path().join("layout.tsx"), "<nav></nav>\nisland ./menu.ts\n").unwrap();
        fs::write(dir.path().join("site.css"), ".a{}").unwrap();

        let builder = PageBuilder {
            compiler: &MockCompiler::new(),
            runtime: &MockRuntime::new(),
        };
        let build = builder.build(&page).unwrap().unwrap();

        assert_eq!(build.island_sources, ["./menu.ts", "./counter.ts"]);
        assert_eq!(build.meta["title"], "Home");
        assert_eq!(build.css_entries.len(), 1);
        assert_eq!(build.dep_hashes.len(), 3);
        assert!(build.dep_hashes.get(&dir.path().join("site.css")).is_some());
    }

    #[test]
    fn test_no_default_export_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("draft.tsx");
        fs::write(&page, "export none\n").unwrap();

        let builder = PageBuilder {
            compiler: &MockCompiler::new(),
            runtime: &MockRuntime::new(),
        };
        assert!(builder.build(&page).unwrap().is_none());
    }

    #[test]
    fn test_compile_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = PageBuilder {
            compiler: &MockCompiler::new(),
            runtime: &MockRuntime::new(),
        };
        assert!(matches!(
            builder.build(&dir.path().join("missing.tsx")),
            Err(UnitError::Compile(_))
        ));
    }
}
