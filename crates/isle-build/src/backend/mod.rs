//! External collaborators.
//!
//! The pipeline treats the module bundler, the page runtime (module execution
//! plus HTML rendering) and the production optimizer as black boxes behind the
//! traits in this module:
//!
//! - [`Compiler`]: bundles an entry module, reporting collected CSS and the
//!   transitive file set it touched
//! - [`PageRuntime`]: executes a compiled page module and renders it to HTML,
//!   registering referenced islands in an explicit [`RenderContext`]
//! - [`Optimizer`]: rewrites a browser bundle (production only, best-effort)
//!
//! Tool-backed implementations live in the submodules; the `mock` feature adds
//! file-backed test doubles.

mod command;
mod esbuild;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod node;

use std::path::{Path, PathBuf};

pub use command::CommandOptimizer;
pub use esbuild::EsbuildCompiler;
pub use node::NodeRuntime;

use crate::error::{CompileError, OptimizeError, RenderError};
use crate::island::island_id;

/// What a compilation is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A page module executed at build time.
    Server,
    /// A standalone browser script exposing its exports under `global_name`.
    Browser { global_name: String },
}

/// A CSS chunk collected from one imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssEntry {
    pub path: PathBuf,
    pub content: String,
}

/// Result of compiling one entry module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub entry: PathBuf,
    /// Bundled code.
    pub code: String,
    /// CSS collected from the entry's transitive imports, in import order.
    pub css: Vec<CssEntry>,
    /// Every file the compilation read, including the entry.
    pub dependencies: Vec<PathBuf>,
}

/// Module bundler.
pub trait Compiler: Send + Sync {
    fn compile(&self, entry: &Path, target: &Target) -> Result<CompiledModule, CompileError>;
}

/// Page metadata exported alongside the render function.
pub type PageMeta = serde_json::Map<String, serde_json::Value>;

/// Rendered page body.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub meta: PageMeta,
}

/// Island registry for a single page render.
///
/// A fresh context is created for every page, so the islands it holds are
/// exactly those referenced while rendering that page. Sources keep their
/// first-reference order and are de-duplicated.
#[derive(Debug, Default)]
pub struct RenderContext {
    islands: Vec<String>,
}

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an island source and return its DOM identity marker.
    pub fn register_island(&mut self, source: &str) -> String {
        if !self.islands.iter().any(|s| s == source) {
            self.islands.push(source.to_owned());
        }
        island_id(source)
    }

    #[must_use]
    pub fn islands(&self) -> &[String] {
        &self.islands
    }

    #[must_use]
    pub fn into_islands(self) -> Vec<String> {
        self.islands
    }
}

/// Executes compiled page modules.
pub trait PageRuntime: Send + Sync {
    /// Render the module's default export.
    ///
    /// Returns [`RenderError::NoDefaultExport`] when there is nothing to render.
    fn render(&self, module: &CompiledModule, ctx: &mut RenderContext)
    -> Result<Rendered, RenderError>;
}

/// Production optimizing compiler for browser bundles.
pub trait Optimizer: Send + Sync {
    fn optimize(&self, code: &str) -> Result<String, OptimizeError>;
}
