//! Incremental page and island build pipeline for isle.
//!
//! This crate provides:
//! - [`SiteBuilder`]: the build orchestrator
//! - [`PageBuilder`] and [`IslandBuilder`]: per-unit builders
//! - [`CssPipeline`]: CSS merge, purge and minify
//! - [`Compiler`], [`PageRuntime`], [`Optimizer`]: traits for the external
//!   tools, with tool-backed implementations
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use isle_build::SiteBuilder;
//! use isle_config::Config;
//!
//! let config = Config::load(None, None)?;
//! let report = SiteBuilder::from_config(&config).build()?;
//! println!("{} pages built", report.pages_built);
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod builder;
pub mod css;
mod document;
mod error;
mod island;
mod outcome;
mod output;
mod page;
mod routes;

pub use backend::{
    CommandOptimizer, CompiledModule, Compiler, CssEntry, EsbuildCompiler, NodeRuntime, Optimizer,
    PageMeta, PageRuntime, RenderContext, Rendered, Target,
};
pub use builder::{BuildConfig, BuildReport, SiteBuilder};
pub use css::{CssPipeline, CssSettings, CssTransformer, NativeCss, TransformOptions};
pub use document::{DocumentParts, render_document};
pub use error::{BuildError, CompileError, CssError, OptimizeError, RenderError, UnitError};
pub use island::{ISLANDS_DIR, IslandBuilder, IslandOutputs, IslandResolver, island_id};
pub use outcome::{Degraded, Outcome};
pub use page::{PageBuild, PageBuilder};
pub use routes::{PageSource, discover_pages, route_for};
