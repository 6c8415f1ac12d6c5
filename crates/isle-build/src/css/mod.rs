//! CSS pipeline.
//!
//! CSS collected while compiling a unit goes through three steps:
//!
//! 1. **Merge**: entries are concatenated in import order; chunks from the
//!    shared component library are wrapped in a cascade layer.
//! 2. **Purge** (when enabled, pages only): classes never seen in the page's
//!    rendered HTML, after keep-list expansion, are handed to the transformer
//!    as unused symbols.
//! 3. **Minify** (production only).
//!
//! Purge and minify are best-effort: a stylesheet that fails to parse falls
//! back to minify-only output, and one that cannot be minified either falls
//! back to the merged text.

mod extract;
mod purge;
mod transform;

use std::collections::BTreeSet;

pub use extract::merge_entries;
pub use purge::{css_class_symbols, expand_keep_set, html_classes, unused_symbols};
pub use transform::NativeCss;

use crate::backend::CssEntry;
use crate::error::CssError;
use crate::outcome::{Degraded, Outcome, settle};

/// Options for a single [`CssTransformer::transform`] call.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub minify: bool,
    /// Classes whose rules may be removed.
    pub unused_symbols: BTreeSet<String>,
}

/// Purges and minifies CSS text.
pub trait CssTransformer: Send + Sync {
    fn transform(&self, css: &str, options: &TransformOptions) -> Result<String, CssError>;
}

/// Settings for [`CssPipeline`].
#[derive(Debug, Clone)]
pub struct CssSettings {
    pub purge: bool,
    pub minify: bool,
    /// User allow-list merged into every page's keep set.
    pub keep: Vec<String>,
    pub library_packages: Vec<String>,
    pub library_layer: String,
}

impl Default for CssSettings {
    fn default() -> Self {
        Self {
            purge: false,
            minify: false,
            keep: Vec::new(),
            library_packages: vec!["@isle/ui".to_owned()],
            library_layer: "library".to_owned(),
        }
    }
}

/// Merge, purge and minify CSS for pages and islands.
pub struct CssPipeline {
    settings: CssSettings,
    transformer: Box<dyn CssTransformer>,
}

impl CssPipeline {
    #[must_use]
    pub fn new(settings: CssSettings, transformer: Box<dyn CssTransformer>) -> Self {
        Self {
            settings,
            transformer,
        }
    }

    /// Pipeline with the built-in [`NativeCss`] transformer.
    #[must_use]
    pub fn native(settings: CssSettings) -> Self {
        Self::new(settings, Box::new(NativeCss))
    }

    #[must_use]
    pub fn settings(&self) -> &CssSettings {
        &self.settings
    }

    #[must_use]
    pub fn merge(&self, entries: &[CssEntry]) -> String {
        merge_entries(
            entries,
            &self.settings.library_packages,
            &self.settings.library_layer,
        )
    }

    /// Final stylesheet for a page rendered to `html`. Empty when the page
    /// collected no CSS.
    #[must_use]
    pub fn process_page(&self, entries: &[CssEntry], html: &str, unit: &str) -> String {
        let merged = self.merge(entries);
        if merged.trim().is_empty() {
            return String::new();
        }
        if self.settings.purge {
            return settle(self.purge_and_minify(&merged, html), "purge", unit);
        }
        if self.settings.minify {
            return settle(self.minify_only(&merged), "minify", unit);
        }
        merged
    }

    /// Final stylesheet for an island bundle. Islands are never purged: their
    /// markup is produced in the browser.
    #[must_use]
    pub fn process_island(&self, entries: &[CssEntry], unit: &str) -> String {
        let merged = self.merge(entries);
        if merged.trim().is_empty() {
            return String::new();
        }
        if self.settings.minify {
            return settle(self.minify_only(&merged), "minify", unit);
        }
        merged
    }

    fn purge_and_minify(&self, css: &str, html: &str) -> Outcome<String> {
        let attempt = css_class_symbols(css).and_then(|symbols| {
            let mut keep = html_classes(html);
            keep.extend(self.settings.keep.iter().cloned());
            let options = TransformOptions {
                minify: self.settings.minify,
                unused_symbols: unused_symbols(&symbols, &keep),
            };
            self.transformer.transform(css, &options)
        });

        attempt.map_err(|err| {
            let reason = format!("purge failed: {err}");
            match self.minify_only(css) {
                Ok(minified) => Degraded {
                    fallback: minified,
                    reason,
                },
                Err(degraded) => Degraded {
                    fallback: degraded.fallback,
                    reason: format!("{reason}; {}", degraded.reason),
                },
            }
        })
    }

    fn minify_only(&self, css: &str) -> Outcome<String> {
        if !self.settings.minify {
            return Ok(css.to_owned());
        }
        let options = TransformOptions {
            minify: true,
            unused_symbols: BTreeSet::new(),
        };
        self.transformer
            .transform(css, &options)
            .map_err(|err| Degraded {
                fallback: css.to_owned(),
                reason: format!("minify failed: {err}"),
            })
    }
}
