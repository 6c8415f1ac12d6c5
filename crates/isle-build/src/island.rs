//! Island builder.
//!
//! An island is identified by its source specifier (`"./counter.ts"`), never
//! by where it is used: every page referencing the same specifier shares one
//! compiled bundle and one [`IslandRecord`]. The DOM marker id is derived
//! from the specifier's hash, so rendering is deterministic across builds.
//!
//! Each bundle is an iife exposing the module under a global name, followed
//! by a footer that hydrates every `[data-island="<id>"]` element on load.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use isle_cache::{DependencySnapshot, IslandRecord, short_hash};

use crate::backend::{Compiler, Optimizer, Target};
use crate::css::CssPipeline;
use crate::error::UnitError;
use crate::outcome::{Degraded, settle};
use crate::output::{OutputDir, asset_name, rel_to_url, url_to_rel};

/// Hex length of island ids.
const ISLAND_ID_LEN: usize = 10;

/// Extensions tried, in order, for specifiers without one.
const ISLAND_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

/// Directory under the output root holding island assets.
pub const ISLANDS_DIR: &str = "islands";

/// Stable DOM identity for an island source.
#[must_use]
pub fn island_id(source: &str) -> String {
    short_hash(source.as_bytes(), ISLAND_ID_LEN)
}

fn global_name(id: &str) -> String {
    format!("__isle_{id}")
}

/// Script appended to every island bundle.
fn hydration_footer(id: &str) -> String {
    let global = global_name(id);
    format!(
        concat!(
            ";(()=>{{const m=globalThis[\"{global}\"];const f=m&&(m.default||m);",
            "if(typeof f!==\"function\")return;",
            "for(const el of document.querySelectorAll('[data-island=\"{id}\"]'))",
            "{{let p={{}};try{{p=JSON.parse(el.dataset.props||\"{{}}\")}}catch(e){{}}f(el,p)}}}})();\n"
        ),
        global = global,
        id = id
    )
}

/// Lexically normalize a path (drop `.`, resolve `..`).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Maps island specifiers to files on disk.
pub struct IslandResolver {
    source_dir: PathBuf,
}

impl IslandResolver {
    #[must_use]
    pub fn new(source_dir: PathBuf) -> Self {
        Self { source_dir }
    }

    /// Paths tried for `source`, in order.
    #[must_use]
    pub fn candidates(&self, source: &str) -> Vec<PathBuf> {
        let specifier = Path::new(source);
        let base = if specifier.is_absolute() {
            normalize(specifier)
        } else {
            normalize(&self.source_dir.join(specifier))
        };
        if specifier.extension().is_some() {
            return vec![base];
        }
        ISLAND_EXTENSIONS
            .iter()
            .map(|ext| {
                let mut name = base.clone().into_os_string();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            })
            .collect()
    }

    #[must_use]
    pub fn resolve(&self, source: &str) -> Option<PathBuf> {
        self.candidates(source).into_iter().find(|p| p.is_file())
    }
}

/// Result of building a set of islands, accumulated across passes.
#[derive(Debug, Default)]
pub struct IslandOutputs {
    /// Records of islands with usable output.
    pub records: BTreeMap<String, IslandRecord>,
    /// Islands whose output URLs differ from the previous build.
    ///
    /// A rebuild that keeps its URL (development mode) is not listed, since
    /// pages referencing it would render byte-identical HTML.
    pub changed: BTreeSet<String>,
    /// Islands without output, with the paths pages must watch for them.
    pub unavailable: BTreeMap<String, Vec<PathBuf>>,
    pub built: usize,
    pub reused: usize,
    pub skipped: usize,
    pub files_written: usize,
    /// Every output path written this run, including those of islands that
    /// failed part-way.
    pub written: BTreeSet<PathBuf>,
    /// Output names claimed this run, mapped to their source.
    names: BTreeMap<String, String>,
}

impl IslandOutputs {
    /// Whether `source` was handled by an earlier pass.
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.records.contains_key(source) || self.unavailable.contains_key(source)
    }

    fn claim_name(&mut self, source: &str, stem: &str) -> String {
        let name = match self.names.get(stem) {
            Some(owner) if owner != source => format!("{stem}-{}", island_id(source)),
            _ => stem.to_owned(),
        };
        self.names.insert(name.clone(), source.to_owned());
        name
    }
}

fn stem_of(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map_or_else(|| "island".to_owned(), |s| s.to_string_lossy().into_owned())
}

/// Builds island bundles into the output directory.
pub struct IslandBuilder<'a> {
    pub compiler: &'a dyn Compiler,
    pub optimizer: Option<&'a dyn Optimizer>,
    pub css: &'a CssPipeline,
    pub resolver: &'a IslandResolver,
    pub out: &'a OutputDir,
    pub production: bool,
}

impl IslandBuilder<'_> {
    /// Build or reuse every source not already in `outputs`.
    pub fn build(
        &self,
        sources: &BTreeSet<String>,
        previous: &BTreeMap<String, IslandRecord>,
        outputs: &mut IslandOutputs,
    ) {
        let pending: Vec<&String> = sources.iter().filter(|s| !outputs.contains(s)).collect();

        // Reused islands keep their names; claim those first so rebuilt
        // islands never overwrite them.
        let mut rebuild = Vec::new();
        for source in pending {
            let resolved = self.resolver.resolve(source);
            match (previous.get(source.as_str()), &resolved) {
                (Some(prev), Some(path)) if self.is_reusable(prev, path) => {
                    tracing::debug!(island = %source, "Reusing island");
                    let stem = stem_of(source);
                    let js_name = url_to_rel(&prev.js_path);
                    if js_name
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(&format!("{stem}.")))
                    {
                        outputs.names.entry(stem).or_insert_with(|| source.clone());
                    }
                    outputs.records.insert(source.clone(), prev.clone());
                    outputs.reused += 1;
                }
                _ => rebuild.push((source, resolved)),
            }
        }

        for (source, resolved) in rebuild {
            let prev = previous.get(source.as_str());
            let Some(path) = resolved else {
                tracing::warn!(island = %source, "Island source not found, skipping");
                outputs
                    .unavailable
                    .insert(source.clone(), self.resolver.candidates(source));
                outputs.skipped += 1;
                if prev.is_some() {
                    outputs.changed.insert(source.clone());
                }
                continue;
            };

            match self.build_one(source, &path, outputs) {
                Ok(record) => {
                    let changed = prev.is_none_or(|p| {
                        p.js_path != record.js_path || p.css_path != record.css_path
                    });
                    if changed {
                        outputs.changed.insert(source.clone());
                    }
                    tracing::info!(island = %source, js = %record.js_path, "Built island");
                    outputs.records.insert(source.clone(), record);
                    outputs.built += 1;
                }
                Err(err) => {
                    tracing::warn!(island = %source, error = %err, "Island build failed, skipping");
                    outputs.unavailable.insert(source.clone(), vec![path]);
                    outputs.skipped += 1;
                    if prev.is_some() {
                        outputs.changed.insert(source.clone());
                    }
                }
            }
        }
    }

    fn is_reusable(&self, prev: &IslandRecord, resolved: &Path) -> bool {
        prev.src_path == resolved
            && prev.dep_hashes.is_current()
            && self.out.exists(&url_to_rel(&prev.js_path))
            && prev
                .css_path
                .as_deref()
                .is_none_or(|css| self.out.exists(&url_to_rel(css)))
    }

    fn build_one(
        &self,
        source: &str,
        path: &Path,
        outputs: &mut IslandOutputs,
    ) -> Result<IslandRecord, UnitError> {
        let id = island_id(source);
        let module = self.compiler.compile(
            path,
            &Target::Browser {
                global_name: global_name(&id),
            },
        )?;

        let bundle = format!("{}\n{}", module.code, hydration_footer(&id));
        let code = match self.optimizer {
            Some(optimizer) if self.production => {
                let outcome = optimizer.optimize(&bundle).map_err(|err| Degraded {
                    fallback: bundle.clone(),
                    reason: err.to_string(),
                });
                settle(outcome, "optimize", source)
            }
            _ => bundle,
        };
        let css = self.css.process_island(&module.css, source);

        let name = outputs.claim_name(source, &stem_of(source));
        let islands = Path::new(ISLANDS_DIR);

        let js_rel = islands.join(asset_name(&name, "js", code.as_bytes(), self.production));
        outputs.written.insert(js_rel.clone());
        if self.out.write(&js_rel, code.as_bytes())? {
            outputs.files_written += 1;
        }

        let css_path = if css.is_empty() {
            None
        } else {
            let css_rel = islands.join(asset_name(&name, "css", css.as_bytes(), self.production));
            outputs.written.insert(css_rel.clone());
            if self.out.write(&css_rel, css.as_bytes())? {
                outputs.files_written += 1;
            }
            Some(rel_to_url(&css_rel))
        };

        Ok(IslandRecord {
            src_path: path.to_path_buf(),
            dep_hashes: DependencySnapshot::compute(module.dependencies),
            js_path: rel_to_url(&js_rel),
            css_path,
        })
    }
}
