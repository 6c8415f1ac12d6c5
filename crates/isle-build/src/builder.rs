//! Build orchestrator.
//!
//! One build runs in this order:
//!
//! 1. Load the cache for the current [`BuildProfile`]
//! 2. Classify pages: snapshot still current -> candidate, else force-rebuild
//! 3. Render force-rebuild pages (their island set may have changed)
//! 4. Build the union of their islands and the candidates' recorded islands
//! 5. Promote candidates that reference a changed island or lost an output
//! 6. Render promoted pages, building any island they newly reference
//! 7. Run CSS and document assembly for every rendered page and write it
//! 8. Delete outputs no longer claimed by any record, including assets
//!    written this run for units that then failed
//! 9. Save the cache
//!
//! The cache is written once, after every output write, so an interrupted
//! build never records an output that does not exist.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::iter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use isle_cache::{BuildCache, BuildProfile, CacheStore, IslandRecord, Mode, PageRecord};
use isle_config::Config;
use rayon::prelude::*;

use crate::backend::{
    CommandOptimizer, Compiler, EsbuildCompiler, NodeRuntime, Optimizer, PageRuntime,
};
use crate::css::{CssPipeline, CssSettings, CssTransformer};
use crate::document::{DocumentParts, render_document};
use crate::error::{BuildError, UnitError};
use crate::island::{IslandBuilder, IslandOutputs, IslandResolver};
use crate::output::{OutputDir, asset_name, rel_to_url, url_to_rel};
use crate::page::{PageBuild, PageBuilder};
use crate::routes::{PageSource, css_stem, discover_pages, html_rel_path};

/// Configuration for [`SiteBuilder`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root; page cache keys are relative to it.
    pub root: PathBuf,
    /// Island specifiers resolve against this directory.
    pub source_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub out_dir: PathBuf,
    pub cache_file: PathBuf,
    pub page_extensions: Vec<String>,
    pub mode: Mode,
    pub purge: bool,
    /// Classes that always survive purging.
    pub keep: Vec<String>,
    pub library_packages: Vec<String>,
    pub library_layer: String,
}

impl BuildConfig {
    /// Default project layout under `root`, development mode.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            source_dir: root.join("src"),
            pages_dir: root.join("src/pages"),
            out_dir: root.join("dist"),
            cache_file: root.join(".isle-cache.json"),
            page_extensions: ["tsx", "jsx", "ts", "js"].map(str::to_owned).to_vec(),
            mode: Mode::Development,
            purge: false,
            keep: Vec::new(),
            library_packages: vec!["@isle/ui".to_owned()],
            library_layer: "library".to_owned(),
            root,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let project = &config.project_resolved;
        Self {
            root: project.root.clone(),
            source_dir: project.source_dir.clone(),
            pages_dir: project.pages_dir.clone(),
            out_dir: project.out_dir.clone(),
            cache_file: project.cache_file.clone(),
            page_extensions: project.page_extensions.clone(),
            mode: config.build_mode(),
            purge: config.purge_enabled(),
            keep: config.css.keep.clone(),
            library_packages: config.css.library_packages.clone(),
            library_layer: config.css.library_layer.clone(),
        }
    }

    #[must_use]
    pub fn profile(&self) -> BuildProfile {
        BuildProfile::new(self.mode, self.purge, &self.keep)
    }

    fn css_settings(&self) -> CssSettings {
        CssSettings {
            purge: self.purge,
            minify: self.mode.is_production(),
            keep: self.keep.clone(),
            library_packages: self.library_packages.clone(),
            library_layer: self.library_layer.clone(),
        }
    }
}

/// Summary of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub pages_built: usize,
    pub pages_reused: usize,
    pub pages_skipped: usize,
    pub islands_built: usize,
    pub islands_reused: usize,
    pub islands_skipped: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub elapsed: Duration,
}

/// Incremental site builder.
pub struct SiteBuilder {
    config: BuildConfig,
    compiler: Box<dyn Compiler>,
    runtime: Box<dyn PageRuntime>,
    optimizer: Option<Box<dyn Optimizer>>,
    css: CssPipeline,
    resolver: IslandResolver,
    store: CacheStore,
    out: OutputDir,
}

impl SiteBuilder {
    #[must_use]
    pub fn new(
        config: BuildConfig,
        compiler: Box<dyn Compiler>,
        runtime: Box<dyn PageRuntime>,
    ) -> Self {
        Self {
            css: CssPipeline::native(config.css_settings()),
            resolver: IslandResolver::new(config.source_dir.clone()),
            store: CacheStore::new(config.cache_file.clone()),
            out: OutputDir::new(config.out_dir.clone()),
            optimizer: None,
            compiler,
            runtime,
            config,
        }
    }

    /// Builder wired to the external tools named in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let build_config = BuildConfig::from_config(config);
        let tools = &config.tools_resolved;
        let root = build_config.root.clone();

        let compiler = EsbuildCompiler::new(tools.esbuild.clone(), root.clone())
            .with_minify(build_config.mode.is_production());
        let runtime = NodeRuntime::new(tools.node.clone(), tools.render_harness.clone(), root);

        let builder = Self::new(build_config, Box::new(compiler), Box::new(runtime));
        match tools.optimizer.clone().and_then(CommandOptimizer::new) {
            Some(optimizer) => builder.with_optimizer(Box::new(optimizer)),
            None => builder,
        }
    }

    /// Production optimizing pass for island bundles.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Replace the built-in CSS transformer.
    #[must_use]
    pub fn with_css_transformer(mut self, transformer: Box<dyn CssTransformer>) -> Self {
        self.css = CssPipeline::new(self.config.css_settings(), transformer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Remove the output directory and the cache manifest.
    pub fn clean(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.config.out_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.store.clear()
    }

    /// Run one incremental build.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the output directory cannot be created, no
    /// page is found, or the cache cannot be saved. Failures of individual
    /// pages and islands are logged and skipped.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let config = &self.config;

        fs::create_dir_all(&config.out_dir).map_err(|source| BuildError::OutputDir {
            path: config.out_dir.clone(),
            source,
        })?;

        let pages = discover_pages(&config.pages_dir, &config.root, &config.page_extensions);
        if pages.is_empty() {
            return Err(BuildError::NoPages(config.pages_dir.clone()));
        }

        let profile = config.profile();
        let previous = self.store.load(&profile);
        let mut report = BuildReport::default();

        let (candidates, force): (Vec<&PageSource>, Vec<&PageSource>) =
            pages.iter().partition(|page| {
                previous
                    .pages
                    .get(&page.key)
                    .is_some_and(|prev| prev.dep_hashes.is_current())
            });
        tracing::debug!(
            candidates = candidates.len(),
            stale = force.len(),
            "Classified pages"
        );

        let mut builds = self.render_pages(&force, &mut report);

        let mut island_sources: BTreeSet<String> = builds
            .values()
            .flat_map(|build| build.island_sources.iter().cloned())
            .collect();
        for page in &candidates {
            if let Some(prev) = previous.pages.get(&page.key) {
                island_sources.extend(prev.island_sources.iter().cloned());
            }
        }

        let islands = IslandBuilder {
            compiler: self.compiler.as_ref(),
            optimizer: self.optimizer.as_deref(),
            css: &self.css,
            resolver: &self.resolver,
            out: &self.out,
            production: config.mode.is_production(),
        };
        let mut island_out = IslandOutputs::default();
        islands.build(&island_sources, &previous.islands, &mut island_out);

        let (promoted, reused): (Vec<&PageSource>, Vec<&PageSource>) =
            candidates.into_iter().partition(|page| {
                previous
                    .pages
                    .get(&page.key)
                    .is_none_or(|prev| self.needs_rebuild(prev, &island_out))
            });

        let promoted_builds = self.render_pages(&promoted, &mut report);
        let extra: BTreeSet<String> = promoted_builds
            .values()
            .flat_map(|build| build.island_sources.iter().cloned())
            .filter(|source| !island_out.contains(source))
            .collect();
        if !extra.is_empty() {
            islands.build(&extra, &previous.islands, &mut island_out);
        }
        builds.extend(promoted_builds);

        let mut next = BuildCache::empty(&profile);
        let mut written = island_out.written.clone();
        for page in &pages {
            if let Some(build) = builds.remove(&page.key) {
                match self.write_page(page, build, &island_out, &mut written, &mut report) {
                    Ok(record) => {
                        next.pages.insert(page.key.clone(), record);
                        report.pages_built += 1;
                    }
                    Err(err) => {
                        tracing::warn!(page = %page.key, error = %err, "Failed to write page");
                        report.pages_skipped += 1;
                    }
                }
            } else if reused.iter().any(|p| p.key == page.key)
                && let Some(prev) = previous.pages.get(&page.key)
            {
                tracing::debug!(page = %page.key, "Reusing page");
                next.pages.insert(page.key.clone(), prev.clone());
                report.pages_reused += 1;
            }
        }

        next.islands = reachable_islands(&next.pages, &island_out.records);
        report.files_removed = self.collect_garbage(&previous, &next, written);

        report.islands_built = island_out.built;
        report.islands_reused = island_out.reused;
        report.islands_skipped = island_out.skipped;
        report.files_written += island_out.files_written;

        self.store.save(&next).map_err(BuildError::Cache)?;

        report.elapsed = start.elapsed();
        tracing::info!(
            pages_built = report.pages_built,
            pages_reused = report.pages_reused,
            islands_built = report.islands_built,
            islands_reused = report.islands_reused,
            elapsed_ms = report.elapsed.as_millis(),
            "Build complete"
        );
        Ok(report)
    }

    /// Whether an otherwise unchanged page has to be rebuilt.
    fn needs_rebuild(&self, prev: &PageRecord, islands: &IslandOutputs) -> bool {
        let island_changed = prev
            .island_sources
            .iter()
            .any(|source| islands.changed.contains(source));
        let outputs_missing = !self.out.exists(&prev.html_path)
            || prev
                .css_path
                .as_deref()
                .is_some_and(|css| !self.out.exists(css));
        island_changed || outputs_missing
    }

    /// Compile and render `pages` in parallel. Pages that fail or have no
    /// default export are logged and left out.
    fn render_pages(
        &self,
        pages: &[&PageSource],
        report: &mut BuildReport,
    ) -> BTreeMap<String, PageBuild> {
        let builder = PageBuilder {
            compiler: self.compiler.as_ref(),
            runtime: self.runtime.as_ref(),
        };

        let results: Vec<(&PageSource, Result<Option<PageBuild>, UnitError>)> = pages
            .par_iter()
            .map(|page| (*page, builder.build(&page.path)))
            .collect();

        let mut builds = BTreeMap::new();
        for (page, result) in results {
            match result {
                Ok(Some(build)) => {
                    builds.insert(page.key.clone(), build);
                }
                Ok(None) => {
                    tracing::warn!(page = %page.key, "Page has no default export, skipping");
                    report.pages_skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(page = %page.key, error = %err, "Page build failed, skipping");
                    report.pages_skipped += 1;
                }
            }
        }
        builds
    }

    /// Assemble and write one page, returning its new record.
    fn write_page(
        &self,
        page: &PageSource,
        build: PageBuild,
        islands: &IslandOutputs,
        written: &mut BTreeSet<PathBuf>,
        report: &mut BuildReport,
    ) -> Result<PageRecord, UnitError> {
        let mut dep_hashes = build.dep_hashes;
        let mut island_sources = Vec::new();
        let mut scripts = Vec::new();
        let mut styles = Vec::new();

        for source in &build.island_sources {
            if let Some(record) = islands.records.get(source) {
                island_sources.push(source.clone());
                scripts.push(record.js_path.clone());
                styles.extend(record.css_path.clone());
            } else if let Some(watch) = islands.unavailable.get(source) {
                // Stale as soon as the island can be built.
                for path in watch {
                    dep_hashes.insert_missing(path.clone());
                }
            }
        }

        let css = self.css.process_page(&build.css_entries, &build.html, &page.key);
        let css_path = if css.is_empty() {
            None
        } else {
            let name = asset_name(
                css_stem(&page.route),
                "css",
                css.as_bytes(),
                self.config.mode.is_production(),
            );
            let rel = PathBuf::from(name);
            written.insert(rel.clone());
            if self.out.write(&rel, css.as_bytes())? {
                report.files_written += 1;
            }
            Some(rel)
        };

        let page_css = css_path.as_deref().map(rel_to_url);
        let html = render_document(&DocumentParts {
            body: &build.html,
            meta: &build.meta,
            page_css: page_css.as_deref(),
            island_css: &styles,
            island_scripts: &scripts,
        });
        let html_path = html_rel_path(&page.route);
        if self.out.write(&html_path, html.as_bytes())? {
            report.files_written += 1;
        }
        tracing::info!(page = %page.key, route = %format!("/{}", page.route), "Built page");

        Ok(PageRecord {
            dep_hashes,
            island_sources,
            html_path,
            css_path,
        })
    }

    /// Delete outputs recorded by `previous` or `written` this run that
    /// `next` no longer claims.
    fn collect_garbage(
        &self,
        previous: &BuildCache,
        next: &BuildCache,
        written: BTreeSet<PathBuf>,
    ) -> usize {
        let claimed = output_paths(next);
        let mut stale = output_paths(previous);
        stale.extend(written);
        let mut removed = 0;
        for rel in stale.difference(&claimed) {
            match self.out.remove(rel) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(path = %rel.display(), error = %err, "Failed to remove stale output");
                }
            }
        }
        removed
    }
}

/// Island records referenced by at least one page.
fn reachable_islands(
    pages: &BTreeMap<String, PageRecord>,
    records: &BTreeMap<String, IslandRecord>,
) -> BTreeMap<String, IslandRecord> {
    pages
        .values()
        .flat_map(|page| page.island_sources.iter())
        .filter_map(|source| {
            records
                .get(source)
                .map(|record| (source.clone(), record.clone()))
        })
        .collect()
}

/// Every output file a cache records, relative to the output directory.
fn output_paths(cache: &BuildCache) -> BTreeSet<PathBuf> {
    let pages = cache
        .pages
        .values()
        .flat_map(|page| iter::once(page.html_path.clone()).chain(page.css_path.clone()));
    let islands = cache.islands.values().flat_map(|island| {
        iter::once(url_to_rel(&island.js_path)).chain(island.css_path.as_deref().map(url_to_rel))
    });
    pages.chain(islands).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockCompiler, MockRuntime};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const COUNTER: &str = "./islands/counter.ts";

    struct Site {
        dir: TempDir,
    }

    impl Site {
        fn new() -> Self {
            let site = Self {
                dir: TempDir::new().unwrap(),
            };
            site.write(
                "src/pages/index.tsx",
                "import ../styles/site.css\ntitle Home\n<h1 class=\"title\">Home</h1>\nisland ./islands/counter.ts\n",
            );
            site.write(
                "src/pages/about.tsx",
                "title About\n<p>About</p>\nisland ./islands/counter.ts\n",
            );
            site.write("src/styles/site.css", ".title { color: red; }\n");
            site.write("src/islands/counter.ts", "export default counter\n");
            site
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.path(rel)).unwrap()
        }

        fn exists(&self, rel: &str) -> bool {
            self.path(rel).exists()
        }

        fn builder(&self, mode: Mode) -> SiteBuilder {
            let mut config = BuildConfig::new(self.dir.path().to_path_buf());
            config.mode = mode;
            config.purge = mode.is_production();
            SiteBuilder::new(
                config,
                Box::new(MockCompiler::new()),
                Box::new(MockRuntime::new()),
            )
        }

        fn build(&self, mode: Mode) -> BuildReport {
            self.builder(mode).build().unwrap()
        }

        fn cache(&self) -> BuildCache {
            serde_json::from_str(&self.read(".isle-cache.json")).unwrap()
        }

        fn island_files(&self, ext: &str) -> Vec<String> {
            let mut files: Vec<String> = fs::read_dir(self.path("dist/islands"))
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|e| e.file_name().to_string_lossy().into_owned())
                        .filter(|name| name.ends_with(ext))
                        .collect()
                })
                .unwrap_or_default();
            files.sort();
            files
        }
    }

    #[test]
    fn test_first_build_writes_pages_and_islands() {
        let site = Site::new();

        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 2);
        assert_eq!(report.islands_built, 1);
        let index = site.read("dist/index.html");
        assert!(index.contains("<title>Home</title>"));
        assert!(index.contains("<link rel=\"stylesheet\" href=\"/index.css\">"));
        assert!(index.contains("<script defer src=\"/islands/counter.js\"></script>"));
        assert!(site.exists("dist/about/index.html"));
        assert_eq!(site.read("dist/index.css"), ".title { color: red; }");
        assert!(site.exists("dist/islands/counter.js"));

        let cache = site.cache();
        assert_eq!(cache.version, 1);
        assert_eq!(cache.pages["src/pages/index.tsx"].island_sources, [COUNTER]);
        assert!(cache.islands.contains_key(COUNTER));
        assert_eq!(cache.dangling_island_refs().count(), 0);
    }

    #[test]
    fn test_second_build_is_idempotent() {
        let site = Site::new();
        site.build(Mode::Production);
        let first = site.cache();

        let report = site.build(Mode::Production);

        assert_eq!(report.pages_built, 0);
        assert_eq!(report.pages_reused, 2);
        assert_eq!(report.islands_built, 0);
        assert_eq!(report.islands_reused, 1);
        assert_eq!(report.files_written, 0);
        assert_eq!(report.files_removed, 0);
        let second = site.cache();
        assert_eq!(
            first.pages.keys().collect::<Vec<_>>(),
            second.pages.keys().collect::<Vec<_>>()
        );
        assert_eq!(
            first.islands.keys().collect::<Vec<_>>(),
            second.islands.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_page_edit_rebuilds_only_that_page() {
        let site = Site::new();
        site.build(Mode::Development);

        site.write("src/pages/about.tsx", "<p>About us</p>\nisland ./islands/counter.ts\n");
        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 1);
        assert_eq!(report.pages_reused, 1);
        assert!(site.read("dist/about/index.html").contains("About us"));
    }

    #[test]
    fn test_transitive_dependency_edit_rebuilds_page() {
        let site = Site::new();
        site.build(Mode::Development);

        site.write("src/styles/site.css", ".title { color: blue; }\n");
        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 1);
        assert_eq!(site.read("dist/index.css"), ".title { color: blue; }");
    }

    #[test]
    fn test_shared_island_has_one_output() {
        let site = Site::new();
        site.build(Mode::Production);

        let scripts = site.island_files(".js");
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with("counter."));

        let src = format!("<script defer src=\"/islands/{}\"></script>", scripts[0]);
        assert!(site.read("dist/index.html").contains(&src));
        assert!(site.read("dist/about/index.html").contains(&src));
    }

    #[test]
    fn test_island_change_rebuilds_referencing_pages() {
        let site = Site::new();
        site.build(Mode::Production);
        let old = site.island_files(".js");

        site.write("src/islands/counter.ts", "export default counter2\n");
        let report = site.build(Mode::Production);

        assert_eq!(report.islands_built, 1);
        assert_eq!(report.pages_built, 2);
        let new = site.island_files(".js");
        assert_eq!(new.len(), 1);
        assert_ne!(old, new);
        assert!(report.files_removed >= 1);
        assert!(site.read("dist/about/index.html").contains(&new[0]));
    }

    #[test]
    fn test_css_only_change_leaves_islands_untouched() {
        let site = Site::new();
        site.build(Mode::Production);
        let old_css = site.cache().pages["src/pages/index.tsx"].css_path.clone().unwrap();
        let island_before = site.island_files(".js");

        site.write("src/styles/site.css", ".title { color: green; }\n");
        let report = site.build(Mode::Production);

        let new_css = site.cache().pages["src/pages/index.tsx"].css_path.clone().unwrap();
        assert_ne!(old_css, new_css);
        assert!(!site.path("dist").join(&old_css).exists());
        assert!(site.read(&format!("dist/{}", new_css.display())).contains("green"));
        assert_eq!(report.islands_built, 0);
        assert_eq!(report.islands_reused, 1);
        assert_eq!(report.pages_built, 1);
        assert_eq!(site.island_files(".js"), island_before);
    }

    #[test]
    fn test_production_css_is_purged_and_minified() {
        let site = Site::new();
        site.write(
            "src/styles/site.css",
            ".title { color: red; }\n.unused { color: blue; }\n",
        );
        site.build(Mode::Production);

        let css_path = site.cache().pages["src/pages/index.tsx"].css_path.clone().unwrap();
        assert_eq!(
            site.read(&format!("dist/{}", css_path.display())),
            ".title{color:red}"
        );
    }

    #[test]
    fn test_removed_page_is_garbage_collected() {
        let site = Site::new();
        site.write(
            "src/pages/about.tsx",
            "<p>About</p>\nisland ./islands/clock.ts\n",
        );
        site.write("src/islands/clock.ts", "export default clock\n");
        site.build(Mode::Development);
        assert!(site.exists("dist/islands/clock.js"));

        fs::remove_file(site.path("src/pages/about.tsx")).unwrap();
        let report = site.build(Mode::Development);

        assert!(!site.exists("dist/about"));
        assert!(!site.exists("dist/islands/clock.js"));
        assert!(site.exists("dist/islands/counter.js"));
        assert_eq!(report.files_removed, 2);
        let cache = site.cache();
        assert!(!cache.pages.contains_key("src/pages/about.tsx"));
        assert!(!cache.islands.contains_key("./islands/clock.ts"));
    }

    #[test]
    fn test_old_cache_version_triggers_full_rebuild() {
        let site = Site::new();
        site.build(Mode::Development);
        let raw = site.read(".isle-cache.json");
        site.write(
            ".isle-cache.json",
            &raw.replacen("\"version\": 1", "\"version\": 0", 1),
        );

        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 2);
        assert_eq!(report.islands_built, 1);
        assert_eq!(site.cache().version, 1);
    }

    #[test]
    fn test_mode_change_resets_cache() {
        let site = Site::new();
        site.build(Mode::Development);

        let report = site.build(Mode::Production);

        assert_eq!(report.pages_built, 2);
        assert_eq!(site.cache().mode, Mode::Production);
    }

    #[test]
    fn test_missing_output_forces_page_rebuild() {
        let site = Site::new();
        site.build(Mode::Development);
        fs::remove_file(site.path("dist/about/index.html")).unwrap();

        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 1);
        assert_eq!(report.pages_reused, 1);
        assert!(site.exists("dist/about/index.html"));
    }

    #[test]
    fn test_unresolved_island_is_picked_up_later() {
        let site = Site::new();
        site.write("src/pages/about.tsx", "<p>About</p>\nisland ./islands/later\n");
        let report = site.build(Mode::Development);
        assert_eq!(report.islands_skipped, 1);
        assert!(!site.read("dist/about/index.html").contains("later"));
        assert_eq!(site.cache().dangling_island_refs().count(), 0);

        let report = site.build(Mode::Development);
        assert_eq!(report.pages_reused, 2);

        site.write("src/islands/later.tsx", "export default later\n");
        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 1);
        assert!(
            site.read("dist/about/index.html")
                .contains("<script defer src=\"/islands/later.js\"></script>")
        );
    }

    #[test]
    fn test_page_without_default_export_is_skipped() {
        let site = Site::new();
        site.write("src/pages/draft.tsx", "export none\n");

        let report = site.build(Mode::Development);

        assert_eq!(report.pages_built, 2);
        assert_eq!(report.pages_skipped, 1);
        assert!(!site.exists("dist/draft"));
        assert!(!site.cache().pages.contains_key("src/pages/draft.tsx"));
    }

    #[test]
    fn test_failing_page_loses_its_outputs() {
        let site = Site::new();
        site.build(Mode::Development);

        site.write("src/pages/about.tsx", "fail\n");
        let report = site.build(Mode::Development);

        assert_eq!(report.pages_skipped, 1);
        assert_eq!(report.pages_reused, 1);
        assert!(!site.exists("dist/about/index.html"));
        assert!(site.exists("dist/index.html"));
    }

    #[test]
    fn test_cache_record_outside_output_dir_is_never_deleted() {
        let site = Site::new();
        site.build(Mode::Development);
        site.write("precious.txt", "keep");

        let mut cache = site.cache();
        let mut record = cache.pages["src/pages/about.tsx"].clone();
        record.html_path = PathBuf::from("../precious.txt");
        cache.pages.insert("src/pages/gone.tsx".to_owned(), record);
        site.write(".isle-cache.json", &serde_json::to_string(&cache).unwrap());

        let report = site.build(Mode::Development);

        assert_eq!(site.read("precious.txt"), "keep");
        assert_eq!(report.pages_reused, 2);
        assert!(!site.cache().pages.contains_key("src/pages/gone.tsx"));
    }

    #[test]
    fn test_assets_of_page_that_fails_to_write_are_removed() {
        let site = Site::new();
        site.write(
            "src/pages/blog.tsx",
            "import ../styles/site.css\n<h1 class=\"title\">Blog</h1>\n",
        );
        // A directory where the page HTML belongs makes the final write fail.
        fs::create_dir_all(site.path("dist/blog/index.html")).unwrap();

        let report = site.build(Mode::Production);

        assert_eq!(report.pages_built, 2);
        assert_eq!(report.pages_skipped, 1);
        assert!(!site.cache().pages.contains_key("src/pages/blog.tsx"));
        let leftovers: Vec<String> = fs::read_dir(site.path("dist"))
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("blog.") && name.ends_with(".css"))
            .collect();
        assert!(leftovers.is_empty(), "orphaned page CSS: {leftovers:?}");
    }

    #[test]
    fn test_no_pages_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/pages")).unwrap();
        let builder = SiteBuilder::new(
            BuildConfig::new(dir.path().to_path_buf()),
            Box::new(MockCompiler::new()),
            Box::new(MockRuntime::new()),
        );

        let err = builder.build().unwrap_err();

        assert!(matches!(err, BuildError::NoPages(_)));
        assert!(!dir.path().join(".isle-cache.json").exists());
    }

    #[test]
    fn test_clean_removes_outputs_and_cache() {
        let site = Site::new();
        let builder = site.builder(Mode::Development);
        builder.build().unwrap();

        builder.clean().unwrap();

        assert!(!site.exists("dist"));
        assert!(!site.exists(".isle-cache.json"));
    }
}
