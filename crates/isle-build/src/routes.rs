//! Page discovery and route mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A page module found under the pages directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    /// Absolute path of the page module.
    pub path: PathBuf,
    /// Cache key: path relative to the project root with `/` separators.
    pub key: String,
    /// Route (`""` for the site root, `"docs/intro"` otherwise).
    pub route: String,
}

/// Convert a path relative to the pages directory into a route.
///
/// - `index.tsx` -> `""`
/// - `about.tsx` -> `"about"`
/// - `docs/index.tsx` -> `"docs"`
/// - `docs/intro.tsx` -> `"docs/intro"`
#[must_use]
pub fn route_for(rel_path: &Path) -> String {
    let stem_path = rel_path.with_extension("");
    let normalized = stem_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if normalized == "index" {
        String::new()
    } else if let Some(parent) = normalized.strip_suffix("/index") {
        parent.to_owned()
    } else {
        normalized
    }
}

/// Output HTML path for `route`, relative to the output directory.
#[must_use]
pub fn html_rel_path(route: &str) -> PathBuf {
    if route.is_empty() {
        PathBuf::from("index.html")
    } else {
        Path::new(route).join("index.html")
    }
}

/// Base name for a route's stylesheet (`index` for the root route).
#[must_use]
pub fn css_stem(route: &str) -> &str {
    if route.is_empty() { "index" } else { route }
}

fn rel_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Find page modules under `pages_dir`, sorted by path.
///
/// Hidden files and directories are skipped. When two files map to the same
/// route (`about/index.tsx` and `about.tsx`), the first in path order wins
/// and the other is reported.
#[must_use]
pub fn discover_pages(pages_dir: &Path, root: &Path, extensions: &[String]) -> Vec<PageSource> {
    if !pages_dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(pages_dir)
        .standard_filters(false)
        .hidden(true)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|e| e == ext))
        })
        .collect();
    files.sort();

    let mut by_route: BTreeMap<String, PageSource> = BTreeMap::new();
    for path in files {
        let rel = path.strip_prefix(pages_dir).unwrap_or(&path);
        let route = route_for(rel);
        if let Some(existing) = by_route.get(&route) {
            tracing::warn!(
                page = %path.display(),
                kept = %existing.path.display(),
                route = %route,
                "Duplicate route, skipping page"
            );
            continue;
        }
        let key = rel_key(root, &path);
        by_route.insert(route.clone(), PageSource { path, key, route });
    }

    let mut pages: Vec<PageSource> = by_route.into_values().collect();
    pages.sort_by(|a, b| a.path.cmp(&b.path));
    pages
}
