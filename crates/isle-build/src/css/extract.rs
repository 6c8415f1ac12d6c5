//! Merging collected CSS entries.

use std::path::Path;

use crate::backend::CssEntry;

/// Whether `path` lives inside one of the library packages under `node_modules`.
fn is_library_entry(path: &Path, library_packages: &[String]) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/");
    library_packages
        .iter()
        .any(|pkg| normalized.contains(&format!("node_modules/{pkg}/")))
}

/// Concatenate entries in import order.
///
/// Library chunks are wrapped in `@layer <layer> { ... }` so unlayered
/// consumer styles always win over them; chunks that declare their own
/// layer are passed through as-is.
pub fn merge_entries(entries: &[CssEntry], library_packages: &[String], layer: &str) -> String {
    let mut chunks = Vec::with_capacity(entries.len());
    for entry in entries {
        let content = entry.content.trim();
        if content.is_empty() {
            continue;
        }
        if is_library_entry(&entry.path, library_packages) && !content.contains("@layer") {
            chunks.push(format!("@layer {layer} {{\n{content}\n}}"));
        } else {
            chunks.push(content.to_owned());
        }
    }
    chunks.join("\n")
}
