//! Node-backed [`PageRuntime`].
//!
//! The compiled page module is written to a scratch `.mjs` file inside the
//! project root and executed by a small harness script:
//!
//! ```text
//! node <harness> <module.mjs>
//! ```
//!
//! The harness imports the module, renders its default export and prints a
//! single JSON object on stdout:
//!
//! ```json
//! {"html": "<main>..</main>", "meta": {"title": "Home"}, "islands": ["./counter.ts"], "hasDefault": true}
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde::Deserialize;

use super::{CompiledModule, PageMeta, PageRuntime, RenderContext, Rendered};
use crate::error::RenderError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarnessOutput {
    #[serde(default)]
    html: String,
    #[serde(default)]
    meta: Option<PageMeta>,
    #[serde(default)]
    islands: Vec<String>,
    #[serde(default = "default_true")]
    has_default: bool,
}

fn default_true() -> bool {
    true
}

/// Executes compiled page modules with Node.js.
pub struct NodeRuntime {
    node: String,
    harness: PathBuf,
    root: PathBuf,
}

impl NodeRuntime {
    #[must_use]
    pub fn new(node: impl Into<String>, harness: PathBuf, root: PathBuf) -> Self {
        Self {
            node: node.into(),
            harness,
            root,
        }
    }
}

impl PageRuntime for NodeRuntime {
    fn render(
        &self,
        module: &CompiledModule,
        ctx: &mut RenderContext,
    ) -> Result<Rendered, RenderError> {
        let scratch = tempfile::Builder::new()
            .prefix(".isle-render-")
            .suffix(".mjs")
            .tempfile_in(&self.root)?;
        fs::write(scratch.path(), &module.code)?;

        let output = Command::new(&self.node)
            .arg(&self.harness)
            .arg(scratch.path())
            .current_dir(&self.root)
            .output()
            .map_err(|source| RenderError::Spawn {
                program: self.node.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_output(&output.stdout, ctx)
    }
}

fn parse_output(stdout: &[u8], ctx: &mut RenderContext) -> Result<Rendered, RenderError> {
    let parsed: HarnessOutput = serde_json::from_slice(stdout)?;
    if !parsed.has_default {
        return Err(RenderError::NoDefaultExport);
    }
    for source in &parsed.islands {
        ctx.register_island(source);
    }
    Ok(Rendered {
        html: parsed.html,
        meta: parsed.meta.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_registers_islands() {
        let mut ctx = RenderContext::new();
        let rendered = parse_output(
            br#"{"html":"<p>hi</p>","meta":{"title":"Home"},"islands":["./a.ts","./b.ts"]}"#,
            &mut ctx,
        )
        .unwrap();

        assert_eq!(rendered.html, "<p>hi</p>");
        assert_eq!(rendered.meta["title"], "Home");
        assert_eq!(ctx.islands(), ["./a.ts", "./b.ts"]);
    }

    #[test]
    fn test_parse_output_missing_default_export() {
        let mut ctx = RenderContext::new();
        let err = parse_output(br#"{"hasDefault":false}"#, &mut ctx).unwrap_err();
        assert!(matches!(err, RenderError::NoDefaultExport));
    }

    #[test]
    fn test_parse_output_null_meta() {
        let mut ctx = RenderContext::new();
        let rendered = parse_output(br#"{"html":"x","meta":null}"#, &mut ctx).unwrap();
        assert!(rendered.meta.is_empty());
    }

    #[test]
    fn test_parse_output_garbage_is_protocol_error() {
        let mut ctx = RenderContext::new();
        let err = parse_output(b"Error: boom", &mut ctx).unwrap_err();
        assert!(matches!(err, RenderError::Protocol(_)));
    }
}
