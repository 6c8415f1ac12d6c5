//! esbuild-backed [`Compiler`].
//!
//! Each compilation bundles the entry into a scratch directory together with
//! a metafile. The metafile's `inputs` are the transitive file set; inputs
//! ending in `.css` are read back from disk as the collected CSS entries.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};

use super::{CompiledModule, Compiler, CssEntry, Target};
use crate::error::CompileError;

/// The subset of esbuild's metafile we read.
#[derive(Deserialize)]
struct Metafile {
    inputs: InputKeys,
}

/// Metafile input paths in bundle order (CSS cascade order depends on it).
struct InputKeys(Vec<String>);

impl<'de> Deserialize<'de> for InputKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = InputKeys;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of input paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<InputKeys, A::Error> {
                let mut keys = Vec::new();
                while let Some((key, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                    keys.push(key);
                }
                Ok(InputKeys(keys))
            }
        }

        deserializer.deserialize_map(KeysVisitor)
    }
}

/// Bundles modules by invoking the `esbuild` executable.
pub struct EsbuildCompiler {
    program: String,
    /// Working directory; metafile input paths are relative to it.
    root: PathBuf,
    minify: bool,
}

impl EsbuildCompiler {
    #[must_use]
    pub fn new(program: impl Into<String>, root: PathBuf) -> Self {
        Self {
            program: program.into(),
            root,
            minify: false,
        }
    }

    /// Minify browser bundles (production).
    #[must_use]
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    fn args(&self, entry: &Path, target: &Target, outfile: &Path, metafile: &Path) -> Vec<String> {
        let mut args = vec![
            entry.display().to_string(),
            "--bundle".to_owned(),
            format!("--outfile={}", outfile.display()),
            format!("--metafile={}", metafile.display()),
            "--log-level=error".to_owned(),
        ];
        match target {
            Target::Server => {
                args.push("--format=esm".to_owned());
                args.push("--platform=node".to_owned());
            }
            Target::Browser { global_name } => {
                args.push("--format=iife".to_owned());
                args.push("--platform=browser".to_owned());
                args.push(format!("--global-name={global_name}"));
                if self.minify {
                    args.push("--minify".to_owned());
                }
            }
        }
        args
    }

    /// Convert metafile input keys to absolute paths, skipping virtual modules.
    fn input_paths(&self, metafile: &Metafile) -> Vec<PathBuf> {
        metafile
            .inputs
            .0
            .iter()
            .filter(|key| !is_virtual_input(key))
            .map(|key| self.root.join(key))
            .collect()
    }
}

/// Namespaced or synthetic inputs (`<stdin>`, `(disabled):fs`, `ns:path`).
fn is_virtual_input(key: &str) -> bool {
    key.starts_with('<')
        || key.starts_with('(')
        || (!Path::new(key).is_absolute() && key.contains(':'))
}

impl Compiler for EsbuildCompiler {
    fn compile(&self, entry: &Path, target: &Target) -> Result<CompiledModule, CompileError> {
        // Scratch space inside the project so emitted code resolves node_modules.
        let scratch = tempfile::Builder::new()
            .prefix(".isle-build-")
            .tempdir_in(&self.root)?;
        let outfile = scratch.path().join(match target {
            Target::Server => "module.mjs",
            Target::Browser { .. } => "bundle.js",
        });
        let metafile_path = scratch.path().join("meta.json");

        let output = Command::new(&self.program)
            .args(self.args(entry, target, &outfile, &metafile_path))
            .current_dir(&self.root)
            .output()
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                entry: entry.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let code = fs::read_to_string(&outfile)?;
        let metafile: Metafile = serde_json::from_str(&fs::read_to_string(&metafile_path)?)?;

        let mut dependencies = self.input_paths(&metafile);
        if !dependencies.iter().any(|p| p == entry) {
            dependencies.push(entry.to_path_buf());
        }

        let css = dependencies
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "css"))
            .map(|path| {
                fs::read_to_string(path).map(|content| CssEntry {
                    path: path.clone(),
                    content,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledModule {
            entry: entry.to_path_buf(),
            code,
            css,
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args() {
        let compiler = EsbuildCompiler::new("esbuild", PathBuf::from("/p"));
        let args = compiler.args(
            Path::new("/p/src/pages/index.tsx"),
            &Target::Server,
            Path::new("/tmp/out.mjs"),
            Path::new("/tmp/meta.json"),
        );

        assert_eq!(args[0], "/p/src/pages/index.tsx");
        assert!(args.contains(&"--bundle".to_owned()));
        assert!(args.contains(&"--format=esm".to_owned()));
        assert!(args.contains(&"--metafile=/tmp/meta.json".to_owned()));
        assert!(!args.iter().any(|a| a.starts_with("--global-name")));
    }

    #[test]
    fn test_browser_args_minify_only_when_enabled() {
        let target = Target::Browser {
            global_name: "__isle_abc".to_owned(),
        };
        let plain = EsbuildCompiler::new("esbuild", PathBuf::from("/p"));
        let args = plain.args(Path::new("a.ts"), &target, Path::new("o"), Path::new("m"));
        assert!(args.contains(&"--format=iife".to_owned()));
        assert!(args.contains(&"--global-name=__isle_abc".to_owned()));
        assert!(!args.contains(&"--minify".to_owned()));

        let minified = plain.with_minify(true);
        let args = minified.args(Path::new("a.ts"), &target, Path::new("o"), Path::new("m"));
        assert!(args.contains(&"--minify".to_owned()));
    }

    #[test]
    fn test_input_paths_skip_virtual_modules() {
        let compiler = EsbuildCompiler::new("esbuild", PathBuf::from("/p"));
        let metafile: Metafile = serde_json::from_str(
            r#"{"inputs": {
                "src/pages/index.tsx": {"bytes": 10},
                "src/styles/site.css": {"bytes": 5},
                "(disabled):fs": {"bytes": 0},
                "<stdin>": {"bytes": 0}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            compiler.input_paths(&metafile),
            vec![
                PathBuf::from("/p/src/pages/index.tsx"),
                PathBuf::from("/p/src/styles/site.css"),
            ]
        );
    }

    #[test]
    fn test_input_paths_keep_bundle_order() {
        let compiler = EsbuildCompiler::new("esbuild", PathBuf::from("/p"));
        let metafile: Metafile = serde_json::from_str(
            r#"{"inputs": {"z.css": {}, "a.css": {}, "m.ts": {}}}"#,
        )
        .unwrap();

        assert_eq!(
            compiler.input_paths(&metafile),
            vec![
                PathBuf::from("/p/z.css"),
                PathBuf::from("/p/a.css"),
                PathBuf::from("/p/m.ts"),
            ]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = EsbuildCompiler::new("isle-no-such-bundler", tmp.path().to_path_buf());

        let err = compiler
            .compile(&tmp.path().join("a.ts"), &Target::Server)
            .unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
    }
}
