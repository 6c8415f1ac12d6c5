//! Configuration management for isle.
//!
//! Parses `isle.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. All relative paths
//! resolve against the directory containing the config file.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Build mode
//!
//! The production/development switch resolves in this order:
//!
//! 1. `--production` / `--development` on the command line
//! 2. `ISLE_ENV`
//! 3. `NODE_ENV`
//!
//! Only the exact value `production` selects production mode.

use std::path::{Path, PathBuf};

use isle_cache::{BuildProfile, Mode};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override output directory.
    pub out_dir: Option<PathBuf>,
    /// Force production or development mode.
    pub mode: Option<Mode>,
    /// Force CSS purge on or off.
    pub purge: Option<bool>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "isle.toml";

/// Environment variables consulted for the build mode, highest priority first.
const MODE_ENV_VARS: [&str; 2] = ["ISLE_ENV", "NODE_ENV"];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project layout (paths are relative strings from TOML).
    project: ProjectConfigRaw,
    /// CSS pipeline configuration.
    pub css: CssConfig,
    /// External tool configuration (paths are relative strings from TOML).
    tools: ToolsConfigRaw,
    /// Dev server configuration.
    pub server: ServerConfig,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,
    /// Hot rebuild configuration.
    hot: HotConfigRaw,

    /// Resolved project configuration (set after loading).
    #[serde(skip)]
    pub project_resolved: ProjectConfig,
    /// Resolved tool configuration (set after loading).
    #[serde(skip)]
    pub tools_resolved: ToolsConfig,
    /// Resolved hot rebuild configuration (set after loading).
    #[serde(skip)]
    pub hot_resolved: HotConfig,
    /// Resolved build mode (set after loading).
    #[serde(skip)]
    pub mode: Option<Mode>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw project configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProjectConfigRaw {
    source_dir: Option<String>,
    pages_dir: Option<String>,
    out_dir: Option<String>,
    cache_file: Option<String>,
    page_extensions: Option<Vec<String>>,
}

/// Resolved project layout with absolute paths.
#[derive(Debug, Default, Clone)]
pub struct ProjectConfig {
    /// Project root (directory of `isle.toml`).
    pub root: PathBuf,
    /// Source root; island specifiers resolve against it.
    pub source_dir: PathBuf,
    /// Directory scanned for page modules.
    pub pages_dir: PathBuf,
    /// Output directory.
    pub out_dir: PathBuf,
    /// Build manifest location.
    pub cache_file: PathBuf,
    /// File extensions that make a file a page module.
    pub page_extensions: Vec<String>,
}

/// CSS pipeline configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CssConfig {
    /// Explicit purge override (default: purge in production only).
    pub purge: Option<bool>,
    /// Class tokens that always survive purging.
    pub keep: Vec<String>,
    /// Packages whose CSS is wrapped in the library cascade layer.
    pub library_packages: Vec<String>,
    /// Name of the library cascade layer.
    pub library_layer: String,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            purge: None,
            keep: Vec::new(),
            library_packages: vec!["@isle/ui".to_owned()],
            library_layer: "library".to_owned(),
        }
    }
}

/// Raw tool configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ToolsConfigRaw {
    esbuild: Option<String>,
    node: Option<String>,
    render_harness: Option<String>,
    optimizer: Option<Vec<String>>,
}

/// Resolved external tool configuration.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Bundler program.
    pub esbuild: String,
    /// JavaScript runtime program.
    pub node: String,
    /// Script that executes a compiled page module and prints its render result.
    pub render_harness: PathBuf,
    /// Production optimizing compiler argv (stdin to stdout).
    pub optimizer: Option<Vec<String>>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            esbuild: "esbuild".to_owned(),
            node: "node".to_owned(),
            render_harness: PathBuf::from("node_modules/@isle/core/render.mjs"),
            optimizer: None,
        }
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 4173,
        }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// Event-stream endpoint path.
    pub path: String,
    /// Quiet period before a reload is pushed.
    pub debounce_ms: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/__isle/reload".to_owned(),
            debounce_ms: 100,
        }
    }
}

/// Raw hot rebuild configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HotConfigRaw {
    watch_packages: Option<Vec<String>>,
    debounce_ms: Option<u64>,
}

/// Resolved hot rebuild configuration.
#[derive(Debug, Clone)]
pub struct HotConfig {
    /// Installed packages watched in addition to the source directory.
    pub watch_packages: Vec<PathBuf>,
    /// Quiet period before a rebuild is triggered.
    pub debounce_ms: u64,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            watch_packages: default_watch_packages()
                .iter()
                .map(PathBuf::from)
                .collect(),
            debounce_ms: 150,
        }
    }
}

fn default_watch_packages() -> [&'static str; 2] {
    ["node_modules/@isle/ui", "node_modules/@isle/core"]
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `isle.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }
        if config.mode.is_none() {
            config.mode = Some(mode_from_env(|name| std::env::var(name).ok()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(out_dir) = &settings.out_dir {
            self.project_resolved.out_dir = self.project_resolved.root.join(out_dir);
        }
        if let Some(mode) = settings.mode {
            self.mode = Some(mode);
        }
        if let Some(purge) = settings.purge {
            self.css.purge = Some(purge);
        }
        if let Some(live_reload_enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = live_reload_enabled;
        }
    }

    /// Resolved build mode (development until resolved).
    #[must_use]
    pub fn build_mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Development)
    }

    /// Whether CSS purging runs: explicit override, else production only.
    #[must_use]
    pub fn purge_enabled(&self) -> bool {
        self.css
            .purge
            .unwrap_or_else(|| self.build_mode().is_production())
    }

    /// Global build parameters used to validate the build cache.
    #[must_use]
    pub fn build_profile(&self) -> BuildProfile {
        BuildProfile::new(self.build_mode(), self.purge_enabled(), &self.css.keep)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            project: ProjectConfigRaw::default(),
            css: CssConfig::default(),
            tools: ToolsConfigRaw::default(),
            server: ServerConfig::default(),
            live_reload: LiveReloadConfig::default(),
            hot: HotConfigRaw::default(),
            project_resolved: ProjectConfig::default(),
            tools_resolved: ToolsConfig::default(),
            hot_resolved: HotConfig::default(),
            mode: None,
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        if !self.live_reload.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "live_reload.path must start with /".to_owned(),
            ));
        }

        require_non_empty(&self.css.library_layer, "css.library_layer")?;
        if self.project_resolved.page_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "project.page_extensions cannot be empty".to_owned(),
            ));
        }
        if let Some(argv) = &self.tools_resolved.optimizer
            && argv.is_empty()
        {
            return Err(ConfigError::Validation(
                "tools.optimizer cannot be an empty command".to_owned(),
            ));
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.project_resolved = ProjectConfig {
            root: config_dir.to_path_buf(),
            source_dir: resolve(self.project.source_dir.as_deref(), "src"),
            pages_dir: resolve(self.project.pages_dir.as_deref(), "src/pages"),
            out_dir: resolve(self.project.out_dir.as_deref(), "dist"),
            cache_file: resolve(self.project.cache_file.as_deref(), ".isle-cache.json"),
            page_extensions: self.project.page_extensions.clone().unwrap_or_else(|| {
                ["tsx", "jsx", "ts", "js"]
                    .iter()
                    .map(|ext| (*ext).to_owned())
                    .collect()
            }),
        };

        let defaults = ToolsConfig::default();
        self.tools_resolved = ToolsConfig {
            esbuild: self.tools.esbuild.clone().unwrap_or(defaults.esbuild),
            node: self.tools.node.clone().unwrap_or(defaults.node),
            render_harness: config_dir.join(
                self.tools
                    .render_harness
                    .as_deref()
                    .map_or(defaults.render_harness, PathBuf::from),
            ),
            optimizer: self.tools.optimizer.clone(),
        };

        let packages = self.hot.watch_packages.clone().unwrap_or_else(|| {
            default_watch_packages()
                .iter()
                .map(|p| (*p).to_owned())
                .collect()
        });
        self.hot_resolved = HotConfig {
            watch_packages: packages.iter().map(|p| config_dir.join(p)).collect(),
            debounce_ms: self
                .hot
                .debounce_ms
                .unwrap_or(HotConfig::default().debounce_ms),
        };
    }
}

/// Resolve the build mode from environment lookups.
fn mode_from_env(lookup: impl Fn(&str) -> Option<String>) -> Mode {
    MODE_ENV_VARS
        .iter()
        .find_map(|name| lookup(name))
        .filter(|value| value == "production")
        .map_or(Mode::Development, |_| Mode::Production)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4173);
        assert_eq!(config.project_resolved.source_dir, PathBuf::from("/test/src"));
        assert_eq!(
            config.project_resolved.pages_dir,
            PathBuf::from("/test/src/pages")
        );
        assert_eq!(config.project_resolved.out_dir, PathBuf::from("/test/dist"));
        assert_eq!(
            config.project_resolved.cache_file,
            PathBuf::from("/test/.isle-cache.json")
        );
        assert_eq!(
            config.project_resolved.page_extensions,
            vec!["tsx", "jsx", "ts", "js"]
        );
        assert_eq!(
            config.hot_resolved.watch_packages,
            vec![
                PathBuf::from("/test/node_modules/@isle/ui"),
                PathBuf::from("/test/node_modules/@isle/core")
            ]
        );
        assert!(config.live_reload.enabled);
        assert_eq!(config.live_reload.path, "/__isle/reload");
        assert_eq!(config.css.library_layer, "library");
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 4173);
        assert!(config.css.keep.is_empty());
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[project]
source_dir = "app"
pages_dir = "app/routes"
out_dir = "public"

[tools]
render_harness = "scripts/render.mjs"
optimizer = ["terser", "--compress"]

[hot]
watch_packages = ["../shared"]
debounce_ms = 300
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.project_resolved.source_dir, PathBuf::from("/project/app"));
        assert_eq!(
            config.project_resolved.pages_dir,
            PathBuf::from("/project/app/routes")
        );
        assert_eq!(config.project_resolved.out_dir, PathBuf::from("/project/public"));
        assert_eq!(
            config.tools_resolved.render_harness,
            PathBuf::from("/project/scripts/render.mjs")
        );
        assert_eq!(
            config.tools_resolved.optimizer,
            Some(vec!["terser".to_owned(), "--compress".to_owned()])
        );
        assert_eq!(config.tools_resolved.esbuild, "esbuild");
        assert_eq!(
            config.hot_resolved.watch_packages,
            vec![PathBuf::from("/project/../shared")]
        );
        assert_eq!(config.hot_resolved.debounce_ms, 300);
    }

    #[test]
    fn test_parse_css_config() {
        let toml = r#"
[css]
purge = true
keep = ["active", "open"]
library_packages = ["@acme/kit"]
library_layer = "kit"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.css.purge, Some(true));
        assert_eq!(config.css.keep, vec!["active", "open"]);
        assert_eq!(config.css.library_packages, vec!["@acme/kit"]);
        assert_eq!(config.css.library_layer, "kit");
    }

    #[test]
    fn test_mode_from_env() {
        assert_eq!(mode_from_env(|_| None), Mode::Development);
        assert_eq!(
            mode_from_env(|name| (name == "NODE_ENV").then(|| "production".to_owned())),
            Mode::Production
        );
        assert_eq!(
            mode_from_env(|name| (name == "NODE_ENV").then(|| "staging".to_owned())),
            Mode::Development
        );
    }

    #[test]
    fn test_isle_env_takes_precedence_over_node_env() {
        let mode = mode_from_env(|name| match name {
            "ISLE_ENV" => Some("development".to_owned()),
            "NODE_ENV" => Some("production".to_owned()),
            _ => None,
        });
        assert_eq!(mode, Mode::Development);
    }

    #[test]
    fn test_purge_defaults_to_production() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.mode = Some(Mode::Development);
        assert!(!config.purge_enabled());

        config.mode = Some(Mode::Production);
        assert!(config.purge_enabled());

        config.css.purge = Some(false);
        assert!(!config.purge_enabled());
    }

    #[test]
    fn test_build_profile_reflects_keep_list() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.mode = Some(Mode::Production);
        let before = config.build_profile();

        config.css.keep.push("active".to_owned());
        let after = config.build_profile();

        assert_eq!(before.mode, Mode::Production);
        assert!(before.purge);
        assert_ne!(before.class_keep_hash, after.class_keep_hash);
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            port: Some(9000),
            out_dir: Some(PathBuf::from("build")),
            mode: Some(Mode::Production),
            purge: Some(false),
            live_reload_enabled: Some(false),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.project_resolved.out_dir, PathBuf::from("/test/build"));
        assert_eq!(config.build_mode(), Mode::Production);
        assert!(!config.purge_enabled());
        assert!(!config.live_reload.enabled);
    }

    #[test]
    fn test_apply_cli_settings_absolute_out_dir() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings {
            out_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        });
        assert_eq!(config.project_resolved.out_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_live_reload_path() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.live_reload.path = "reload".to_owned();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_empty_optimizer() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.tools_resolved.optimizer = Some(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/isle.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_explicit_file_with_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("isle.toml");
        std::fs::write(&path, "[server]\nport = 8000\n").unwrap();

        let settings = CliSettings {
            mode: Some(Mode::Development),
            ..Default::default()
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.config_path, Some(path));
        assert_eq!(config.project_resolved.root, tmp.path());
        assert_eq!(config.build_mode(), Mode::Development);
    }
}
