//! Configuration management for the LiveReload server.
//!
//! Parses `livereload.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `client.script`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override client script file.
    pub script: Option<PathBuf>,
    /// Override watched directory (also enables watching).
    pub watch_dir: Option<PathBuf>,
    /// Override watch enabled flag.
    pub watch_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "livereload.toml";

/// Default port of the LiveReload protocol.
pub const DEFAULT_PORT: u16 = 35729;

/// Default debounce window for the file watcher.
const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Route configuration.
    pub routes: RoutesConfig,
    /// Client script configuration (paths are relative strings from TOML).
    client: ClientConfigRaw,
    /// Watcher configuration (paths are relative strings from TOML).
    watch: WatchConfigRaw,

    /// Resolved client configuration (set after loading).
    #[serde(skip)]
    pub client_resolved: ClientConfig,
    /// Resolved watcher configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
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
    /// Server name announced to clients (`None` uses the server crate name).
    pub name: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: DEFAULT_PORT,
            name: None,
        }
    }
}

/// Route configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path at which WebSocket upgrades are accepted.
    pub upgrade_path: String,
    /// Path at which the client script is served.
    pub script_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            upgrade_path: "/livereload".to_owned(),
            script_path: "/livereload.js".to_owned(),
        }
    }
}

/// Raw client configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ClientConfigRaw {
    script: Option<String>,
}

/// Resolved client configuration.
#[derive(Debug, Default)]
pub struct ClientConfig {
    /// Client script file (`None` uses the bundled script).
    pub script: Option<PathBuf>,
}

/// Raw watcher configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
    patterns: Option<Vec<String>>,
    debounce_ms: Option<u64>,
}

/// Resolved watcher configuration with absolute paths.
#[derive(Debug)]
pub struct WatchConfig {
    /// Whether file watching is enabled.
    pub enabled: bool,
    /// Directory to watch.
    pub dir: PathBuf,
    /// Glob patterns (relative to `dir`) that trigger reloads.
    pub patterns: Vec<String>,
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("."),
            patterns: default_watch_patterns(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn default_watch_patterns() -> Vec<String> {
    vec!["**/*".to_owned()]
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
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`LIVERELOAD_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a route field to be an absolute URL path.
fn require_route(value: &str, field: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Validation(format!("{field} must start with /")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `livereload.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails, or
    /// the resulting configuration is invalid.
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
            config.validate()?;
        }

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
        if let Some(script) = &settings.script {
            self.client_resolved.script = Some(script.clone());
        }
        if let Some(dir) = &settings.watch_dir {
            self.watch_resolved.dir.clone_from(dir);
            self.watch_resolved.enabled = true;
        }
        if let Some(enabled) = settings.watch_enabled {
            self.watch_resolved.enabled = enabled;
        }
    }

    /// Server name override, if configured.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.server.name.as_deref()
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
        Self {
            server: ServerConfig::default(),
            routes: RoutesConfig::default(),
            client: ClientConfigRaw::default(),
            watch: WatchConfigRaw::default(),
            client_resolved: ClientConfig::default(),
            watch_resolved: WatchConfig {
                dir: base.to_path_buf(),
                ..WatchConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_routes()?;
        self.validate_watch()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but browsers
        // could never find the server again
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        if let Some(name) = &self.server.name {
            require_non_empty(name, "server.name")?;
        }

        Ok(())
    }

    /// Validate route configuration.
    fn validate_routes(&self) -> Result<(), ConfigError> {
        require_route(&self.routes.upgrade_path, "routes.upgrade_path")?;
        require_route(&self.routes.script_path, "routes.script_path")?;

        if self.routes.upgrade_path == self.routes.script_path {
            return Err(ConfigError::Validation(
                "routes.upgrade_path and routes.script_path must differ".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate watcher configuration.
    fn validate_watch(&self) -> Result<(), ConfigError> {
        const MAX_DEBOUNCE_MS: u64 = 10_000;

        let watch = &self.watch_resolved;
        if watch.patterns.is_empty() {
            return Err(ConfigError::Validation(
                "watch.patterns cannot be empty".to_owned(),
            ));
        }
        for pattern in &watch.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("watch.patterns: invalid glob {pattern:?}: {e}"))
            })?;
        }
        if watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref script) = self.client.script {
            self.client.script = Some(expand::expand_env(script, "client.script")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.client_resolved = ClientConfig {
            script: self.client.script.as_deref().map(|s| config_dir.join(s)),
        };

        self.watch_resolved = WatchConfig {
            enabled: self.watch.enabled.unwrap_or(false),
            dir: config_dir.join(self.watch.dir.as_deref().unwrap_or(".")),
            patterns: self
                .watch
                .patterns
                .clone()
                .unwrap_or_else(default_watch_patterns),
            debounce_ms: self.watch.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 35729);
        assert_eq!(config.server_name(), None);
        assert_eq!(config.routes.upgrade_path, "/livereload");
        assert_eq!(config.routes.script_path, "/livereload.js");
        assert_eq!(config.client_resolved.script, None);
        assert!(!config.watch_resolved.enabled);
        assert_eq!(config.watch_resolved.dir, PathBuf::from("/test"));
        assert_eq!(config.watch_resolved.patterns, vec!["**/*".to_owned()]);
        assert_eq!(config.watch_resolved.debounce_ms, 100);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 35729);
        assert_eq!(config.routes.upgrade_path, "/livereload");
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 35730
name = "my-reloader"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 35730);
        assert_eq!(config.server_name(), Some("my-reloader"));
    }

    #[test]
    fn test_parse_routes_config() {
        let toml = r#"
[routes]
upgrade_path = "/ws"
script_path = "/assets/lr.js"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.routes.upgrade_path, "/ws");
        assert_eq!(config.routes.script_path, "/assets/lr.js");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[client]
script = "vendor/livereload.js"

[watch]
enabled = true
dir = "site"
patterns = ["**/*.css", "**/*.html"]
debounce_ms = 250
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.client_resolved.script,
            Some(PathBuf::from("/project/vendor/livereload.js"))
        );
        assert!(config.watch_resolved.enabled);
        assert_eq!(config.watch_resolved.dir, PathBuf::from("/project/site"));
        assert_eq!(
            config.watch_resolved.patterns,
            vec!["**/*.css".to_owned(), "**/*.html".to_owned()]
        );
        assert_eq!(config.watch_resolved.debounce_ms, 250);
    }

    #[test]
    fn test_resolve_paths_defaults() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.client_resolved.script, None);
        assert!(!config.watch_resolved.enabled);
        assert_eq!(config.watch_resolved.dir, PathBuf::from("/project/."));
    }

    #[test]
    fn test_apply_cli_settings_host_and_port() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            port: Some(9000),
            ..Default::default()
        };

        config.apply_cli_settings(&settings);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_apply_cli_settings_script() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            script: Some(PathBuf::from("/custom/livereload.js")),
            ..Default::default()
        };

        config.apply_cli_settings(&settings);

        assert_eq!(
            config.client_resolved.script,
            Some(PathBuf::from("/custom/livereload.js"))
        );
    }

    #[test]
    fn test_apply_cli_settings_watch_dir_enables_watch() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            watch_dir: Some(PathBuf::from("/site")),
            ..Default::default()
        };

        config.apply_cli_settings(&settings);

        assert!(config.watch_resolved.enabled);
        assert_eq!(config.watch_resolved.dir, PathBuf::from("/site"));
    }

    #[test]
    fn test_apply_cli_settings_watch_disabled_wins() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            watch_dir: Some(PathBuf::from("/site")),
            watch_enabled: Some(false),
            ..Default::default()
        };

        config.apply_cli_settings(&settings);

        assert!(!config.watch_resolved.enabled);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 35729);
        assert!(!config.watch_resolved.enabled);
    }

    #[test]
    fn test_expand_env_vars_server_host() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LIVERELOAD_TEST_HOST", "0.0.0.0");
        }

        let toml = r#"
[server]
host = "${LIVERELOAD_TEST_HOST}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.server.host, "0.0.0.0");

        unsafe {
            std::env::remove_var("LIVERELOAD_TEST_HOST");
        }
    }

    #[test]
    fn test_expand_env_vars_client_script_default() {
        let toml = r#"
[client]
script = "${LIVERELOAD_TEST_SCRIPT_UNSET:-vendor/livereload.js}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.client_resolved.script,
            Some(PathBuf::from("/project/vendor/livereload.js"))
        );
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LIVERELOAD_TEST_MISSING");
        }

        let toml = r#"
[server]
host = "${LIVERELOAD_TEST_MISSING}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("LIVERELOAD_TEST_MISSING"));
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_server_host_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.host = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_server_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_server_name_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.name = Some(String::new());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.name"));
    }

    #[test]
    fn test_validate_route_without_leading_slash() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.routes.upgrade_path = "livereload".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("routes.upgrade_path"));
    }

    #[test]
    fn test_validate_routes_must_differ() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.routes.script_path = "/livereload".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_validate_watch_patterns_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.patterns.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.patterns"));
    }

    #[test]
    fn test_validate_watch_patterns_invalid_glob() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.patterns = vec!["[unclosed".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid glob"));
    }

    #[test]
    fn test_validate_debounce_too_high() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.debounce_ms = 60_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.debounce_ms"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.toml");

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 35800

[client]
script = "js/livereload.js"

[watch]
enabled = true
dir = "public"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 35800);
        assert_eq!(
            config.client_resolved.script,
            Some(dir.path().join("js/livereload.js"))
        );
        assert_eq!(config.watch_resolved.dir, dir.path().join("public"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_cli_settings_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.toml");
        std::fs::write(&path, "[server]\nport = 35800\n").unwrap();
        let settings = CliSettings {
            port: Some(35900),
            ..Default::default()
        };

        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(config.server.port, 35900);
    }

    #[test]
    fn test_load_cli_settings_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.toml");
        std::fs::write(&path, "").unwrap();
        let settings = CliSettings {
            port: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
