//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `USERHUB_BIND_ADDR`: HTTP listen address (required)
//! - `USERHUB_DB_PATH`: Database file path (required)
//! - `USERHUB_DB_POOL_SIZE`: Connection pool size (default 8)
//! - `USERHUB_UPLOAD_DIR`: Avatar directory (default `public/uploads`)
//! - `USERHUB_UPLOAD_PUBLIC_PREFIX`: Avatar reference prefix (default `/uploads`)
//! - `USERHUB_UPLOAD_TIMEOUT_SECS`: Storage write bound (default 10)
//! - `SUPABASE_URL`: Identity provider base URL (required)
//! - `SUPABASE_ANON_KEY`: Identity provider public API key (required)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./userhub.json` or `./userhub.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use userhub_domain::{
    AccountError, Config, DatabaseConfig, IdentityConfig, Result, ServerConfig, UploadConfig,
};

const DEFAULT_POOL_SIZE: u32 = 8;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `AccountError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Required variables must be present; the rest fall back to defaults.
///
/// # Errors
/// Returns `AccountError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let bind_addr = env_var("USERHUB_BIND_ADDR")?;
    let db_path = env_var("USERHUB_DB_PATH")?;
    let identity_url = env_var("SUPABASE_URL")?;
    let anon_key = env_var("SUPABASE_ANON_KEY")?;

    let pool_size = env_parse("USERHUB_DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;

    let upload_defaults = UploadConfig::default();
    let uploads = UploadConfig {
        dir: env_or("USERHUB_UPLOAD_DIR", upload_defaults.dir),
        public_prefix: env_or("USERHUB_UPLOAD_PUBLIC_PREFIX", upload_defaults.public_prefix),
        write_timeout_secs: env_parse(
            "USERHUB_UPLOAD_TIMEOUT_SECS",
            upload_defaults.write_timeout_secs,
        )?,
    };

    let config = Config {
        server: ServerConfig { bind_addr },
        database: DatabaseConfig { path: db_path, pool_size },
        uploads,
        identity: IdentityConfig { url: identity_url, anon_key },
    };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `AccountError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AccountError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AccountError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AccountError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AccountError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AccountError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(AccountError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Reject values that would only fail later at bind or connect time.
fn validate(config: &Config) -> Result<()> {
    if config.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(AccountError::Config(format!(
            "Invalid bind address: {}",
            config.server.bind_addr
        )));
    }
    url::Url::parse(&config.identity.url)
        .map_err(|e| AccountError::Config(format!("Invalid SUPABASE_URL: {}", e)))?;
    if config.identity.anon_key.trim().is_empty() {
        return Err(AccountError::Config("Identity provider anon key is empty".to_string()));
    }
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("userhub.json"),
        dir.join("userhub.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `AccountError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        AccountError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AccountError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 8] = [
        "USERHUB_BIND_ADDR",
        "USERHUB_DB_PATH",
        "USERHUB_DB_POOL_SIZE",
        "USERHUB_UPLOAD_DIR",
        "USERHUB_UPLOAD_PUBLIC_PREFIX",
        "USERHUB_UPLOAD_TIMEOUT_SECS",
        "SUPABASE_URL",
        "SUPABASE_ANON_KEY",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn set_required() {
        std::env::set_var("USERHUB_BIND_ADDR", "0.0.0.0:8080");
        std::env::set_var("USERHUB_DB_PATH", "/tmp/userhub-test.db");
        std::env::set_var("SUPABASE_URL", "https://project.supabase.co");
        std::env::set_var("SUPABASE_ANON_KEY", "anon-key");
    }

    #[test]
    fn test_load_from_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();

        let config = load_from_env().expect("config should load from env");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database.path, "/tmp/userhub-test.db");
        assert_eq!(config.database.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.uploads.public_prefix, "/uploads");
        assert_eq!(config.uploads.write_timeout_secs, 10);
        assert_eq!(config.identity.anon_key, "anon-key");

        clear_env();
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("USERHUB_DB_POOL_SIZE", "3");
        std::env::set_var("USERHUB_UPLOAD_DIR", "/var/lib/userhub/avatars");
        std::env::set_var("USERHUB_UPLOAD_TIMEOUT_SECS", "2");

        let config = load_from_env().expect("config should load from env");
        assert_eq!(config.database.pool_size, 3);
        assert_eq!(config.uploads.dir, "/var/lib/userhub/avatars");
        assert_eq!(config.uploads.write_timeout_secs, 2);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, AccountError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("USERHUB_DB_POOL_SIZE", "not-a-number");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, AccountError::Config(ref msg) if msg.contains("USERHUB_DB_POOL_SIZE")));

        clear_env();
    }

    #[test]
    fn test_load_from_env_rejects_bad_bind_addr() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("USERHUB_BIND_ADDR", "localhost");

        assert!(matches!(load_from_env(), Err(AccountError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "server": { "bind_addr": "127.0.0.1:4000" },
            "database": { "path": "test.db", "pool_size": 4 },
            "identity": { "url": "http://localhost:54321", "anon_key": "k" }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("Should load config from JSON file");
        assert_eq!(config.server.bind_addr, "127.0.0.1:4000");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.uploads.dir, "public/uploads");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
            [server]
            bind_addr = "127.0.0.1:4000"

            [database]
            path = "test.db"
            pool_size = 2

            [uploads]
            dir = "avatars"
            public_prefix = "/static/avatars"
            write_timeout_secs = 5

            [identity]
            url = "http://localhost:54321"
            anon_key = "k"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("Should load config from TOML file");
        assert_eq!(config.uploads.public_prefix, "/static/avatars");
        assert_eq!(config.uploads.write_timeout_secs, 5);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/userhub.json")));
        assert!(matches!(result, Err(AccountError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("", Path::new("config.yaml"));
        assert!(matches!(result, Err(AccountError::Config(_))));
    }
}
