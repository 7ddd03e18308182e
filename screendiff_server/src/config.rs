// Server configuration, read from `SCREENDIFF_*` environment variables.
//
// Parsing goes through a lookup closure so tests can feed their own values
// without touching the process environment.

use std::path::PathBuf;
use thiserror::Error;

pub const ENV_BIND: &str = "SCREENDIFF_BIND";
pub const ENV_SCREENSHOTS_DIR: &str = "SCREENDIFF_SCREENSHOTS_DIR";
pub const ENV_OUTPUT_DIR: &str = "SCREENDIFF_OUTPUT_DIR";
pub const ENV_MAX_CONCURRENT: &str = "SCREENDIFF_MAX_CONCURRENT";
pub const ENV_SAVE_ARTIFACTS: &str = "SCREENDIFF_SAVE_ARTIFACTS";

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_OUTPUT_DIR: &str = "diff_images";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Root that relative request paths are resolved against.
    pub screenshots_dir: Option<PathBuf>,
    /// Where generated artifacts are written when a request asks to save them.
    pub output_dir: PathBuf,
    /// Upper bound on diffs computed at the same time.
    pub max_concurrent_diffs: usize,
    /// Save every artifact, not only those whose request sets `save`.
    pub save_artifacts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            screenshots_dir: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_concurrent_diffs: num_cpus::get().max(1),
            save_artifacts: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(bind) = get(ENV_BIND) {
            cfg.bind_addr = bind;
        }
        if let Some(dir) = get(ENV_SCREENSHOTS_DIR) {
            cfg.screenshots_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(ENV_MAX_CONCURRENT) {
            cfg.max_concurrent_diffs = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError {
                        key: ENV_MAX_CONCURRENT,
                        value: raw,
                        reason: "expected a positive integer",
                    });
                }
            };
        }
        if let Some(raw) = get(ENV_SAVE_ARTIFACTS) {
            cfg.save_artifacts = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError {
                        key: ENV_SAVE_ARTIFACTS,
                        value: raw,
                        reason: "expected a boolean",
                    });
                }
            };
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
        assert_eq!(cfg.output_dir, PathBuf::from("diff_images"));
        assert!(cfg.screenshots_dir.is_none());
        assert!(cfg.max_concurrent_diffs >= 1);
        assert!(!cfg.save_artifacts);
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_SCREENSHOTS_DIR, "/srv/screenshots"),
            (ENV_OUTPUT_DIR, "/srv/diffs"),
            (ENV_MAX_CONCURRENT, "3"),
            (ENV_SAVE_ARTIFACTS, "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.screenshots_dir, Some(PathBuf::from("/srv/screenshots")));
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/diffs"));
        assert_eq!(cfg.max_concurrent_diffs, 3);
        assert!(cfg.save_artifacts);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[(ENV_BIND, "  ")])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
    }

    #[test]
    fn bad_values_are_reported_with_their_key() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_MAX_CONCURRENT, "0")])).unwrap_err();
        assert_eq!(err.key, ENV_MAX_CONCURRENT);

        let err = ServerConfig::from_lookup(lookup(&[(ENV_SAVE_ARTIFACTS, "maybe")])).unwrap_err();
        assert_eq!(err.key, ENV_SAVE_ARTIFACTS);
        assert_eq!(err.value, "maybe");
    }
}
