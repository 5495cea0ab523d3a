// src/config/mod.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::protocol::DEFAULT_PROTOCOL_VERSION;

pub const DEFAULT_SERVER_NAME: &str = "ZetMem MCP Server";
pub const DEFAULT_STRATEGY_GUIDE_PATH: &str = "ZETMEM_ONBOARDING_STRATEGY.md";
pub const DEFAULT_STRATEGY_GUIDE_MAX_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_STRATEGY_SUMMARY: &str = "This server follows the Zetmem strategic principles for AI collaboration. Key concepts include workspace-first organization, consistent memory management habits, and iterative development patterns. For comprehensive onboarding guidance, see the Zetmem Onboarding Strategy document at: ZETMEM_ONBOARDING_STRATEGY.md";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub log_level: String,
    /// Per-call deadline for tool execution; 0 disables it.
    pub tool_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            log_level: "info".to_string(),
            tool_timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingConfig {
    pub strategy_guide_path: PathBuf,
    pub max_file_size: u64,
    /// Sent as `strategyGuideSummary` with every tool listing.
    pub summary: String,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            strategy_guide_path: PathBuf::from(DEFAULT_STRATEGY_GUIDE_PATH),
            max_file_size: DEFAULT_STRATEGY_GUIDE_MAX_SIZE,
            summary: DEFAULT_STRATEGY_SUMMARY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    // 1. Load: environment first, then the optional JSON file on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_env();
        if let Some(path) = path {
            config = config.merge_file(path)?;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Values that do
    /// not parse keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let string = |key: &str, default: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(default);

        Config {
            server: ServerConfig {
                name: string("ZETMEM_SERVER_NAME", defaults.server.name),
                version: string("ZETMEM_SERVER_VERSION", defaults.server.version),
                protocol_version: string("ZETMEM_PROTOCOL_VERSION", defaults.server.protocol_version),
                log_level: string("ZETMEM_LOG_LEVEL", defaults.server.log_level),
                tool_timeout_secs: parsed(&lookup, "ZETMEM_TOOL_TIMEOUT_SECONDS")
                    .unwrap_or(defaults.server.tool_timeout_secs),
            },
            onboarding: OnboardingConfig {
                strategy_guide_path: lookup("ZETMEM_STRATEGY_GUIDE_PATH")
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.onboarding.strategy_guide_path),
                max_file_size: parsed(&lookup, "ZETMEM_STRATEGY_GUIDE_MAX_SIZE")
                    .unwrap_or(defaults.onboarding.max_file_size),
                summary: defaults.onboarding.summary,
            },
            monitoring: MonitoringConfig {
                enabled: lookup("ZETMEM_METRICS_ENABLED")
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(defaults.monitoring.enabled),
            },
        }
    }

    pub fn merge_file(self, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let overlay: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        self.merge_value(overlay)
    }

    /// Fields present in `overlay` replace ours; absent fields are kept.
    pub fn merge_value(self, overlay: Value) -> Result<Self> {
        let mut base = serde_json::to_value(&self)?;
        merge_json(&mut base, overlay);
        serde_json::from_value(base).context("Config file has invalid values")
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            bail!("server name is required");
        }
        if self.server.protocol_version.trim().is_empty() {
            bail!("protocol version is required");
        }
        if !LOG_LEVELS.contains(&self.server.log_level.as_str()) {
            bail!(
                "invalid log level '{}' (expected one of: {})",
                self.server.log_level,
                LOG_LEVELS.join(", ")
            );
        }
        if self.onboarding.max_file_size == 0 {
            bail!("strategy guide size limit must be positive");
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        match self.server.tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

// Same spellings Go's strconv.ParseBool accepts.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.server.protocol_version, "2024-11-05");
        assert_eq!(config.onboarding.max_file_size, 1024 * 1024);
        assert!(config.monitoring.enabled);
        assert_eq!(config.tool_timeout(), None);
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("ZETMEM_LOG_LEVEL", "debug"),
            ("ZETMEM_TOOL_TIMEOUT_SECONDS", "30"),
            ("ZETMEM_STRATEGY_GUIDE_PATH", "/etc/zetmem/guide.md"),
            ("ZETMEM_STRATEGY_GUIDE_MAX_SIZE", "2048"),
            ("ZETMEM_METRICS_ENABLED", "f"),
        ]));

        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.tool_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.onboarding.strategy_guide_path, PathBuf::from("/etc/zetmem/guide.md"));
        assert_eq!(config.onboarding.max_file_size, 2048);
        assert!(!config.monitoring.enabled);
    }

    #[test]
    fn unparsable_values_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("ZETMEM_TOOL_TIMEOUT_SECONDS", "soon"),
            ("ZETMEM_STRATEGY_GUIDE_MAX_SIZE", "-1"),
            ("ZETMEM_METRICS_ENABLED", "maybe"),
            ("ZETMEM_SERVER_NAME", ""),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overlay_replaces_only_what_it_names() {
        let config = Config::default()
            .merge_value(json!({
                "server": {"name": "Memory Box", "tool_timeout_secs": 5},
                "monitoring": {"enabled": false}
            }))
            .unwrap();

        assert_eq!(config.server.name, "Memory Box");
        assert_eq!(config.server.tool_timeout_secs, 5);
        assert_eq!(config.server.protocol_version, DEFAULT_PROTOCOL_VERSION);
        assert!(!config.monitoring.enabled);
        assert_eq!(config.onboarding, OnboardingConfig::default());
    }

    #[test]
    fn overlay_with_wrong_types_is_rejected() {
        let err = Config::default()
            .merge_value(json!({"server": {"tool_timeout_secs": "ten"}}))
            .unwrap_err();
        assert!(err.to_string().contains("invalid values"));
    }

    #[test]
    fn load_reads_a_json_file() {
        let path = std::env::temp_dir().join(format!("zetmem-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"onboarding": {"max_file_size": 4096}}"#).unwrap();
        let config = Config::default().merge_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.onboarding.max_file_size, 4096);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Config::default()
            .merge_file(Path::new("/no/such/zetmem.json"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        config.server.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.name = " ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.onboarding.max_file_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
