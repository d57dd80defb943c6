//! Orchestrator configuration: env-driven toggles (`OrchestratorConfig`, the
//! `SovereignConfig` pattern) plus an optional on-disk credentials file (the
//! `UserConfig` pattern) for provider secrets that don't belong in the
//! process environment of a long-running daemon.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Loop cadences and cost/behavior toggles, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_scout_interval_secs")]
    pub scout_interval_secs: u64,
    #[serde(default = "default_tracker_interval_secs")]
    pub tracker_interval_secs: u64,
    #[serde(default = "default_engagement_interval_secs")]
    pub engagement_interval_secs: u64,
    #[serde(default = "default_feedback_interval_secs")]
    pub feedback_interval_secs: u64,
    #[serde(default = "default_review_interval_secs")]
    pub review_interval_secs: u64,

    /// Daily USD spend above which degradation kicks in. `0.0` disables
    /// cost-based mode switching entirely (always FULL).
    #[serde(default)]
    pub daily_cost_limit: f64,

    /// Skip automatic loop scheduling; only manual triggers run.
    #[serde(default)]
    pub demo_mode: bool,

    /// Re-run `SkillLibrary::load_all` on startup even if the in-memory
    /// cache would otherwise be empty-but-untouched.
    #[serde(default = "default_true")]
    pub seed_on_startup: bool,

    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default = "default_skill_library_path")]
    pub skill_library_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_scout_interval_secs() -> u64 {
    1800
}
fn default_tracker_interval_secs() -> u64 {
    3600
}
fn default_engagement_interval_secs() -> u64 {
    1800
}
fn default_feedback_interval_secs() -> u64 {
    86_400
}
fn default_review_interval_secs() -> u64 {
    604_800
}
fn default_storage_path() -> String {
    "./data".to_string()
}
fn default_skill_library_path() -> String {
    "./skills".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl OrchestratorConfig {
    /// Load toggles from environment. Unset or unparseable => defaults.
    pub fn from_env() -> Self {
        Self {
            scout_interval_secs: env_u64("PIPELINE_SCOUT_INTERVAL_SECS", default_scout_interval_secs()),
            tracker_interval_secs: env_u64("PIPELINE_TRACKER_INTERVAL_SECS", default_tracker_interval_secs()),
            engagement_interval_secs: env_u64("PIPELINE_ENGAGEMENT_INTERVAL_SECS", default_engagement_interval_secs()),
            feedback_interval_secs: env_u64("PIPELINE_FEEDBACK_INTERVAL_SECS", default_feedback_interval_secs()),
            review_interval_secs: env_u64("PIPELINE_REVIEW_INTERVAL_SECS", default_review_interval_secs()),
            daily_cost_limit: env_f64("PIPELINE_DAILY_COST_LIMIT", 0.0),
            demo_mode: env_bool("PIPELINE_DEMO_MODE", false),
            seed_on_startup: env_bool("PIPELINE_SEED_ON_STARTUP", true),
            storage_path: std::env::var("PIPELINE_STORAGE_PATH").unwrap_or_else(|_| default_storage_path()),
            skill_library_path: std::env::var("PIPELINE_SKILL_LIBRARY_PATH").unwrap_or_else(|_| default_skill_library_path()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level()),
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => v.trim().eq_ignore_ascii_case("true") || v.trim() == "1",
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Provider credentials and overrides, kept out of the environment so a
/// single `content_user_config.toml` can be rotated without restarting with
/// new env vars. Absent file or absent key => provider falls back to its own
/// default (usually the cost-free local stand-in).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default)]
    pub llm_api_url: Option<String>,
    #[serde(default)]
    pub image_provider: Option<String>,
    #[serde(default)]
    pub image_api_key: Option<String>,
}

impl ProviderCredentials {
    pub fn default_path() -> PathBuf {
        PathBuf::from("content_user_config.toml")
    }

    pub fn load() -> Self {
        Self::load_from_path(&Self::default_path())
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path).and_then(|raw| {
            toml::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not read provider credentials, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_file_yields_defaults() {
        let creds = ProviderCredentials::load_from_path(Path::new("/nonexistent/content_user_config.toml"));
        assert!(creds.llm_provider.is_none());
    }
}
