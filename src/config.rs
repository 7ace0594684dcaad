//! TOML configuration.
//!
//! Everything the service used to keep in module-level globals (admin
//! password, default tags, rating table, service-area types) lives here and
//! is handed to the server at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub crm: CrmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// When unset, every admin request is rejected.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,
    #[serde(default = "default_service_area_types")]
    pub service_area_types: Vec<String>,
    #[serde(default = "default_rating_levels")]
    pub rating_levels: Vec<RatingLevel>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            default_tags: default_tags(),
            service_area_types: default_service_area_types(),
            rating_levels: default_rating_levels(),
        }
    }
}

/// One step of the agent rating scale. Higher `value` is better.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RatingLevel {
    pub key: String,
    pub label: String,
    pub description: String,
    pub color: String,
    pub value: i64,
}

fn default_tags() -> Vec<String> {
    [
        "Residential Sales",
        "Commercial Sales",
        "Luxury Properties",
        "First-Time Buyers",
        "Investment Properties",
        "New Construction",
        "Relocation",
        "Short Sales",
        "Foreclosures",
        "Property Management",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_service_area_types() -> Vec<String> {
    ["city", "county", "state", "zip"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_rating_levels() -> Vec<RatingLevel> {
    let level = |key: &str, label: &str, description: &str, color: &str, value: i64| RatingLevel {
        key: key.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        color: color.to_string(),
        value,
    };
    vec![
        level(
            "exceptional",
            "Exceptional",
            "A rockstar. Would send every client their way.",
            "#10b981",
            5,
        ),
        level(
            "great",
            "Great",
            "Responsive and professional, smooth transaction.",
            "#3b82f6",
            4,
        ),
        level(
            "average",
            "Average",
            "Got the deal done, nothing memorable.",
            "#f59e0b",
            3,
        ),
        level(
            "poor",
            "Poor",
            "Hard to reach or sloppy paperwork. Proceed with caution.",
            "#f97316",
            2,
        ),
        level(
            "blacklist",
            "Blacklist",
            "Would not touch with a ten-foot pole.",
            "#ef4444",
            1,
        ),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_per_host")]
    pub max_concurrent_per_host: usize,
    #[serde(default = "default_max_total")]
    pub max_concurrent_total: usize,
    /// 0 disables the negative-result cache.
    #[serde(default = "default_negative_ttl")]
    pub negative_cache_ttl_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_per_host: default_max_per_host(),
            max_concurrent_total: default_max_total(),
            negative_cache_ttl_secs: default_negative_ttl(),
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_max_per_host() -> usize {
    2
}
fn default_max_total() -> usize {
    8
}
fn default_negative_ttl() -> u64 {
    900
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string()
}
fn default_max_body_bytes() -> usize {
    2_000_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrmConfig {
    #[serde(default = "default_crm_url")]
    pub api_url: String,
    /// Falls back to the `GHL_API_KEY` environment variable when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_crm_timeout")]
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_url: default_crm_url(),
            api_key: None,
            timeout_secs: default_crm_timeout(),
        }
    }
}

fn default_crm_url() -> String {
    "https://rest.gohighlevel.com/v1".to_string()
}
fn default_crm_timeout() -> u64 {
    15
}

impl CrmConfig {
    /// The configured key, else `GHL_API_KEY`. An explicit blank
    /// `api_key = ""` disables the CRM and skips the environment lookup.
    pub fn resolved_api_key(&self) -> Option<String> {
        match &self.api_key {
            Some(key) => Some(key.trim().to_string()).filter(|k| !k.is_empty()),
            None => std::env::var("GHL_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        }
    }
}

impl DirectoryConfig {
    pub fn rating_level(&self, key: &str) -> Option<&RatingLevel> {
        self.rating_levels.iter().find(|l| l.key == key)
    }

    pub fn is_service_area_type(&self, kind: &str) -> bool {
        self.service_area_types.iter().any(|t| t == kind)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let e = &config.enrichment;
    if e.timeout_secs == 0 {
        anyhow::bail!("enrichment.timeout_secs must be > 0");
    }
    if e.max_concurrent_per_host == 0 {
        anyhow::bail!("enrichment.max_concurrent_per_host must be > 0");
    }
    if e.max_concurrent_total == 0 {
        anyhow::bail!("enrichment.max_concurrent_total must be > 0");
    }
    if e.max_body_bytes == 0 {
        anyhow::bail!("enrichment.max_body_bytes must be > 0");
    }

    let d = &config.directory;
    if d.service_area_types.is_empty() {
        anyhow::bail!("directory.service_area_types must not be empty");
    }
    let mut seen = HashSet::new();
    for level in &d.rating_levels {
        if level.key.trim().is_empty() {
            anyhow::bail!("directory.rating_levels: key must not be empty");
        }
        if !seen.insert(level.key.as_str()) {
            anyhow::bail!("directory.rating_levels: duplicate key '{}'", level.key);
        }
    }

    Ok(())
}
