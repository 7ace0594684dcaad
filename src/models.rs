//! Core data models for the directory.
//!
//! Request payloads (`NewAgent`, `AgentPatch`, `NewComment`, `NewSuggestion`)
//! are deserialized straight from HTTP bodies; the stored records are
//! serialized back out with ISO-8601 timestamps.

use serde::{Deserialize, Serialize};

/// A directory entry for one real-estate agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub full_name: String,
    pub brokerage: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub service_area_type: String,
    pub service_area: Option<String>,
    pub tags: Vec<String>,
    /// Key into the configured rating levels.
    pub rating: Option<String>,
    pub address_last_deal: Option<String>,
    pub submitted_by: Option<String>,
    pub notes: Option<String>,
    /// Absolute URL discovered by enrichment, or supplied by the submitter.
    pub profile_image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

/// Payload for creating an agent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewAgent {
    pub full_name: String,
    #[serde(default)]
    pub brokerage: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_service_area_type")]
    pub service_area_type: String,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub address_last_deal: Option<String>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn default_service_area_type() -> String {
    "city".to_string()
}

/// Partial update. `None` leaves a field untouched; an empty string clears
/// an optional text field.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentPatch {
    pub full_name: Option<String>,
    pub brokerage: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub service_area_type: Option<String>,
    pub service_area: Option<String>,
    pub tags: Option<Vec<String>>,
    pub rating: Option<String>,
    pub address_last_deal: Option<String>,
    pub submitted_by: Option<String>,
    pub notes: Option<String>,
    pub profile_image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Query filters for listing agents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub service_area: Option<String>,
    pub min_rating: Option<String>,
    pub submitted_by: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub agent_id: String,
    pub author_name: String,
    pub content: String,
    pub rating: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewComment {
    #[serde(alias = "professional_id")]
    pub agent_id: String,
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub id: String,
    pub agent_id: Option<String>,
    pub suggestion_type: String,
    pub content: String,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewSuggestion {
    #[serde(default)]
    pub agent_id: Option<String>,
    pub suggestion_type: String,
    pub content: String,
    #[serde(default)]
    pub submitter_name: Option<String>,
    #[serde(default)]
    pub submitter_email: Option<String>,
}

pub const SUGGESTION_TYPES: &[&str] = &["edit", "new_contact", "error_report"];

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Trims an optional text field, mapping blank to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
