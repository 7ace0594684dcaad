//! Pushes a directory entry into the external CRM as a contact.
//!
//! The CRM speaks a GoHighLevel-style REST API: `POST {api_url}/contacts/`
//! with a bearer key. A missing key is not an error; the caller gets a
//! `success: false` outcome and no request is made.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::CrmConfig;
use crate::models::Agent;

pub const CONTACT_SOURCE: &str = "Atlas Directory";

#[derive(Debug, Error)]
pub enum CrmError {
    /// The CRM rejected the API key (401/403).
    #[error("CRM rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    /// Non-2xx answer other than an auth failure.
    #[error("CRM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("CRM request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CrmOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Splits "First Middle Last" into ("First", "Middle Last").
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

pub fn contact_payload(agent: &Agent) -> Value {
    let (first_name, last_name) = split_name(&agent.full_name);
    json!({
        "firstName": first_name,
        "lastName": last_name,
        "email": agent.email.as_deref().unwrap_or_default(),
        "phone": agent.phone.as_deref().unwrap_or_default(),
        "companyName": agent.brokerage.as_deref().unwrap_or_default(),
        "website": agent.website.as_deref().unwrap_or_default(),
        "tags": agent.tags,
        "source": CONTACT_SOURCE,
    })
}

pub async fn add_contact(
    client: &reqwest::Client,
    config: &CrmConfig,
    agent: &Agent,
) -> Result<CrmOutcome, CrmError> {
    let Some(api_key) = config.resolved_api_key() else {
        return Ok(CrmOutcome {
            success: false,
            contact_id: None,
            message: Some("CRM API key not configured".to_string()),
        });
    };

    let url = format!("{}/contacts/", config.api_url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&contact_payload(agent))
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status == 401 || status == 403 {
        tracing::warn!(status, "CRM rejected contact push");
        return Err(CrmError::Unauthorized(status));
    }
    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CrmError::Status { status, body });
    }

    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let contact_id = body
        .pointer("/contact/id")
        .or_else(|| body.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    tracing::info!(agent_id = %agent.id, contact_id = ?contact_id, "contact pushed to CRM");
    Ok(CrmOutcome {
        success: true,
        contact_id,
        message: None,
    })
}
