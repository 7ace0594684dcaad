//! User-submitted corrections and new-contact tips, reviewed by admins.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error::{invalid, StoreResult};
use crate::models::{clean, format_ts_iso, NewSuggestion, Suggestion, SUGGESTION_TYPES};

pub async fn create_suggestion(pool: &SqlitePool, new: NewSuggestion) -> StoreResult<Suggestion> {
    let suggestion_type = new.suggestion_type.trim().to_string();
    if !SUGGESTION_TYPES.contains(&suggestion_type.as_str()) {
        return Err(invalid(format!(
            "unknown suggestion_type '{}' (expected one of: {})",
            suggestion_type,
            SUGGESTION_TYPES.join(", ")
        )));
    }
    let content = new.content.trim().to_string();
    if content.is_empty() {
        return Err(invalid("content must not be empty"));
    }

    let suggestion = Suggestion {
        id: uuid::Uuid::new_v4().to_string(),
        agent_id: clean(new.agent_id),
        suggestion_type,
        content,
        submitter_name: clean(new.submitter_name),
        submitter_email: clean(new.submitter_email),
        status: "pending".to_string(),
        created_at: String::new(),
    };
    let created_at = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO suggestions (
            id, agent_id, suggestion_type, content, submitter_name, submitter_email, status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&suggestion.id)
    .bind(suggestion.agent_id.as_deref())
    .bind(&suggestion.suggestion_type)
    .bind(&suggestion.content)
    .bind(suggestion.submitter_name.as_deref())
    .bind(suggestion.submitter_email.as_deref())
    .bind(&suggestion.status)
    .bind(created_at)
    .execute(pool)
    .await?;

    tracing::info!(suggestion_id = %suggestion.id, kind = %suggestion.suggestion_type, "suggestion submitted");
    Ok(Suggestion {
        created_at: format_ts_iso(created_at),
        ..suggestion
    })
}

/// All suggestions, newest first.
pub async fn list_suggestions(pool: &SqlitePool) -> StoreResult<Vec<Suggestion>> {
    let rows = sqlx::query("SELECT * FROM suggestions ORDER BY created_at DESC, rowid DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Suggestion {
            id: row.get("id"),
            agent_id: row.get("agent_id"),
            suggestion_type: row.get("suggestion_type"),
            content: row.get("content"),
            submitter_name: row.get("submitter_name"),
            submitter_email: row.get("submitter_email"),
            status: row.get("status"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}
