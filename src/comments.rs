//! Reviews left on an agent's directory entry.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::agents::agent_exists;
use crate::error::{invalid, StoreError, StoreResult};
use crate::models::{format_ts_iso, Comment, NewComment};

pub async fn create_comment(pool: &SqlitePool, new: NewComment) -> StoreResult<Comment> {
    let author_name = new.author_name.trim().to_string();
    let content = new.content.trim().to_string();
    if author_name.is_empty() {
        return Err(invalid("author_name must not be empty"));
    }
    if content.is_empty() {
        return Err(invalid("content must not be empty"));
    }
    if let Some(rating) = new.rating {
        if !(1..=5).contains(&rating) {
            return Err(invalid("rating must be between 1 and 5"));
        }
    }
    if !agent_exists(pool, &new.agent_id).await? {
        return Err(StoreError::NotFound(format!("agent {}", new.agent_id)));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO comments (id, agent_id, author_name, content, rating, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new.agent_id)
    .bind(&author_name)
    .bind(&content)
    .bind(new.rating)
    .bind(created_at)
    .execute(pool)
    .await?;

    tracing::debug!(agent_id = %new.agent_id, comment_id = %id, "comment added");
    Ok(Comment {
        id,
        agent_id: new.agent_id,
        author_name,
        content,
        rating: new.rating,
        created_at: format_ts_iso(created_at),
    })
}

/// Comments for one agent, newest first.
pub async fn list_comments(pool: &SqlitePool, agent_id: &str) -> StoreResult<Vec<Comment>> {
    if !agent_exists(pool, agent_id).await? {
        return Err(StoreError::NotFound(format!("agent {}", agent_id)));
    }

    let rows = sqlx::query(
        "SELECT id, agent_id, author_name, content, rating, created_at FROM comments WHERE agent_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Comment {
            id: row.get("id"),
            agent_id: row.get("agent_id"),
            author_name: row.get("author_name"),
            content: row.get("content"),
            rating: row.get("rating"),
            created_at: format_ts_iso(row.get("created_at")),
        })
        .collect())
}
