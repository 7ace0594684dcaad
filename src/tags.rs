//! The admin-curated tag vocabulary.

use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::StoreResult;

/// Current tags in display order.
pub async fn list_tags(pool: &SqlitePool) -> StoreResult<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM tags ORDER BY position ASC, name ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("name")).collect())
}

/// Replaces the whole vocabulary. Blank entries are dropped and duplicates
/// keep their first position. Agents keep whatever tags they already carry.
pub async fn replace_tags(pool: &SqlitePool, tags: &[String]) -> StoreResult<Vec<String>> {
    let mut cleaned: Vec<&str> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()) {
        if !tag.is_empty() && !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM tags").execute(&mut *tx).await?;
    for (position, name) in cleaned.iter().enumerate() {
        sqlx::query("INSERT INTO tags (name, position) VALUES (?, ?)")
            .bind(*name)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(count = cleaned.len(), "tag list replaced");
    list_tags(pool).await
}

/// Removes a tag from the vocabulary and from every agent carrying it.
/// Unknown tags are ignored. Returns the remaining tags.
pub async fn delete_tag(pool: &SqlitePool, name: &str) -> StoreResult<Vec<String>> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM tags WHERE name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    let tagged = sqlx::query(
        "SELECT id, tags_json FROM agents WHERE EXISTS (SELECT 1 FROM json_each(agents.tags_json) WHERE json_each.value = ?)",
    )
    .bind(name)
    .fetch_all(&mut *tx)
    .await?;

    for row in &tagged {
        let id: String = row.get("id");
        let tags_json: String = row.get("tags_json");
        let mut tags: Vec<String> = serde_json::from_str(&tags_json)?;
        tags.retain(|t| t != name);
        sqlx::query("UPDATE agents SET tags_json = ? WHERE id = ?")
            .bind(serde_json::to_string(&tags)?)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(tag = name, agents_updated = tagged.len(), "tag deleted");
    list_tags(pool).await
}

/// `atlas tags`: prints the vocabulary, one tag per line.
pub async fn run_tags(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let tags = list_tags(&pool).await?;
    pool.close().await;

    if tags.is_empty() {
        println!("No tags defined.");
    }
    for tag in tags {
        println!("{}", tag);
    }
    Ok(())
}
