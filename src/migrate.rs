use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates all tables and seeds the tag list. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool, &config.directory.default_tags).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool, default_tags: &[String]) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            brokerage TEXT,
            phone TEXT,
            email TEXT,
            website TEXT,
            service_area_type TEXT NOT NULL DEFAULT 'city',
            service_area TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            rating TEXT,
            address_last_deal TEXT,
            submitted_by TEXT,
            notes TEXT,
            profile_image TEXT,
            latitude REAL,
            longitude REAL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            content TEXT NOT NULL,
            rating INTEGER CHECK (rating IS NULL OR (rating >= 1 AND rating <= 5)),
            created_at INTEGER NOT NULL,
            FOREIGN KEY (agent_id) REFERENCES agents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suggestions (
            id TEXT PRIMARY KEY,
            agent_id TEXT,
            suggestion_type TEXT NOT NULL,
            content TEXT NOT NULL,
            submitter_name TEXT,
            submitter_email TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Seeding only happens the first time the table is created, so an admin
    // emptying the list is not undone on the next start.
    let tags_exist: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='tags'",
    )
    .fetch_one(pool)
    .await?;

    if !tags_exist {
        sqlx::query(
            r#"
            CREATE TABLE tags (
                name TEXT PRIMARY KEY,
                position INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        for (position, name) in default_tags.iter().enumerate() {
            sqlx::query("INSERT OR IGNORE INTO tags (name, position) VALUES (?, ?)")
                .bind(name)
                .bind(position as i64)
                .execute(pool)
                .await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_agent_id ON comments(agent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_agents_created_at ON agents(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
