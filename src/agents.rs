//! Agent records: create, list, fetch, update, delete.
//!
//! Creation and identity-changing updates run the enrichment pipeline before
//! the row is written. Enrichment never fails the write; at worst the agent
//! is stored without a profile image.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::DirectoryConfig;
use crate::enrich::{EnrichmentRequest, Pipeline};
use crate::error::{invalid, StoreError, StoreResult};
use crate::geocode;
use crate::models::{clean, format_ts_iso, Agent, AgentFilter, AgentPatch, NewAgent};
use crate::ratings;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// Stored form of an agent, before timestamps are formatted.
#[derive(Clone)]
struct AgentRecord {
    id: String,
    full_name: String,
    brokerage: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    service_area_type: String,
    service_area: Option<String>,
    tags: Vec<String>,
    rating: Option<String>,
    address_last_deal: Option<String>,
    submitted_by: Option<String>,
    notes: Option<String>,
    profile_image: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: i64,
    updated_at: i64,
}

impl AgentRecord {
    fn from_row(row: &SqliteRow) -> StoreResult<Self> {
        let tags_json: String = row.get("tags_json");
        Ok(Self {
            id: row.get("id"),
            full_name: row.get("full_name"),
            brokerage: row.get("brokerage"),
            phone: row.get("phone"),
            email: row.get("email"),
            website: row.get("website"),
            service_area_type: row.get("service_area_type"),
            service_area: row.get("service_area"),
            tags: serde_json::from_str(&tags_json)?,
            rating: row.get("rating"),
            address_last_deal: row.get("address_last_deal"),
            submitted_by: row.get("submitted_by"),
            notes: row.get("notes"),
            profile_image: row.get("profile_image"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn into_agent(self) -> Agent {
        Agent {
            id: self.id,
            full_name: self.full_name,
            brokerage: self.brokerage,
            phone: self.phone,
            email: self.email,
            website: self.website,
            service_area_type: self.service_area_type,
            service_area: self.service_area,
            tags: self.tags,
            rating: self.rating,
            address_last_deal: self.address_last_deal,
            submitted_by: self.submitted_by,
            notes: self.notes,
            profile_image: self.profile_image,
            latitude: self.latitude,
            longitude: self.longitude,
            created_at: format_ts_iso(self.created_at),
            updated_at: format_ts_iso(self.updated_at),
        }
    }

    fn enrichment_request(&self) -> EnrichmentRequest {
        EnrichmentRequest::new(
            &self.full_name,
            self.website.as_deref(),
            self.service_area.as_deref().unwrap_or_default(),
        )
    }

    fn validate(&self, directory: &DirectoryConfig) -> StoreResult<()> {
        if self.full_name.is_empty() {
            return Err(invalid("full_name must not be empty"));
        }
        if !directory.is_service_area_type(&self.service_area_type) {
            return Err(invalid(format!(
                "unknown service_area_type '{}' (expected one of: {})",
                self.service_area_type,
                directory.service_area_types.join(", ")
            )));
        }
        if let Some(rating) = &self.rating {
            if directory.rating_level(rating).is_none() {
                return Err(invalid(format!("unknown rating level '{}'", rating)));
            }
        }
        match (self.latitude, self.longitude) {
            (Some(lat), _) if !(-90.0..=90.0).contains(&lat) => {
                Err(invalid("latitude must be within [-90, 90]"))
            }
            (_, Some(lng)) if !(-180.0..=180.0).contains(&lng) => {
                Err(invalid("longitude must be within [-180, 180]"))
            }
            _ => Ok(()),
        }
    }

    /// Fills missing coordinates from the static place table.
    fn locate(&mut self) {
        if self.latitude.is_some() && self.longitude.is_some() {
            return;
        }
        if let Some(loc) = self.service_area.as_deref().and_then(geocode::lookup) {
            self.latitude = Some(loc.latitude);
            self.longitude = Some(loc.longitude);
        }
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub async fn create_agent(
    pool: &SqlitePool,
    directory: &DirectoryConfig,
    pipeline: &Pipeline,
    new: NewAgent,
) -> StoreResult<Agent> {
    let now = Utc::now().timestamp();
    let mut record = AgentRecord {
        id: uuid::Uuid::new_v4().to_string(),
        full_name: new.full_name.trim().to_string(),
        brokerage: clean(new.brokerage),
        phone: clean(new.phone),
        email: clean(new.email),
        website: clean(new.website),
        service_area_type: new.service_area_type.trim().to_string(),
        service_area: clean(new.service_area),
        tags: clean_tags(new.tags),
        rating: clean(new.rating),
        address_last_deal: clean(new.address_last_deal),
        submitted_by: clean(new.submitted_by),
        notes: clean(new.notes),
        profile_image: clean(new.profile_image),
        latitude: new.latitude,
        longitude: new.longitude,
        created_at: now,
        updated_at: now,
    };
    record.validate(directory)?;

    if record.profile_image.is_none() {
        record.profile_image = pipeline.run(&record.enrichment_request()).await.image;
    }
    record.locate();

    sqlx::query(
        r#"
        INSERT INTO agents (
            id, full_name, brokerage, phone, email, website, service_area_type,
            service_area, tags_json, rating, address_last_deal, submitted_by, notes,
            profile_image, latitude, longitude, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.full_name)
    .bind(record.brokerage.as_deref())
    .bind(record.phone.as_deref())
    .bind(record.email.as_deref())
    .bind(record.website.as_deref())
    .bind(&record.service_area_type)
    .bind(record.service_area.as_deref())
    .bind(serde_json::to_string(&record.tags)?)
    .bind(record.rating.as_deref())
    .bind(record.address_last_deal.as_deref())
    .bind(record.submitted_by.as_deref())
    .bind(record.notes.as_deref())
    .bind(record.profile_image.as_deref())
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    tracing::info!(
        agent_id = %record.id,
        has_image = record.profile_image.is_some(),
        "agent created"
    );
    Ok(record.into_agent())
}

pub async fn list_agents(
    pool: &SqlitePool,
    directory: &DirectoryConfig,
    filter: &AgentFilter,
) -> StoreResult<Vec<Agent>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM agents WHERE 1 = 1");

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        qb.push(" AND (LOWER(full_name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(brokerage, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(service_area, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(agents.tags_json) WHERE json_each.value = ")
            .push_bind(tag.to_string())
            .push(")");
    }

    if let Some(area) = filter.service_area.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        qb.push(" AND LOWER(service_area) = ")
            .push_bind(area.to_lowercase());
    }

    if let Some(min) = filter.min_rating.as_deref().filter(|m| !m.is_empty()) {
        let keys = ratings::keys_at_or_above(directory, min)
            .ok_or_else(|| invalid(format!("unknown rating level '{}'", min)))?;
        qb.push(" AND rating IN (");
        let mut keys_sep = qb.separated(", ");
        for key in keys {
            keys_sep.push_bind(key);
        }
        keys_sep.push_unseparated(")");
    }

    if let Some(who) = filter.submitted_by.as_deref().filter(|w| !w.is_empty()) {
        qb.push(" AND submitted_by = ").push_bind(who.to_string());
    }

    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
        .push_bind(limit);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| AgentRecord::from_row(row).map(AgentRecord::into_agent))
        .collect()
}

async fn fetch_record<'e, E>(executor: E, id: &str) -> StoreResult<AgentRecord>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("agent {}", id)))?;
    AgentRecord::from_row(&row)
}

pub async fn get_agent(pool: &SqlitePool, id: &str) -> StoreResult<Agent> {
    Ok(fetch_record(pool, id).await?.into_agent())
}

pub async fn agent_exists(pool: &SqlitePool, id: &str) -> StoreResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM agents WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Applies a patch to a record in memory. Returns whether the patch
/// supplied coordinates.
fn apply_patch(record: &mut AgentRecord, patch: &AgentPatch) -> bool {
    if let Some(name) = &patch.full_name {
        record.full_name = name.trim().to_string();
    }
    if let Some(kind) = &patch.service_area_type {
        record.service_area_type = kind.trim().to_string();
    }
    if let Some(tags) = &patch.tags {
        record.tags = clean_tags(tags.clone());
    }
    let text_fields = [
        (&patch.brokerage, &mut record.brokerage),
        (&patch.phone, &mut record.phone),
        (&patch.email, &mut record.email),
        (&patch.website, &mut record.website),
        (&patch.service_area, &mut record.service_area),
        (&patch.rating, &mut record.rating),
        (&patch.address_last_deal, &mut record.address_last_deal),
        (&patch.submitted_by, &mut record.submitted_by),
        (&patch.notes, &mut record.notes),
    ];
    for (value, slot) in text_fields {
        if value.is_some() {
            *slot = clean(value.clone());
        }
    }
    if let Some(image) = &patch.profile_image {
        record.profile_image = clean(Some(image.clone()));
    }
    if patch.latitude.is_some() {
        record.latitude = patch.latitude;
    }
    if patch.longitude.is_some() {
        record.longitude = patch.longitude;
    }
    patch.latitude.is_some() || patch.longitude.is_some()
}

/// Enrichment result for a specific (name, website) pair.
struct Enriched {
    full_name: String,
    website: Option<String>,
    image: Option<String>,
}

pub async fn update_agent(
    pool: &SqlitePool,
    directory: &DirectoryConfig,
    pipeline: &Pipeline,
    id: &str,
    patch: AgentPatch,
) -> StoreResult<Agent> {
    // Enrichment can take up to the fetch timeout, so it runs against a
    // snapshot with no lock held. The patch is applied again to the current
    // row below.
    let snapshot = fetch_record(pool, id).await?;
    let mut preview = snapshot.clone();
    apply_patch(&mut preview, &patch);
    preview.validate(directory)?;

    let identity_changed =
        preview.full_name != snapshot.full_name || preview.website != snapshot.website;
    let enriched = if patch.profile_image.is_none() && identity_changed {
        tracing::debug!(agent_id = %id, "identity changed, re-running enrichment");
        let image = pipeline.run(&preview.enrichment_request()).await.image;
        Some(Enriched {
            full_name: preview.full_name,
            website: preview.website,
            image,
        })
    } else {
        None
    };

    let mut tx = pool.begin().await?;
    // Take the write lock before reading so no other writer can commit
    // between the read and the write.
    let locked = sqlx::query("UPDATE agents SET updated_at = updated_at WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if locked.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(StoreError::NotFound(format!("agent {}", id)));
    }

    let mut record = fetch_record(&mut *tx, id).await?;
    let old_area = record.service_area.clone();
    let coordinates_given = apply_patch(&mut record, &patch);
    record.validate(directory)?;

    if let Some(found) = enriched {
        if found.full_name == record.full_name && found.website == record.website {
            record.profile_image = found.image;
        }
    }

    if record.service_area != old_area && !coordinates_given {
        if let Some(loc) = record.service_area.as_deref().and_then(geocode::lookup) {
            record.latitude = Some(loc.latitude);
            record.longitude = Some(loc.longitude);
        }
    }

    record.updated_at = Utc::now().timestamp();
    write_record(&mut *tx, &record).await?;
    tx.commit().await?;

    tracing::info!(agent_id = %record.id, "agent updated");
    Ok(record.into_agent())
}

/// Re-runs enrichment for one agent and stores only the image column, so
/// edits made while the fetch is in flight are kept.
pub async fn refresh_profile_image(
    pool: &SqlitePool,
    pipeline: &Pipeline,
    id: &str,
) -> StoreResult<Agent> {
    let record = fetch_record(pool, id).await?;
    let image = pipeline.run(&record.enrichment_request()).await.image;
    set_profile_image(pool, id, image.as_deref()).await?;
    get_agent(pool, id).await
}

/// Stores an enrichment result without touching any other column.
pub async fn set_profile_image(
    pool: &SqlitePool,
    id: &str,
    image: Option<&str>,
) -> StoreResult<()> {
    let result = sqlx::query("UPDATE agents SET profile_image = ?, updated_at = ? WHERE id = ?")
        .bind(image)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("agent {}", id)));
    }
    Ok(())
}

async fn write_record<'e, E>(executor: E, record: &AgentRecord) -> StoreResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE agents SET
            full_name = ?, brokerage = ?, phone = ?, email = ?, website = ?,
            service_area_type = ?, service_area = ?, tags_json = ?, rating = ?,
            address_last_deal = ?, submitted_by = ?, notes = ?, profile_image = ?,
            latitude = ?, longitude = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.full_name)
    .bind(record.brokerage.as_deref())
    .bind(record.phone.as_deref())
    .bind(record.email.as_deref())
    .bind(record.website.as_deref())
    .bind(&record.service_area_type)
    .bind(record.service_area.as_deref())
    .bind(serde_json::to_string(&record.tags)?)
    .bind(record.rating.as_deref())
    .bind(record.address_last_deal.as_deref())
    .bind(record.submitted_by.as_deref())
    .bind(record.notes.as_deref())
    .bind(record.profile_image.as_deref())
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(record.updated_at)
    .bind(&record.id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete_agent(pool: &SqlitePool, id: &str) -> StoreResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM comments WHERE agent_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM agents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(StoreError::NotFound(format!("agent {}", id)));
    }
    tx.commit().await?;

    tracing::info!(agent_id = %id, "agent deleted");
    Ok(())
}

/// `(id, request)` pairs for agents that should be (re-)enriched.
pub async fn enrichment_backlog(
    pool: &SqlitePool,
    include_existing: bool,
) -> StoreResult<Vec<(String, EnrichmentRequest)>> {
    let sql = if include_existing {
        "SELECT * FROM agents ORDER BY created_at ASC"
    } else {
        "SELECT * FROM agents WHERE profile_image IS NULL ORDER BY created_at ASC"
    };
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            let record = AgentRecord::from_row(row)?;
            let request = record.enrichment_request();
            Ok((record.id, request))
        })
        .collect()
}
