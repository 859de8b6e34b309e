//! Postgres-backed metadata store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use strata_core::{ArtifactStatus, Config, FileArtifact, UserFileLink};

use crate::traits::{MetaError, MetaResult, MetadataStore};

/// Build the connection pool for the metadata store.
pub async fn connect_pool(config: &Config) -> MetaResult<PgPool> {
    tracing::info!("Connecting to metadata database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Apply pending migrations from the embedded `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> MetaResult<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| MetaError::Database(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}

#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_status(entity: &str, raw: &str) -> MetaResult<ArtifactStatus> {
    raw.parse().map_err(|reason| MetaError::Decode {
        entity: entity.to_string(),
        reason,
    })
}

fn artifact_from_row(row: &sqlx::postgres::PgRow) -> MetaResult<FileArtifact> {
    let status: String = row.try_get("status")?;
    let size: i64 = row.try_get("size")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(FileArtifact {
        content_hash: row.try_get("content_hash")?,
        size: size as u64,
        canonical_name: row.try_get("canonical_name")?,
        location: row.try_get("location")?,
        status: parse_status("file_artifacts", &status)?,
        created_at,
    })
}

fn link_from_row(row: &sqlx::postgres::PgRow) -> MetaResult<UserFileLink> {
    let status: String = row.try_get("status")?;
    let uploaded_at: DateTime<Utc> = row.try_get("uploaded_at")?;
    Ok(UserFileLink {
        username: row.try_get("username")?,
        content_hash: row.try_get("content_hash")?,
        display_name: row.try_get("display_name")?,
        uploaded_at,
        status: parse_status("user_file_links", &status)?,
    })
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn insert_artifact_if_absent(&self, artifact: &FileArtifact) -> MetaResult<bool> {
        // Dynamic SQLx queries to avoid requiring DATABASE_URL/sqlx prepare
        let result = sqlx::query(
            r#"
            INSERT INTO file_artifacts (content_hash, size, canonical_name, location, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (content_hash) DO NOTHING
            "#,
        )
        .bind(&artifact.content_hash)
        .bind(artifact.size as i64)
        .bind(&artifact.canonical_name)
        .bind(&artifact.location)
        .bind(artifact.status.as_str())
        .bind(artifact.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_artifact(&self, content_hash: &str) -> MetaResult<Option<FileArtifact>> {
        let row = sqlx::query(
            r#"
            SELECT content_hash, size, canonical_name, location, status, created_at
            FROM file_artifacts
            WHERE content_hash = $1
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }

    async fn upsert_user_link(&self, link: &UserFileLink) -> MetaResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_file_links (username, content_hash, display_name, uploaded_at, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username, content_hash)
            DO UPDATE SET display_name = EXCLUDED.display_name,
                          uploaded_at = EXCLUDED.uploaded_at,
                          status = EXCLUDED.status
            "#,
        )
        .bind(&link.username)
        .bind(&link.content_hash)
        .bind(&link.display_name)
        .bind(link.uploaded_at)
        .bind(link.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_artifact_location(
        &self,
        content_hash: &str,
        location: &str,
        status: ArtifactStatus,
    ) -> MetaResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE file_artifacts
            SET location = $2, status = $3
            WHERE content_hash = $1
            "#,
        )
        .bind(content_hash)
        .bind(location)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetaError::NotFound(format!("artifact {}", content_hash)));
        }
        Ok(())
    }

    async fn mark_removed(&self, username: &str, content_hash: &str) -> MetaResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_file_links
            SET status = $3
            WHERE username = $1 AND content_hash = $2
            "#,
        )
        .bind(username)
        .bind(content_hash)
        .bind(ArtifactStatus::Removed.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetaError::NotFound(format!(
                "link {}/{}",
                username, content_hash
            )));
        }
        Ok(())
    }

    async fn links_for_user(&self, username: &str) -> MetaResult<Vec<UserFileLink>> {
        let rows = sqlx::query(
            r#"
            SELECT username, content_hash, display_name, uploaded_at, status
            FROM user_file_links
            WHERE username = $1 AND status != $2
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(username)
        .bind(ArtifactStatus::Removed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(link_from_row).collect()
    }

    async fn rename_link(
        &self,
        username: &str,
        content_hash: &str,
        new_name: &str,
    ) -> MetaResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_file_links
            SET display_name = $3
            WHERE username = $1 AND content_hash = $2 AND status != $4
            "#,
        )
        .bind(username)
        .bind(content_hash)
        .bind(new_name)
        .bind(ArtifactStatus::Removed.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetaError::NotFound(format!(
                "link {}/{}",
                username, content_hash
            )));
        }
        Ok(())
    }
}
