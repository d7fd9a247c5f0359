//! Artifact source seam.
//!
//! The module store is read as a point-in-time snapshot: fetch every
//! identifier newer than the cutoff, then close. It is never treated
//! as a live cursor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quarry_protocol::ArtifactId;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;
use tracing::{info, warn};

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Identifiers present in the store at or after `cutoff`, most
    /// recent first.
    async fn artifacts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ArtifactId>>;
}

/// Postgres-backed module store.
pub struct PgArtifactSource {
    url: String,
}

impl PgArtifactSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ArtifactSource for PgArtifactSource {
    async fn artifacts_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ArtifactId>> {
        info!("Connecting to module store...");
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await
            .context("Failed to connect to module store")?;

        let rows = sqlx::query(
            "SELECT md5hash FROM storefiles \
             WHERE present_locally = TRUE AND timestamp >= $1 \
             ORDER BY timestamp DESC",
        )
        .bind(cutoff)
        .fetch_all(&pool)
        .await
        .context("Module store query failed")?;

        pool.close().await;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let digest: Vec<u8> = row.get("md5hash");
            match ArtifactId::parse(&hex::encode(digest)) {
                Ok(id) => ids.push(id),
                Err(err) => warn!(error = %err, "Skipping malformed module store identifier"),
            }
        }
        Ok(ids)
    }
}
