use async_trait::async_trait;
use tokio::sync::RwLock;

use freighter_core::registry::Reference;
use freighter_core::{validate_key, validate_repository, Error as CoreError, Manifest, ManifestStore};

use super::errors::{Error, Result};
use super::metadata::{SqliteConfig, SqliteMetadataPool};

/// Durable [`ManifestStore`] persisting one row per `(repository, target)` in SQLite.
///
/// Every operation runs under a store-wide reader/writer lock, queries under the read half and
/// mutations under the write half, so multi-statement sequences never interleave even when the
/// pool hands out several connections.
pub struct SqliteManifestStore {
    metadata: SqliteMetadataPool,
    lock: RwLock<()>,
}

impl SqliteManifestStore {
    /// Connect using `config`, creating the database if needed and migrating its schema.
    pub async fn open(config: &SqliteConfig) -> Result<Self> {
        Ok(Self::new(config.new_metadata().await?))
    }

    pub fn new(metadata: SqliteMetadataPool) -> Self {
        Self {
            metadata,
            lock: RwLock::new(()),
        }
    }
}

#[async_trait]
impl ManifestStore for SqliteManifestStore {
    type Error = Error;

    async fn get(&self, repository: &str, target: &str) -> Result<Manifest> {
        validate_key(repository, target)?;
        let _guard = self.lock.read().await;

        let mut conn = self.metadata.get_conn().await?;
        match conn.get_manifest(repository, target).await? {
            Some(row) => Ok(row.into()),
            None => Err(CoreError::NotFound(format!("manifest {repository}:{target}")).into()),
        }
    }

    async fn put(&self, manifest: Manifest) -> Result<()> {
        validate_repository(&manifest.repository)?;
        let reference = Reference::parse(&manifest.target)?;
        let _guard = self.lock.write().await;

        tracing::debug!(
            repository = %manifest.repository,
            target = %manifest.target,
            digest = reference.is_digest(),
            size = manifest.size(),
            "storing manifest"
        );

        let mut tx = self.metadata.get_tx().await?;
        tx.upsert_manifest(&manifest).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn delete(&self, repository: &str, target: &str) -> Result<()> {
        validate_key(repository, target)?;
        let _guard = self.lock.write().await;

        let mut tx = self.metadata.get_tx().await?;
        let removed = tx.delete_manifest(repository, target).await?;
        tx.commit().await?;

        tracing::debug!(repository, target, removed, "deleted manifest");
        Ok(())
    }

    async fn get_tags(&self, repository: &str) -> Result<Vec<String>> {
        validate_repository(repository)?;
        let _guard = self.lock.read().await;

        let targets = self.metadata.get_conn().await?.get_targets(repository).await?;
        if targets.is_empty() {
            return Err(CoreError::NotFound(format!("repository {repository}")).into());
        }
        Ok(targets)
    }

    async fn exists(&self, repository: &str, target: &str) -> bool {
        if validate_key(repository, target).is_err() {
            return false;
        }
        let _guard = self.lock.read().await;

        let result = match self.metadata.get_conn().await {
            Ok(mut conn) => conn.manifest_exists(repository, target).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!("unable to check manifest {repository}:{target}: {e}");
            false
        })
    }

    async fn list_repositories(&self) -> Vec<String> {
        let _guard = self.lock.read().await;

        let result = match self.metadata.get_conn().await {
            Ok(mut conn) => conn.get_repositories().await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!("unable to list repositories: {e}");
            Vec::new()
        })
    }

    async fn manifests_for_repository(&self, repository: &str) -> Result<Option<Vec<Manifest>>> {
        validate_repository(repository)?;
        let _guard = self.lock.read().await;

        let rows = self.metadata.get_conn().await?.get_manifests(repository).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(Manifest::from).collect()))
    }
}
