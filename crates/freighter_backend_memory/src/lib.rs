//! Volatile [`ManifestStore`] keeping every manifest in process memory.
//!
//! Layout is a map from repository name to a sorted map from target to [`Manifest`], all of it
//! behind one reader/writer lock. Nothing is persisted.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use freighter_core::registry::Reference;
use freighter_core::{validate_key, validate_repository, Error, Manifest, ManifestStore, Result};

type Repositories = HashMap<String, BTreeMap<String, Manifest>>;

#[derive(Default)]
pub struct MemoryManifestStore {
    manifests: RwLock<Repositories>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    type Error = Error;

    async fn get(&self, repository: &str, target: &str) -> Result<Manifest> {
        validate_key(repository, target)?;
        let manifests = self.manifests.read().await;

        let targets = manifests
            .get(repository)
            .ok_or_else(|| Error::NotFound(format!("repository {repository}")))?;
        targets
            .get(target)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("manifest {repository}:{target}")))
    }

    async fn put(&self, manifest: Manifest) -> Result<()> {
        validate_repository(&manifest.repository)?;
        let reference = Reference::parse(&manifest.target)?;
        let mut manifests = self.manifests.write().await;

        // digests and tags share one key space; later puts replace earlier ones
        tracing::debug!(
            repository = %manifest.repository,
            target = %manifest.target,
            digest = reference.is_digest(),
            size = manifest.size(),
            "storing manifest"
        );
        manifests
            .entry(manifest.repository.clone())
            .or_default()
            .insert(manifest.target.clone(), manifest);
        Ok(())
    }

    async fn delete(&self, repository: &str, target: &str) -> Result<()> {
        validate_key(repository, target)?;
        let mut manifests = self.manifests.write().await;

        if let Some(targets) = manifests.get_mut(repository) {
            targets.remove(target);
            if targets.is_empty() {
                manifests.remove(repository);
            }
        }
        Ok(())
    }

    async fn get_tags(&self, repository: &str) -> Result<Vec<String>> {
        validate_repository(repository)?;
        let manifests = self.manifests.read().await;

        match manifests.get(repository) {
            Some(targets) => Ok(targets.keys().cloned().collect()),
            None => Err(Error::NotFound(format!("repository {repository}"))),
        }
    }

    async fn exists(&self, repository: &str, target: &str) -> bool {
        let manifests = self.manifests.read().await;
        manifests
            .get(repository)
            .map(|targets| targets.contains_key(target))
            .unwrap_or(false)
    }

    async fn list_repositories(&self) -> Vec<String> {
        let manifests = self.manifests.read().await;
        let mut repositories: Vec<String> = manifests.keys().cloned().collect();
        repositories.sort();
        repositories
    }

    async fn manifests_for_repository(&self, repository: &str) -> Result<Option<Vec<Manifest>>> {
        validate_repository(repository)?;
        let manifests = self.manifests.read().await;

        Ok(manifests
            .get(repository)
            .map(|targets| targets.values().cloned().collect()))
    }
}
