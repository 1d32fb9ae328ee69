//! Concurrent artifact fetching driven by update checks.
//!
//! For each artifact the repositories are tried in order. A repository is
//! asked for the artifact only when the update check requires it; otherwise
//! the local copy is used or the cached failure is reported. Every transfer is
//! recorded with a touch so later checks see its outcome.

use std::path::PathBuf;
use std::sync::Arc;

use arbor_core::artifact::Artifact;
use arbor_util::errors::ArborError;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::local::LocalRepository;
use crate::repository::RemoteRepository;
use crate::session::RepositorySession;
use crate::transfer::TransferError;
use crate::update::{UpdateCheck, UpdateCheckManager};

const DEFAULT_CONCURRENCY: usize = 8;

/// Transport to a remote repository.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn get_artifact(
        &self,
        artifact: &Artifact,
        repository: &RemoteRepository,
    ) -> Result<Vec<u8>, TransferError>;
}

/// The outcome of fetching one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactResult {
    pub artifact: Artifact,
    /// Local file, if the artifact is available.
    pub path: Option<PathBuf>,
    /// Id of the repository the artifact was checked against last.
    pub repository: Option<String>,
    /// Failures from repositories tried, including cached ones.
    pub errors: Vec<TransferError>,
}

impl ArtifactResult {
    fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            path: None,
            repository: None,
            errors: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }
}

struct Shared {
    connector: Arc<dyn Connector>,
    manager: UpdateCheckManager,
    session: Arc<RepositorySession>,
    local: LocalRepository,
    repositories: Vec<RemoteRepository>,
}

pub struct ArtifactFetcher {
    shared: Arc<Shared>,
    concurrency: usize,
}

impl ArtifactFetcher {
    pub fn new(
        connector: Arc<dyn Connector>,
        session: Arc<RepositorySession>,
        local: LocalRepository,
        repositories: Vec<RemoteRepository>,
    ) -> Self {
        Self::with_manager(
            connector,
            UpdateCheckManager::default(),
            session,
            local,
            repositories,
        )
    }

    pub fn with_manager(
        connector: Arc<dyn Connector>,
        manager: UpdateCheckManager,
        session: Arc<RepositorySession>,
        local: LocalRepository,
        repositories: Vec<RemoteRepository>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                manager,
                session,
                local,
                repositories,
            }),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit how many artifacts are fetched at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn fetch(&self, artifact: Artifact) -> miette::Result<ArtifactResult> {
        fetch_one(&self.shared, artifact).await
    }

    /// Fetch every artifact concurrently. Results come back in input order.
    pub async fn fetch_all(&self, artifacts: Vec<Artifact>) -> miette::Result<Vec<ArtifactResult>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let count = artifacts.len();

        for (i, artifact) in artifacts.into_iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let sem = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.map_err(|e| ArborError::Generic {
                    message: format!("Fetch queue closed: {e}"),
                })?;
                fetch_one(&shared, artifact).await.map(|result| (i, result))
            });
        }

        let mut slots: Vec<Option<ArtifactResult>> = vec![None; count];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((i, result))) => slots[i] = Some(result),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(miette::miette!("Background task failed: {}", e)),
            }
        }

        let results: Vec<ArtifactResult> = slots.into_iter().flatten().collect();
        let resolved = results.iter().filter(|r| r.is_resolved()).count();
        tracing::info!("Fetched {resolved} of {count} artifacts");
        Ok(results)
    }
}

async fn fetch_one(shared: &Shared, artifact: Artifact) -> miette::Result<ArtifactResult> {
    let path = shared.local.artifact_path(&artifact);
    let mut result = ArtifactResult::new(artifact.clone());

    for repository in &shared.repositories {
        let Some(policy) = shared
            .manager
            .artifact_policy(&shared.session, repository, &artifact)
        else {
            tracing::trace!("{} does not serve {artifact}", repository.id);
            continue;
        };

        let mut check = UpdateCheck::new(artifact.clone(), repository.clone())
            .with_file(path.clone())
            .with_policy(&policy);
        shared.manager.check_artifact(&shared.session, &mut check)?;
        result.repository = Some(repository.id.clone());

        if !check.is_required() {
            if let Some(error) = check.exception.take() {
                result.errors.push(error);
                continue;
            }
            if path.is_file() {
                result.path = Some(path);
                return Ok(result);
            }
            continue;
        }

        tracing::debug!("Downloading {artifact} from {}", repository.id);
        match shared.connector.get_artifact(&artifact, repository).await {
            Ok(data) => {
                shared.local.put(&path, &data)?;
                shared.manager.touch_artifact(&shared.session, &check)?;
                result.path = Some(path);
                return Ok(result);
            }
            Err(error) => {
                tracing::debug!("{error}");
                check.exception = Some(error.clone());
                shared.manager.touch_artifact(&shared.session, &check)?;
                result.errors.push(error);
            }
        }
    }

    if result.path.is_none() {
        tracing::warn!("Could not fetch {artifact} from any repository");
    }
    Ok(result)
}
