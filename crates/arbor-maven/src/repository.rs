//! Remote repositories: URL layout and per-kind update policies.

use arbor_core::artifact::{Artifact, Metadata, MetadataNature};
use arbor_core::config::RepositoryConfig;

use crate::local::{artifact_layout, metadata_layout};
use crate::policy;

/// Maven Central base URL.
pub const MAVEN_CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";

/// Whether a repository serves one kind of version, and how often to check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPolicy {
    pub enabled: bool,
    pub update_policy: String,
}

impl Default for RepositoryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            update_policy: policy::DAILY.to_string(),
        }
    }
}

/// A remote repository with separate policies for releases and snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub id: String,
    pub url: String,
    pub releases: RepositoryPolicy,
    pub snapshots: RepositoryPolicy,
}

impl RemoteRepository {
    /// A repository serving releases and snapshots, both checked daily.
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.trim_end_matches('/').to_string(),
            releases: RepositoryPolicy::default(),
            snapshots: RepositoryPolicy::default(),
        }
    }

    pub fn maven_central() -> Self {
        Self::new("central", MAVEN_CENTRAL_URL)
    }

    pub fn from_config(id: &str, config: &RepositoryConfig) -> Self {
        Self {
            releases: RepositoryPolicy {
                enabled: config.releases,
                update_policy: config.release_policy.clone(),
            },
            snapshots: RepositoryPolicy {
                enabled: config.snapshots,
                update_policy: config.snapshot_policy.clone(),
            },
            ..Self::new(id, &config.url)
        }
    }

    pub fn with_snapshots(mut self, snapshots: RepositoryPolicy) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn with_releases(mut self, releases: RepositoryPolicy) -> Self {
        self.releases = releases;
        self
    }

    /// Identity of the repository in tracking records.
    pub fn key(&self) -> &str {
        &self.url
    }

    pub fn policy(&self, snapshot: bool) -> &RepositoryPolicy {
        if snapshot {
            &self.snapshots
        } else {
            &self.releases
        }
    }

    /// The enabled policies relevant to metadata of the given nature.
    pub fn metadata_policies(&self, nature: MetadataNature) -> Vec<&RepositoryPolicy> {
        let policies = match nature {
            MetadataNature::Release => vec![&self.releases],
            MetadataNature::Snapshot => vec![&self.snapshots],
            MetadataNature::ReleaseOrSnapshot => vec![&self.releases, &self.snapshots],
        };
        policies.into_iter().filter(|p| p.enabled).collect()
    }

    pub fn artifact_url(&self, artifact: &Artifact) -> String {
        format!("{}/{}", self.url, artifact_layout(artifact))
    }

    pub fn metadata_url(&self, metadata: &Metadata) -> String {
        format!("{}/{}", self.url, metadata_layout(metadata))
    }
}
