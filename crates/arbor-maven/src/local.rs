//! Local repository mirroring the Maven repository layout.

use std::path::{Path, PathBuf};

use arbor_core::artifact::{Artifact, Metadata};
use arbor_core::config::dirs_path;
use arbor_util::errors::ArborError;

use crate::repository::RemoteRepository;

/// `group/path/artifact/baseVersion/artifact-version[-classifier].ext`
///
/// Timestamped snapshots live in their `-SNAPSHOT` directory.
pub fn artifact_layout(artifact: &Artifact) -> String {
    let mut file = format!("{}-{}", artifact.artifact_id, artifact.version);
    if !artifact.classifier.is_empty() {
        file.push('-');
        file.push_str(&artifact.classifier);
    }
    if !artifact.extension.is_empty() {
        file.push('.');
        file.push_str(&artifact.extension);
    }
    format!(
        "{}/{}/{}/{file}",
        artifact.group_id.replace('.', "/"),
        artifact.artifact_id,
        artifact.base_version()
    )
}

/// Directory of a metadata document followed by its file name. Group, artifact
/// and version segments are present only when the metadata names them.
pub fn metadata_layout(metadata: &Metadata) -> String {
    let mut path = String::new();
    if !metadata.group_id.is_empty() {
        path.push_str(&metadata.group_id.replace('.', "/"));
        path.push('/');
        if !metadata.artifact_id.is_empty() {
            path.push_str(&metadata.artifact_id);
            path.push('/');
            if !metadata.version.is_empty() {
                path.push_str(&metadata.version);
                path.push('/');
            }
        }
    }
    path.push_str(&metadata.file_type);
    path
}

/// A directory holding downloaded artifacts and metadata.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The user-wide repository at `~/.arbor/repository/`.
    pub fn user_default() -> Self {
        Self::new(&dirs_path().join("repository"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `artifact` is stored, whether or not it exists yet.
    pub fn artifact_path(&self, artifact: &Artifact) -> PathBuf {
        self.root.join(artifact_layout(artifact))
    }

    /// Where `metadata` is stored. Metadata downloaded from a remote repository
    /// carries the repository id in its file name, so copies from different
    /// repositories don't overwrite each other.
    pub fn metadata_path(
        &self,
        metadata: &Metadata,
        repository: Option<&RemoteRepository>,
    ) -> PathBuf {
        let path = self.root.join(metadata_layout(metadata));
        let Some(repository) = repository else {
            return path;
        };
        let file_name = match metadata.file_type.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}-{}.{ext}", repository.id),
            None => format!("{}-{}", metadata.file_type, repository.id),
        };
        path.with_file_name(file_name)
    }

    /// The stored file for `artifact`, if present.
    pub fn find_artifact(&self, artifact: &Artifact) -> Option<PathBuf> {
        let path = self.artifact_path(artifact);
        path.is_file().then_some(path)
    }

    /// Store data at `path`, creating directories as needed.
    pub fn put(&self, path: &Path, data: &[u8]) -> miette::Result<PathBuf> {
        arbor_util::fs::write_file(path, data).map_err(ArborError::Io)?;
        Ok(path.to_path_buf())
    }

    pub fn put_artifact(&self, artifact: &Artifact, data: &[u8]) -> miette::Result<PathBuf> {
        self.put(&self.artifact_path(artifact), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::artifact::MetadataNature;

    #[test]
    fn artifact_layout_mirrors_maven() {
        let a = Artifact::new("org.jetbrains.kotlin", "kotlin-stdlib", "2.3.0");
        assert_eq!(
            artifact_layout(&a),
            "org/jetbrains/kotlin/kotlin-stdlib/2.3.0/kotlin-stdlib-2.3.0.jar"
        );

        let sources = Artifact::new("org.example", "lib", "1.0")
            .with_classifier("sources")
            .with_extension("zip");
        assert_eq!(
            artifact_layout(&sources),
            "org/example/lib/1.0/lib-1.0-sources.zip"
        );
    }

    #[test]
    fn timestamped_snapshot_uses_snapshot_directory() {
        let a = Artifact::new("org.example", "lib", "1.0-20240101.120000-3");
        assert_eq!(
            artifact_layout(&a),
            "org/example/lib/1.0-SNAPSHOT/lib-1.0-20240101.120000-3.jar"
        );
    }

    #[test]
    fn metadata_layout_levels() {
        let nature = MetadataNature::ReleaseOrSnapshot;
        let group = Metadata::new("org.example", "", "", "maven-metadata.xml", nature);
        let artifact = Metadata::new("org.example", "lib", "", "maven-metadata.xml", nature);
        let version = Metadata::new("org.example", "lib", "1.0-SNAPSHOT", "maven-metadata.xml", nature);
        assert_eq!(metadata_layout(&group), "org/example/maven-metadata.xml");
        assert_eq!(metadata_layout(&artifact), "org/example/lib/maven-metadata.xml");
        assert_eq!(
            metadata_layout(&version),
            "org/example/lib/1.0-SNAPSHOT/maven-metadata.xml"
        );
    }

    #[test]
    fn remote_metadata_is_named_after_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let local = LocalRepository::new(tmp.path());
        let central = RemoteRepository::new("central", "https://repo.maven.apache.org/maven2");
        let metadata = Metadata::new(
            "org.example",
            "lib",
            "",
            "maven-metadata.xml",
            MetadataNature::Release,
        );
        assert_eq!(
            local.metadata_path(&metadata, Some(&central)),
            tmp.path().join("org/example/lib/maven-metadata-central.xml")
        );
        assert_eq!(
            local.metadata_path(&metadata, None),
            tmp.path().join("org/example/lib/maven-metadata.xml")
        );
    }

    #[test]
    fn put_and_find() {
        let tmp = tempfile::tempdir().unwrap();
        let local = LocalRepository::new(tmp.path());
        let a = Artifact::new("org.example", "lib", "1.0");
        assert!(local.find_artifact(&a).is_none());

        let path = local.put_artifact(&a, b"fake jar data").unwrap();
        assert_eq!(local.find_artifact(&a), Some(path.clone()));
        assert_eq!(std::fs::read(path).unwrap(), b"fake jar data");
    }
}
