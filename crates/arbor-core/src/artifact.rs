use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension used when a coordinate does not name one.
pub const DEFAULT_EXTENSION: &str = "jar";

const SNAPSHOT: &str = "SNAPSHOT";

/// A single versioned binary identified by group, name, extension, classifier and version.
///
/// The version field holds whatever was requested, which may be a range expression
/// such as `[1.0,2.0)` until the collector pins it to a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub classifier: String,
    pub version: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Artifact {
    /// A `jar` artifact without classifier.
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            extension: default_extension(),
            classifier: String::new(),
            version: version.to_string(),
        }
    }

    /// Parse `<group>:<artifact>[:<extension>[:<classifier>]]:<version>`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let (group, artifact, extension, classifier, version) = match parts.as_slice() {
            [g, a, v] => (*g, *a, DEFAULT_EXTENSION, "", *v),
            [g, a, e, v] => (*g, *a, *e, "", *v),
            [g, a, e, c, v] => (*g, *a, *e, *c, *v),
            _ => return None,
        };
        if group.is_empty() || artifact.is_empty() || extension.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            group_id: group.to_string(),
            artifact_id: artifact.to_string(),
            extension: extension.to_string(),
            classifier: classifier.to_string(),
            version: version.to_string(),
        })
    }

    /// Copy of this artifact pinned to another version.
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..self.clone()
        }
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        self.classifier = classifier.to_string();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// `group:artifact:extension[:classifier]`, the identity of the artifact
    /// regardless of its version. Nodes sharing this key compete for one version.
    pub fn conflict_key(&self) -> String {
        let mut key = format!("{}:{}:{}", self.group_id, self.artifact_id, self.extension);
        if !self.classifier.is_empty() {
            key.push(':');
            key.push_str(&self.classifier);
        }
        key
    }

    /// Whether the version denotes a snapshot, either `-SNAPSHOT` or a
    /// timestamped `-yyyyMMdd.HHmmss-N` build.
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT) || timestamp_suffix(&self.version).is_some()
    }

    /// The version with a timestamped snapshot suffix folded back to `SNAPSHOT`.
    pub fn base_version(&self) -> String {
        match timestamp_suffix(&self.version) {
            Some(prefix_len) => format!("{}{SNAPSHOT}", &self.version[..prefix_len]),
            None => self.version.clone(),
        }
    }
}

/// Byte offset where a `yyyyMMdd.HHmmss-N` suffix starts, if present.
fn timestamp_suffix(version: &str) -> Option<usize> {
    let (head, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let start = head.rfind('-').map(|i| i + 1).unwrap_or(0);
    let stamp = &head[start..];
    let (date, time) = stamp.split_once('.')?;
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    (digits(date, 8) && digits(time, 6)).then_some(start)
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.extension)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}", self.classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Which kinds of versions a metadata document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataNature {
    Release,
    Snapshot,
    ReleaseOrSnapshot,
}

/// A repository metadata document such as `maven-metadata.xml`, addressed at
/// group, artifact or version level by leaving the finer fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub nature: MetadataNature,
}

impl Metadata {
    pub fn new(
        group_id: &str,
        artifact_id: &str,
        version: &str,
        file_type: &str,
        nature: MetadataNature,
    ) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            file_type: file_type.to_string(),
            nature,
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for part in [&self.group_id, &self.artifact_id, &self.version] {
            if !part.is_empty() {
                write!(f, "{sep}{part}")?;
                sep = ":";
            }
        }
        write!(f, "/{}", self.file_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_five_part_coordinate() {
        let a = Artifact::parse("org.example:lib:zip:sources:1.0").unwrap();
        assert_eq!(a.extension, "zip");
        assert_eq!(a.classifier, "sources");
        assert_eq!(a.version, "1.0");
    }

    #[test]
    fn conflict_key_ignores_version() {
        let a = Artifact::new("org.example", "lib", "1.0");
        let b = a.with_version("2.0");
        assert_eq!(a.conflict_key(), b.conflict_key());
        assert_eq!(a.conflict_key(), "org.example:lib:jar");
    }

    #[test]
    fn conflict_key_includes_classifier() {
        let a = Artifact::new("org.example", "lib", "1.0").with_classifier("tests");
        assert_eq!(a.conflict_key(), "org.example:lib:jar:tests");
    }

    #[test]
    fn timestamped_snapshot() {
        let a = Artifact::new("g", "a", "1.0-20240615.143022-42");
        assert!(a.is_snapshot());
        assert_eq!(a.base_version(), "1.0-SNAPSHOT");

        let plain = Artifact::new("g", "a", "1.0-SNAPSHOT");
        assert!(plain.is_snapshot());
        assert_eq!(plain.base_version(), "1.0-SNAPSHOT");

        let release = Artifact::new("g", "a", "1.0-1");
        assert!(!release.is_snapshot());
    }

    #[test]
    fn metadata_display_skips_empty_levels() {
        let m = Metadata::new("org.example", "lib", "", "maven-metadata.xml", MetadataNature::Release);
        assert_eq!(m.to_string(), "org.example:lib/maven-metadata.xml");
    }
}
