use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;

/// Well-known Maven scopes. Scopes stay plain strings on dependencies so that
/// custom scopes pass through untouched.
pub mod scope {
    pub const COMPILE: &str = "compile";
    pub const RUNTIME: &str = "runtime";
    pub const PROVIDED: &str = "provided";
    pub const SYSTEM: &str = "system";
    pub const TEST: &str = "test";

    /// Scope of a dependency across one more edge.
    ///
    /// `parent` is the effective scope of the depending node, `declared` the scope
    /// written on the edge. Returns `None` when the edge does not propagate
    /// (test/provided/system dependencies of a dependency stay with it).
    pub fn propagate(parent: &str, declared: &str) -> Option<&'static str> {
        match (parent, declared) {
            (_, TEST) | (_, PROVIDED) | (_, SYSTEM) => None,
            (COMPILE, COMPILE) => Some(COMPILE),
            (COMPILE, RUNTIME) | (RUNTIME, COMPILE) | (RUNTIME, RUNTIME) => Some(RUNTIME),
            (PROVIDED, _) => Some(PROVIDED),
            (TEST, _) => Some(TEST),
            (SYSTEM, _) => Some(SYSTEM),
            (_, RUNTIME) => Some(RUNTIME),
            _ => Some(COMPILE),
        }
    }

    /// Rank used when several paths reach the same artifact with different
    /// scopes; the highest rank wins.
    pub fn strength(scope: &str) -> u8 {
        match scope {
            COMPILE => 5,
            RUNTIME => 4,
            SYSTEM => 3,
            PROVIDED => 2,
            TEST => 1,
            _ => 0,
        }
    }
}

/// A declared dependency: the requested artifact (whose version may be a range
/// expression), its scope, optionality and transitive exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub artifact: Artifact,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

fn default_scope() -> String {
    scope::COMPILE.to_string()
}

impl Dependency {
    pub fn new(artifact: Artifact, scope: &str) -> Self {
        Self {
            artifact,
            scope: scope.to_string(),
            optional: false,
            exclusions: Vec::new(),
        }
    }

    /// Parse a `group:artifact[:ext[:classifier]]:version` shorthand as a compile dependency.
    pub fn parse(s: &str) -> Option<Self> {
        Artifact::parse(s).map(|a| Self::new(a, scope::COMPILE))
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }
}

/// A transitive dependency to exclude. Any field may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group_id: String,
    #[serde(default = "wildcard")]
    pub artifact_id: String,
    #[serde(default = "wildcard")]
    pub classifier: String,
    #[serde(default = "wildcard")]
    pub extension: String,
}

fn wildcard() -> String {
    "*".to_string()
}

impl Exclusion {
    /// Exclude `group:artifact` with any classifier and extension.
    pub fn new(group_id: &str, artifact_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            classifier: wildcard(),
            extension: wildcard(),
        }
    }

    pub fn matches(&self, artifact: &Artifact) -> bool {
        fn eq(pattern: &str, value: &str) -> bool {
            pattern == "*" || pattern == value
        }
        eq(&self.group_id, &artifact.group_id)
            && eq(&self.artifact_id, &artifact.artifact_id)
            && eq(&self.extension, &artifact.extension)
            && eq(&self.classifier, &artifact.classifier)
    }
}
