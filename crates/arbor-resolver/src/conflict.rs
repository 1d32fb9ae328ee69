//! Version conflict reporting.

use std::fmt;

use serde::Serialize;

/// Every requested version that lost against the resolved version of its
/// conflict group.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// One request that was not honoured: `requested` is the constraint as written,
/// `resolved` the version the conflict group settled on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionConflict {
    pub key: String,
    pub requested: String,
    pub resolved: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conflict unless an identical one is already present.
    pub fn add(&mut self, conflict: VersionConflict) {
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }

    /// Conflicts recorded for one conflict group.
    pub fn for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a VersionConflict> + 'a {
        self.conflicts.iter().filter(move |c| c.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(f, "  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requested {} but resolved {} ({})",
            self.key, self.requested, self.resolved, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(requested: &str) -> VersionConflict {
        VersionConflict {
            key: "org.example:lib:jar".to_string(),
            requested: requested.to_string(),
            resolved: "1.0".to_string(),
            reason: "nearest wins (depth 1 vs 2)".to_string(),
        }
    }

    #[test]
    fn empty_report() {
        let report = ConflictReport::new();
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert_eq!(report.to_string(), "No version conflicts.");
    }

    #[test]
    fn report_with_conflicts() {
        let mut report = ConflictReport::new();
        report.add(conflict("2.0"));
        report.add(conflict("2.0"));
        report.add(conflict("3.0"));
        assert_eq!(report.len(), 2);
        assert_eq!(report.for_key("org.example:lib:jar").count(), 2);
        let s = report.to_string();
        assert!(s.contains("org.example:lib:jar requested 2.0 but resolved 1.0"));
    }
}
