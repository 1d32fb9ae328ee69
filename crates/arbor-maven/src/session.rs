//! Repository session: caching flags and the at-most-once check cache.

use std::path::{Path, PathBuf};

use arbor_core::config::UpdateConfig;
use dashmap::DashMap;

use crate::repository::RemoteRepository;
use crate::transfer::TransferError;

/// Identity of one update check: the local file and the repository it is
/// checked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateKey {
    pub file: PathBuf,
    pub repository: String,
}

impl UpdateKey {
    pub fn new(file: &Path, repository: &RemoteRepository) -> Self {
        Self {
            file: file.to_path_buf(),
            repository: repository.key().to_string(),
        }
    }
}

/// State shared by all resolutions of one session.
///
/// The check cache may be read and written from many tasks at once. Two
/// tasks checking the same key concurrently may both decide to download.
#[derive(Debug)]
pub struct RepositorySession {
    pub not_found_caching: bool,
    pub transfer_error_caching: bool,
    /// Replaces every repository's update policy when set.
    pub update_policy: Option<String>,
    checks: DashMap<UpdateKey, Option<TransferError>>,
}

impl Default for RepositorySession {
    fn default() -> Self {
        Self::from_config(&UpdateConfig::default())
    }
}

impl RepositorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &UpdateConfig) -> Self {
        Self {
            not_found_caching: config.not_found_caching,
            transfer_error_caching: config.transfer_error_caching,
            update_policy: config.policy.clone(),
            checks: DashMap::new(),
        }
    }

    pub fn with_not_found_caching(mut self, enabled: bool) -> Self {
        self.not_found_caching = enabled;
        self
    }

    pub fn with_transfer_error_caching(mut self, enabled: bool) -> Self {
        self.transfer_error_caching = enabled;
        self
    }

    pub fn with_update_policy(mut self, policy: &str) -> Self {
        self.update_policy = Some(policy.to_string());
        self
    }

    /// Whether a cached failure of this kind should stop another attempt.
    pub fn caches(&self, error: &TransferError) -> bool {
        if error.is_not_found() {
            self.not_found_caching
        } else {
            self.transfer_error_caching
        }
    }

    /// Outcome recorded for `key` earlier in this session. The outer `None`
    /// means the key was not checked yet.
    pub fn checked(&self, key: &UpdateKey) -> Option<Option<TransferError>> {
        self.checks.get(key).map(|entry| entry.value().clone())
    }

    pub fn mark_checked(&self, key: UpdateKey, outcome: Option<TransferError>) {
        self.checks.insert(key, outcome);
    }

    /// Forget every check made so far.
    pub fn reset_checks(&self) {
        self.checks.clear();
    }

    pub fn checked_count(&self) -> usize {
        self.checks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn defaults_follow_config() {
        let session = RepositorySession::new();
        assert!(session.not_found_caching);
        assert!(!session.transfer_error_caching);
        assert!(session.update_policy.is_none());

        let config = UpdateConfig {
            policy: Some("always".to_string()),
            not_found_caching: false,
            transfer_error_caching: true,
        };
        let session = RepositorySession::from_config(&config);
        assert!(session.caches(&TransferError::transfer("a", "r", "boom")));
        assert!(!session.caches(&TransferError::not_found("a", "r")));
        assert_eq!(session.update_policy.as_deref(), Some("always"));
    }

    #[test]
    fn checks_are_recorded_and_reset() {
        let session = RepositorySession::new();
        let repo = RemoteRepository::maven_central();
        let key = UpdateKey::new(Path::new("/tmp/a.jar"), &repo);
        assert_eq!(session.checked(&key), None);

        session.mark_checked(key.clone(), None);
        assert_eq!(session.checked(&key), Some(None));

        session.reset_checks();
        assert_eq!(session.checked_count(), 0);
    }

    #[test]
    fn concurrent_marks_are_all_kept() {
        let session = Arc::new(RepositorySession::new());
        let repo = RemoteRepository::maven_central();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let session = Arc::clone(&session);
                let repo = repo.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let file = PathBuf::from(format!("/repo/{t}/{i}.jar"));
                        session.mark_checked(UpdateKey::new(&file, &repo), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(session.checked_count(), 400);
    }
}
