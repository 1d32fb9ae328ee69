//! Update checks: whether a locally cached artifact or metadata file must be
//! refreshed from a remote repository.
//!
//! A check first consults the session so that every file is checked against a
//! repository at most once per session, even with the `always` policy. A file
//! that is missing locally is fetched unless an earlier failure for it is
//! cached and still fresh. A file that exists is compared against the update
//! policy using the time of its last successful update: the file's
//! modification time for artifacts and the tracking record for metadata.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbor_core::artifact::{Artifact, Metadata};
use arbor_util::errors::ArborError;
use chrono::Local;

use crate::policy;
use crate::repository::RemoteRepository;
use crate::session::{RepositorySession, UpdateKey};
use crate::tracking::{FileTrackingStore, LastUpdated, TrackingRecord, TrackingStore};
use crate::transfer::TransferError;

/// Name of the metadata tracking file, one per directory.
pub const METADATA_TRACKING_FILE: &str = "resolver-status.json";

/// Suffix of the per-artifact tracking file.
pub const ARTIFACT_TRACKING_SUFFIX: &str = ".lastUpdated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    /// Not evaluated yet.
    Pending,
    Required,
    NotRequired,
    /// Not required because a cached failure was re-surfaced.
    FailedCached,
}

/// One item to check against one repository.
#[derive(Debug, Clone)]
pub struct UpdateCheck<T> {
    pub item: T,
    /// Where the item is stored locally, whether or not it exists.
    pub file: Option<PathBuf>,
    /// `false` treats an existing file as missing.
    pub file_valid: bool,
    pub repository: RemoteRepository,
    pub policy: String,
    /// Epoch millis of a last update known to the caller; 0 if unknown.
    pub local_last_updated: i64,
    state: CheckState,
    /// The failure re-surfaced by the check, or to be recorded by a touch.
    pub exception: Option<TransferError>,
}

impl<T> UpdateCheck<T> {
    pub fn new(item: T, repository: RemoteRepository) -> Self {
        Self {
            item,
            file: None,
            file_valid: true,
            repository,
            policy: policy::DAILY.to_string(),
            local_last_updated: 0,
            state: CheckState::Pending,
            exception: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_policy(mut self, policy: &str) -> Self {
        self.policy = policy.to_string();
        self
    }

    pub fn with_local_last_updated(mut self, millis: i64) -> Self {
        self.local_last_updated = millis;
        self
    }

    pub fn with_file_valid(mut self, valid: bool) -> Self {
        self.file_valid = valid;
        self
    }

    pub fn with_exception(mut self, exception: TransferError) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn is_required(&self) -> bool {
        self.state == CheckState::Required
    }

    fn set(&mut self, state: CheckState, exception: Option<TransferError>) {
        self.state = state;
        self.exception = exception;
    }
}

/// Where a check's tracking record lives.
struct Tracking {
    file: PathBuf,
    key: String,
    /// Artifacts take their last successful update from the file itself.
    success_from_file: bool,
}

impl Tracking {
    fn artifact(file: &Path, repository: &RemoteRepository) -> Self {
        let mut tracking = file.as_os_str().to_owned();
        tracking.push(ARTIFACT_TRACKING_SUFFIX);
        Self {
            file: PathBuf::from(tracking),
            key: repository.key().to_string(),
            success_from_file: true,
        }
    }

    fn metadata(file: &Path, repository: &RemoteRepository) -> Self {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file: file.with_file_name(METADATA_TRACKING_FILE),
            key: format!("{name}|{}", repository.key()),
            success_from_file: false,
        }
    }
}

/// Decides update checks and records their outcomes.
pub struct UpdateCheckManager {
    tracking: Arc<dyn TrackingStore>,
}

impl Default for UpdateCheckManager {
    fn default() -> Self {
        Self::new(Arc::new(FileTrackingStore::new()))
    }
}

impl UpdateCheckManager {
    pub fn new(tracking: Arc<dyn TrackingStore>) -> Self {
        Self { tracking }
    }

    /// Whether an item last updated at `last_updated` is stale under `policy` now.
    pub fn is_update_required(&self, last_updated: i64, policy: &str) -> bool {
        policy::is_update_required(last_updated, policy, Local::now())
    }

    /// The stricter of two update policies.
    pub fn effective_policy(&self, first: &str, second: &str) -> String {
        policy::effective_policy(first, second).to_string()
    }

    /// The policy for checking `artifact` in `repository`, or `None` if the
    /// repository does not serve its kind of version. A session override is
    /// merged with the repository's policy.
    pub fn artifact_policy(
        &self,
        session: &RepositorySession,
        repository: &RemoteRepository,
        artifact: &Artifact,
    ) -> Option<String> {
        let policy = repository.policy(artifact.is_snapshot());
        if !policy.enabled {
            return None;
        }
        Some(with_override(session, &policy.update_policy))
    }

    /// The policy for checking `metadata` in `repository`. Metadata covering
    /// releases and snapshots uses the stricter of both policies.
    pub fn metadata_policy(
        &self,
        session: &RepositorySession,
        repository: &RemoteRepository,
        metadata: &Metadata,
    ) -> Option<String> {
        let policies = repository.metadata_policies(metadata.nature);
        let merged = policies
            .iter()
            .map(|p| p.update_policy.as_str())
            .reduce(policy::effective_policy)?;
        Some(with_override(session, merged))
    }

    pub fn check_artifact(
        &self,
        session: &RepositorySession,
        check: &mut UpdateCheck<Artifact>,
    ) -> miette::Result<()> {
        self.check(session, check, Tracking::artifact)
    }

    pub fn check_metadata(
        &self,
        session: &RepositorySession,
        check: &mut UpdateCheck<Metadata>,
    ) -> miette::Result<()> {
        self.check(session, check, Tracking::metadata)
    }

    /// Record the outcome of the transfer `check` led to: marks the check done
    /// for this session and persists the time and failure, if any.
    pub fn touch_artifact(
        &self,
        session: &RepositorySession,
        check: &UpdateCheck<Artifact>,
    ) -> miette::Result<()> {
        let file = require_file(check)?;
        let tracking = Tracking::artifact(file, &check.repository);
        session.mark_checked(UpdateKey::new(file, &check.repository), check.exception.clone());

        let record = match &check.exception {
            None if file.is_file() => None,
            exception => Some(TrackingRecord::new(now_millis(), exception.clone())),
        };
        self.tracking.write(&tracking.file, &tracking.key, record)
    }

    pub fn touch_metadata(
        &self,
        session: &RepositorySession,
        check: &UpdateCheck<Metadata>,
    ) -> miette::Result<()> {
        let file = require_file(check)?;
        let tracking = Tracking::metadata(file, &check.repository);
        session.mark_checked(UpdateKey::new(file, &check.repository), check.exception.clone());

        let record = TrackingRecord::new(now_millis(), check.exception.clone());
        self.tracking.write(&tracking.file, &tracking.key, Some(record))
    }

    fn check<T: fmt::Display>(
        &self,
        session: &RepositorySession,
        check: &mut UpdateCheck<T>,
        tracking: fn(&Path, &RemoteRepository) -> Tracking,
    ) -> miette::Result<()> {
        if check.local_last_updated != 0
            && !self.is_update_required(check.local_last_updated, &check.policy)
        {
            tracing::debug!(
                "Skipped remote update check for {}, locally installed copy is up to date",
                check.item
            );
            check.set(CheckState::NotRequired, None);
            return Ok(());
        }

        let file = require_file(check)?.to_path_buf();
        let key = UpdateKey::new(&file, &check.repository);
        if let Some(outcome) = session.checked(&key) {
            tracing::debug!(
                "Skipped remote update check for {}, already checked {} during this session",
                check.item,
                check.repository.id
            );
            let state = if outcome.is_some() {
                CheckState::FailedCached
            } else {
                CheckState::NotRequired
            };
            check.set(state, outcome);
            return Ok(());
        }

        let file_exists = check.file_valid && file.is_file();
        let tracking = tracking(&file, &check.repository);
        let record = self.tracking.read(&tracking.file, &tracking.key)?;
        let error = record.as_ref().and_then(|r| r.error.clone());
        let recorded = record.as_ref().and_then(|r| r.last_updated);

        let last_updated = match (&error, recorded) {
            (None, _) if !file_exists => LastUpdated::Never,
            (None, _) if tracking.success_from_file => arbor_util::fs::modified_millis(&file)
                .map_or(LastUpdated::Unknown, LastUpdated::At),
            (_, Some(millis)) => LastUpdated::At(millis),
            (_, None) => LastUpdated::Unknown,
        };

        if last_updated == LastUpdated::Never {
            check.set(CheckState::Required, None);
        } else if self.is_update_required(last_updated.millis(), &check.policy) {
            check.set(CheckState::Required, None);
        } else if file_exists {
            check.set(CheckState::NotRequired, None);
        } else {
            match error {
                Some(error) if session.caches(&error) => {
                    tracing::debug!(
                        "Skipped remote update check for {}, cached failure: {error}",
                        check.item
                    );
                    check.set(CheckState::FailedCached, Some(error));
                }
                _ => check.set(CheckState::Required, None),
            }
        }
        tracing::trace!(
            "Update check for {} in {}: {:?}",
            check.item,
            check.repository.id,
            check.state
        );
        Ok(())
    }
}

fn require_file<T: fmt::Display>(check: &UpdateCheck<T>) -> miette::Result<&Path> {
    check.file.as_deref().ok_or_else(|| {
        ArborError::InvalidCheck {
            message: format!("{} has no local file", check.item),
        }
        .into()
    })
}

fn with_override(session: &RepositorySession, repository_policy: &str) -> String {
    match &session.update_policy {
        Some(session_policy) => policy::effective_policy(session_policy, repository_policy).to_string(),
        None => repository_policy.to_string(),
    }
}

fn now_millis() -> i64 {
    Local::now().timestamp_millis()
}
