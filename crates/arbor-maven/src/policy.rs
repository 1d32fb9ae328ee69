//! Update policies: how long a locally cached file stays fresh.
//!
//! Policies are kept as strings on repositories and checks so that unknown
//! values survive a round trip through configuration; [`UpdatePolicy`] is the
//! parsed form.

use std::fmt;
use std::str::FromStr;

use arbor_util::errors::ArborError;
use chrono::{DateTime, Local, Timelike};

pub const NEVER: &str = "never";
pub const ALWAYS: &str = "always";
pub const DAILY: &str = "daily";
pub const INTERVAL: &str = "interval";

const MINUTES_PER_DAY: u64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    Never,
    Always,
    /// Stale once local midnight has passed since the last update.
    Daily,
    /// Stale after the given number of minutes.
    Interval(u32),
}

impl FromStr for UpdatePolicy {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NEVER => Ok(Self::Never),
            ALWAYS => Ok(Self::Always),
            DAILY => Ok(Self::Daily),
            _ => match s.strip_prefix(INTERVAL).and_then(|rest| rest.strip_prefix(':')) {
                Some(minutes) => minutes
                    .trim()
                    .parse()
                    .map(Self::Interval)
                    .map_err(|_| ArborError::Config {
                        message: format!("Invalid update interval '{minutes}' in policy '{s}'"),
                    }),
                None => Err(ArborError::Config {
                    message: format!("Unknown update policy '{s}'"),
                }),
            },
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str(NEVER),
            Self::Always => f.write_str(ALWAYS),
            Self::Daily => f.write_str(DAILY),
            Self::Interval(minutes) => write!(f, "{INTERVAL}:{minutes}"),
        }
    }
}

impl UpdatePolicy {
    /// Whether a file last updated at `last_updated` (epoch millis) is stale at `now`.
    pub fn is_update_required(&self, last_updated: i64, now: DateTime<Local>) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Daily => last_updated < local_midnight(now),
            Self::Interval(minutes) => {
                let window = i64::from(*minutes) * 60 * 1000;
                last_updated < now.timestamp_millis().saturating_sub(window)
            }
        }
    }
}

/// Evaluate a policy string. Unknown policies and malformed intervals never
/// require an update.
pub fn is_update_required(last_updated: i64, policy: &str, now: DateTime<Local>) -> bool {
    match policy.parse::<UpdatePolicy>() {
        Ok(policy) => policy.is_update_required(last_updated, now),
        Err(e) => {
            tracing::warn!("{e}, assuming '{NEVER}'");
            false
        }
    }
}

/// The stricter of two policies: the one that goes stale sooner. Equally
/// strict policies resolve to `second`.
pub fn effective_policy<'a>(first: &'a str, second: &'a str) -> &'a str {
    if ordinal(first) < ordinal(second) {
        first
    } else {
        second
    }
}

/// Minutes until a policy goes stale. Malformed intervals count as daily and
/// unknown policies as never.
fn ordinal(policy: &str) -> u64 {
    match policy.parse::<UpdatePolicy>() {
        Ok(UpdatePolicy::Always) => 0,
        Ok(UpdatePolicy::Interval(minutes)) => u64::from(minutes),
        Ok(UpdatePolicy::Daily) => MINUTES_PER_DAY,
        Ok(UpdatePolicy::Never) => u64::MAX,
        Err(_) if policy.starts_with(INTERVAL) => MINUTES_PER_DAY,
        Err(_) => u64::MAX,
    }
}

/// Epoch millis of the most recent local midnight at or before `now`.
fn local_midnight(now: DateTime<Local>) -> i64 {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.timestamp_millis())
        .unwrap_or_else(|| {
            let elapsed = i64::from(now.num_seconds_from_midnight()) * 1000
                + i64::from(now.timestamp_subsec_millis());
            now.timestamp_millis() - elapsed
        })
}
