//! Generic version parsing, comparison, ranges and constraints.
//!
//! Versions are split into items on `.`, `-` and digit/letter transitions; all
//! three kinds of boundary are equivalent, so `1-1`, `1.1` and `1a1`-style
//! spellings line up. Consecutive numeric items and consecutive string items
//! form runs; versions compare run by run, the shorter run padded with `0` or
//! `ga`.
//!
//! - Numeric items compare as arbitrary-precision integers (leading zeros ignored)
//! - Known qualifiers have a fixed order:
//!   `alpha` < `beta` < `milestone` < `cr`/`rc` < `snapshot` < `""`/`ga`/`final` < `sp`
//! - Other strings sort after every known qualifier and compare case-insensitively
//! - `min` and `max` as the last item sort below / above everything at that column
//! - Trailing neutral items (`0`, `ga`) are trimmed, so `1.0.0` equals `1`
//!   and `ga` equals the empty version

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use arbor_util::errors::ArborError;

/// A parsed version with comparable items.
///
/// Parsing never fails: any text yields some version, and the empty string is
/// equivalent to `0`.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    runs: Vec<Vec<Item>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    Min,
    Qualifier(i8),
    Text(String),
    /// Decimal digits without leading zeros.
    Number(String),
    Max,
}

const QUALIFIER_ALPHA: i8 = -5;
const QUALIFIER_BETA: i8 = -4;
const QUALIFIER_MILESTONE: i8 = -3;

fn qualifier(token: &str) -> Option<i8> {
    match token {
        "alpha" => Some(QUALIFIER_ALPHA),
        "beta" => Some(QUALIFIER_BETA),
        "milestone" => Some(QUALIFIER_MILESTONE),
        "cr" | "rc" => Some(-2),
        "snapshot" => Some(-1),
        "" | "ga" | "final" => Some(0),
        "sp" => Some(1),
        _ => None,
    }
}

impl Item {
    fn kind(&self) -> u8 {
        match self {
            Item::Min => 0,
            Item::Qualifier(_) => 2,
            Item::Text(_) => 3,
            Item::Number(n) if n.len() < 10 => 4,
            Item::Number(_) => 5,
            Item::Max => 8,
        }
    }

    /// Numbers, `min` and `max` form numeric runs; qualifiers and strings
    /// form string runs.
    fn is_number(&self) -> bool {
        matches!(self, Item::Min | Item::Number(_) | Item::Max)
    }

    /// Comparison against the neutral padding item (`0` or `ga`).
    fn cmp_padding(&self) -> Ordering {
        match self {
            Item::Min => Ordering::Less,
            Item::Max | Item::Text(_) => Ordering::Greater,
            Item::Number(n) if n == "0" => Ordering::Equal,
            Item::Number(_) => Ordering::Greater,
            Item::Qualifier(q) => q.cmp(&0),
        }
    }

    fn cmp_item(&self, other: &Item) -> Ordering {
        match (self, other) {
            (Item::Number(a), Item::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Qualifier(a), Item::Qualifier(b)) => a.cmp(b),
            (Item::Text(a), Item::Text(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Start,
    Alpha,
    Zeros,
    Digits,
}

fn tokenize(version: &str) -> Vec<Vec<Item>> {
    let text: Vec<char> = if version.is_empty() {
        vec!['0']
    } else {
        version.chars().collect()
    };
    let n = text.len();
    let mut items = Vec::new();
    let mut index = 0;

    while index < n {
        let mut state = TokenState::Start;
        let mut start = index;
        let mut end = n;
        let mut terminated_by_number = false;

        while index < n {
            let c = text[index];
            if c == '.' || c == '-' {
                end = index;
                index += 1;
                break;
            }
            if c.is_ascii_digit() {
                if state == TokenState::Alpha {
                    end = index;
                    terminated_by_number = true;
                    break;
                }
                if state == TokenState::Zeros {
                    start += 1;
                }
                state = if state == TokenState::Digits || c != '0' {
                    TokenState::Digits
                } else {
                    TokenState::Zeros
                };
            } else {
                if matches!(state, TokenState::Zeros | TokenState::Digits) {
                    end = index;
                    break;
                }
                state = TokenState::Alpha;
            }
            index += 1;
        }

        if end <= start {
            items.push(Item::Number("0".to_string()));
            continue;
        }
        let token: String = text[start..end].iter().collect();
        if state != TokenState::Alpha {
            items.push(Item::Number(token));
            continue;
        }

        let lower = token.to_lowercase();
        let item = if index >= n && lower == "min" {
            Item::Min
        } else if index >= n && lower == "max" {
            Item::Max
        } else if terminated_by_number && lower.len() == 1 {
            match lower.as_str() {
                "a" => Item::Qualifier(QUALIFIER_ALPHA),
                "b" => Item::Qualifier(QUALIFIER_BETA),
                "m" => Item::Qualifier(QUALIFIER_MILESTONE),
                _ => Item::Text(lower),
            }
        } else {
            match qualifier(&lower) {
                Some(q) => Item::Qualifier(q),
                None => Item::Text(lower),
            }
        };
        items.push(item);
    }

    into_runs(items)
}

/// Group items into alternating numeric and string runs, starting with a
/// numeric run that may be empty. Trailing neutral items of each run and
/// trailing empty runs are dropped, so equal versions have identical runs.
fn into_runs(items: Vec<Item>) -> Vec<Vec<Item>> {
    let mut runs = Vec::new();
    let mut run = Vec::new();
    let mut number = true;
    for item in items {
        if item.is_number() != number {
            runs.push(std::mem::take(&mut run));
            number = item.is_number();
        }
        run.push(item);
    }
    runs.push(run);

    for run in &mut runs {
        while run.last().is_some_and(|item| item.cmp_padding() == Ordering::Equal) {
            run.pop();
        }
    }
    while runs.last().is_some_and(Vec::is_empty) {
        runs.pop();
    }
    runs
}

/// Compare two runs of the same kind, padding the shorter one.
fn cmp_run(these: &[Item], those: &[Item]) -> Ordering {
    for index in 0..these.len().max(those.len()) {
        let rel = match (these.get(index), those.get(index)) {
            (Some(a), Some(b)) => a.cmp_item(b),
            (Some(a), None) => a.cmp_padding(),
            (None, Some(b)) => b.cmp_padding().reverse(),
            (None, None) => Ordering::Equal,
        };
        if rel != Ordering::Equal {
            return rel;
        }
    }
    Ordering::Equal
}

impl Version {
    pub fn parse(version: &str) -> Self {
        Self {
            original: version.to_string(),
            runs: tokenize(version),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.runs == other.runs
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.runs.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let count = self.runs.len().max(other.runs.len());
        (0..count)
            .map(|index| {
                let these = self.runs.get(index).map_or(&[][..], Vec::as_slice);
                let those = other.runs.get(index).map_or(&[][..], Vec::as_slice);
                cmp_run(these, those)
            })
            .find(|rel| *rel != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A single interval such as `[1.0,2.0)`, `(,1.5]`, `[1.2,)` or `[1.2]`.
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

fn spec_error(spec: &str, message: impl Into<String>) -> ArborError {
    ArborError::VersionSpec {
        spec: spec.to_string(),
        message: message.into(),
    }
}

impl VersionRange {
    /// Parse one bracketed interval.
    pub fn parse(range: &str) -> Result<Self, ArborError> {
        let lower_inclusive = match range.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(spec_error(range, "a range must start with either [ or (")),
        };
        let upper_inclusive = match range.chars().last() {
            Some(']') if range.len() > 1 => true,
            Some(')') if range.len() > 1 => false,
            _ => return Err(spec_error(range, "a range must end with either ] or )")),
        };
        let inner = &range[1..range.len() - 1];

        let Some((lower, upper)) = inner.split_once(',') else {
            if !lower_inclusive || !upper_inclusive {
                return Err(spec_error(range, "single version must be surrounded by []"));
            }
            let version = Version::parse(inner.trim());
            return Ok(Self::exactly(version));
        };

        let (lower, upper) = (lower.trim(), upper.trim());
        if upper.contains(',') {
            return Err(spec_error(range, "bounds may not contain additional ','"));
        }
        let lower = (!lower.is_empty()).then(|| Bound {
            version: Version::parse(lower),
            inclusive: lower_inclusive,
        });
        let upper = (!upper.is_empty()).then(|| Bound {
            version: Version::parse(upper),
            inclusive: upper_inclusive,
        });
        if let (Some(l), Some(u)) = (&lower, &upper) {
            if u.version < l.version {
                return Err(spec_error(
                    range,
                    "lower bound must not be greater than upper bound",
                ));
            }
        }
        Ok(Self { lower, upper })
    }

    /// The range `[version]`.
    pub fn exactly(version: Version) -> Self {
        Self {
            lower: Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            upper: Some(Bound {
                version,
                inclusive: true,
            }),
        }
    }

    pub fn contains_version(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            match version.cmp(&lower.version) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match version.cmp(&upper.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// The overlap of two ranges, or `None` if they are disjoint.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let lower = match (&self.lower, &other.lower) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        let upper = match (&self.upper, &other.upper) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        if let (Some(l), Some(u)) = (&lower, &upper) {
            match l.version.cmp(&u.version) {
                Ordering::Greater => return None,
                Ordering::Equal if !(l.inclusive && u.inclusive) => return None,
                _ => {}
            }
        }
        Some(VersionRange { lower, upper })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(u)) = (&self.lower, &self.upper) {
            if l.inclusive && u.inclusive && l.version == u.version {
                return write!(f, "[{}]", l.version);
            }
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}

/// What a dependency asks for: either one preferred version or a non-empty
/// list of ranges, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    version: Option<Version>,
    ranges: Vec<VersionRange>,
}

impl VersionConstraint {
    /// Parse `1.2`, `[1.0,2.0)` or a comma separated list such as `(,1.0],[1.2,)`.
    pub fn parse(constraint: &str) -> Result<Self, ArborError> {
        let mut ranges = Vec::new();
        let mut rest = constraint;

        while rest.starts_with('[') || rest.starts_with('(') {
            let close = match (rest.find(')'), rest.find(']')) {
                (Some(p), Some(b)) => Some(p.min(b)),
                (p, b) => p.or(b),
            };
            let Some(close) = close else {
                return Err(spec_error(constraint, "unbounded version range"));
            };
            ranges.push(VersionRange::parse(&rest[..=close])?);
            rest = rest[close + 1..].trim();
            if let Some(stripped) = rest.strip_prefix(',') {
                rest = stripped.trim();
            }
        }

        if ranges.is_empty() {
            return Ok(Self::from_version(Version::parse(constraint)));
        }
        if !rest.is_empty() {
            return Err(spec_error(
                constraint,
                format!("expected [ or ( but got {rest}"),
            ));
        }
        Ok(Self {
            version: None,
            ranges,
        })
    }

    pub fn from_version(version: Version) -> Self {
        Self {
            version: Some(version),
            ranges: Vec::new(),
        }
    }

    pub fn from_ranges(ranges: Vec<VersionRange>) -> Self {
        Self {
            version: None,
            ranges,
        }
    }

    /// The preferred version, if this is not a range constraint.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn ranges(&self) -> &[VersionRange] {
        &self.ranges
    }

    pub fn is_range(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn contains_version(&self, version: &Version) -> bool {
        if self.ranges.is_empty() {
            return self.version.as_ref() == Some(version);
        }
        self.ranges.iter().any(|r| r.contains_version(version))
    }

    /// The constraint satisfied by exactly the versions both accept, or `None`
    /// if no version can satisfy both.
    pub fn intersect(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        match (&self.version, &other.version) {
            (Some(_), Some(_)) => (self == other).then(|| self.clone()),
            (Some(v), None) => other.contains_version(v).then(|| self.clone()),
            (None, Some(v)) => self.contains_version(v).then(|| other.clone()),
            (None, None) => {
                let ranges: Vec<VersionRange> = self
                    .ranges
                    .iter()
                    .flat_map(|a| other.ranges.iter().filter_map(move |b| a.intersect(b)))
                    .collect();
                (!ranges.is_empty()).then(|| Self::from_ranges(ranges))
            }
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = &self.version {
            return write!(f, "{v}");
        }
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}
