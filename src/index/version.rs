//! Conda version ordering.
//!
//! Versions are compared the way conda orders them: an optional `N!` epoch,
//! then dot-separated components (with `_` and `-` treated as dots), each
//! split into alternating numeric and alphabetic runs. Missing trailing
//! components compare as `0`, so `1.0` and `1.0.0` are equal. Within a run,
//! `dev` sorts below every other string, strings sort below numbers, and
//! `post` sorts above everything. An optional `+local` suffix is compared
//! last with the same rules.

use std::cmp::Ordering;
use std::fmt;

/// One run inside a version component.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    /// `dev` pre-release marker, lowest of all.
    Dev,
    /// Any other alphabetic run (`a`, `b`, `rc`, ...), compared lexically.
    Str(String),
    /// Numeric run.
    Num(u64),
    /// `post` marker, highest of all.
    Post,
}

/// Error returned when a version string cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// The string was empty after trimming.
    #[error("empty version string")]
    Empty,
    /// The string contains characters conda does not allow.
    #[error("invalid character {0:?} in version")]
    InvalidChar(char),
    /// Two separators in a row, or a leading/trailing separator.
    #[error("empty version component")]
    EmptyComponent,
    /// The epoch prefix before `!` was not a number.
    #[error("invalid epoch {0:?}")]
    InvalidEpoch(String),
}

/// What: A parsed conda version that keeps its original spelling for display.
///
/// Details:
/// - `Ord`/`Eq` follow conda semantics, not string equality; `raw` is only
///   used for `Display`.
#[derive(Clone, Debug)]
pub struct Version {
    /// Version text as published in the index.
    raw: String,
    /// Epoch number (`0` when absent).
    epoch: u64,
    /// Release components.
    release: Vec<Vec<Part>>,
    /// Local version components after `+`.
    local: Vec<Vec<Part>>,
}

impl Version {
    /// What: Parse a conda version string.
    ///
    /// Inputs:
    /// - `raw`: Version text, e.g. `1.26.0`, `2.0.0rc1`, `1!3.2`, `1.0+cuda`.
    ///
    /// Output:
    /// - Parsed version, or `VersionError` describing the first problem found.
    ///
    /// # Errors
    /// - Empty input, disallowed characters, empty components, or a non-numeric epoch.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '!' | '*')))
        {
            return Err(VersionError::InvalidChar(bad));
        }
        let lower = trimmed.to_ascii_lowercase();
        let (epoch, rest) = match lower.split_once('!') {
            Some((e, rest)) => {
                let epoch = e
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidEpoch(e.to_string()))?;
                (epoch, rest)
            }
            None => (0, lower.as_str()),
        };
        let (release, local) = match rest.split_once('+') {
            Some((r, l)) => (parse_components(r)?, parse_components(l)?),
            None => (parse_components(rest)?, Vec::new()),
        };
        Ok(Self {
            raw: trimmed.to_string(),
            epoch,
            release,
            local,
        })
    }

    /// Original version text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// What: Split a dotted version body into components of typed runs.
///
/// Details:
/// - A component starting with letters gets an implicit leading `0`, so
///   `1.dev0` orders like `1.0dev0`.
fn parse_components(body: &str) -> Result<Vec<Vec<Part>>, VersionError> {
    let mut out = Vec::new();
    for comp in body.split(['.', '_', '-']) {
        if comp.is_empty() {
            return Err(VersionError::EmptyComponent);
        }
        let mut parts = Vec::new();
        let mut chars = comp.chars().peekable();
        while let Some(&c) = chars.peek() {
            let numeric = c.is_ascii_digit();
            let mut run = String::new();
            while let Some(&n) = chars.peek() {
                if n.is_ascii_digit() != numeric {
                    break;
                }
                run.push(n);
                chars.next();
            }
            if numeric {
                // Absurdly long digit runs saturate instead of failing the record.
                parts.push(Part::Num(run.parse::<u64>().unwrap_or(u64::MAX)));
            } else {
                if parts.is_empty() {
                    parts.push(Part::Num(0));
                }
                parts.push(match run.as_str() {
                    "dev" => Part::Dev,
                    "post" => Part::Post,
                    _ => Part::Str(run),
                });
            }
        }
        out.push(parts);
    }
    Ok(out)
}

/// Compare two component lists, padding the shorter side with `0`.
fn cmp_components(a: &[Vec<Part>], b: &[Vec<Part>]) -> Ordering {
    const ZERO: Part = Part::Num(0);
    let len = a.len().max(b.len());
    for i in 0..len {
        let ca = a.get(i).map_or(&[][..], Vec::as_slice);
        let cb = b.get(i).map_or(&[][..], Vec::as_slice);
        let inner = ca.len().max(cb.len()).max(1);
        for j in 0..inner {
            let pa = ca.get(j).unwrap_or(&ZERO);
            let pb = cb.get(j).unwrap_or(&ZERO);
            match pa.cmp(pb) {
                Ordering::Equal => {}
                other => return other,
            }
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_components(&self.release, &other.release))
            .then_with(|| cmp_components(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.raw)
    }
}
