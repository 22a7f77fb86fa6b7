//! Searchable structure over every record of the active snapshots.
//!
//! Records are kept in one canonical order (name case-insensitively ascending,
//! then version descending), so all records of one name form a contiguous run
//! and all names sharing a prefix form a contiguous block. A distinct-name
//! table over those runs gives binary-searched prefix lookups; the substring
//! and fuzzy tiers scan the name table, never the record list. Matches inside
//! a tier are re-ranked newest version first, then by name.

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::query::{ResultPage, paginate};
use super::{PackageRecord, SnapshotId};

/// How a result page matched the filter text, best tier first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    /// Empty filter text: every record.
    All,
    /// A name equals the text (case-insensitive).
    Exact,
    /// A name starts with the text.
    Prefix,
    /// A name contains the text.
    Substring,
    /// No name contains the text; fuzzy subsequence matches instead.
    Fuzzy,
}

impl MatchTier {
    /// Lowercase label for the results title.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Substring => "substring",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// One distinct package name and its run in the record list.
#[derive(Clone, Debug)]
struct NameEntry {
    /// Lowercased name, the sort and match key.
    lower: String,
    /// Name as published.
    name: String,
    /// Records of this name in canonical order.
    records: Range<usize>,
}

/// Canonical record order: name, newest version, highest build, then stable tie-breakers.
fn canonical(a: &(String, Arc<PackageRecord>), b: &(String, Arc<PackageRecord>)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.name.cmp(&b.1.name))
        .then_with(|| b.1.version.cmp(&a.1.version))
        .then_with(|| b.1.build_number.cmp(&a.1.build_number))
        .then_with(|| a.1.build.cmp(&b.1.build))
        .then_with(|| a.1.subdir.cmp(&b.1.subdir))
        .then_with(|| a.1.channel.cmp(&b.1.channel))
        .then_with(|| a.1.file_name.cmp(&b.1.file_name))
}

/// What: Records matched by one filter text, in result order.
///
/// Details:
/// - Borrowed from the index; iterate with [`MatchSet::iter`].
/// - The empty filter keeps the canonical slice; every other tier is ranked
///   newest version first, then by name.
pub struct MatchSet<'a> {
    /// Best tier present, `None` when nothing matched.
    tier: Option<MatchTier>,
    /// Every record in canonical order (empty filter only).
    all: &'a [Arc<PackageRecord>],
    /// Ranked matches for a non-empty filter.
    ranked: Vec<&'a Arc<PackageRecord>>,
}

impl<'a> MatchSet<'a> {
    /// Best tier present.
    #[must_use]
    pub const fn tier(&self) -> Option<MatchTier> {
        self.tier
    }

    /// Number of matched records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len() + self.ranked.len()
    }

    /// Whether nothing matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tier.is_none()
    }

    /// Matched records in result order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Arc<PackageRecord>> + '_ {
        self.all.iter().chain(self.ranked.iter().copied())
    }
}

/// What: The searchable structure the query engine runs against.
///
/// Details:
/// - Built in one go from a record set and never edited afterwards; a rebuild
///   produces a new identity so outstanding cursors can be detected as stale.
#[derive(Clone, Debug)]
pub struct PackageIndex {
    /// Identity of this build.
    id: SnapshotId,
    /// Records in canonical order.
    records: Vec<Arc<PackageRecord>>,
    /// Distinct names sorted by `(lower, name)`.
    names: Vec<NameEntry>,
}

impl Default for PackageIndex {
    fn default() -> Self {
        Self::build(Vec::new())
    }
}

impl PackageIndex {
    /// What: Build an index over `records`.
    ///
    /// Inputs:
    /// - `records`: Any record set, in any order; usually the union of all channel snapshots.
    ///
    /// Output:
    /// - New index with a fresh identity.
    ///
    /// Details:
    /// - O(n log n): one sort plus one linear pass to group names.
    pub fn build(records: impl IntoIterator<Item = Arc<PackageRecord>>) -> Self {
        let mut keyed: Vec<(String, Arc<PackageRecord>)> = records
            .into_iter()
            .map(|r| (r.name.to_lowercase(), r))
            .collect();
        keyed.sort_by(canonical);

        let mut names: Vec<NameEntry> = Vec::new();
        let mut out = Vec::with_capacity(keyed.len());
        for (i, (lower, record)) in keyed.into_iter().enumerate() {
            match names.last_mut() {
                Some(last) if last.name == record.name => last.records.end = i + 1,
                _ => names.push(NameEntry {
                    lower,
                    name: record.name.clone(),
                    records: i..i + 1,
                }),
            }
            out.push(record);
        }
        Self {
            id: SnapshotId::next(),
            records: out,
            names,
        }
    }

    /// What: Replace the searchable contents with `records`.
    ///
    /// Details:
    /// - Readers holding a `ResultPage` keep their `Arc`s; the identity changes
    ///   so their cursors no longer resolve against this index.
    pub fn rebuild(&mut self, records: impl IntoIterator<Item = Arc<PackageRecord>>) {
        *self = Self::build(records);
    }

    /// Identity of the current build.
    #[must_use]
    pub const fn id(&self) -> SnapshotId {
        self.id
    }

    /// Total record count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct package names.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// What: Every record of one package, newest version first.
    ///
    /// Inputs:
    /// - `name`: Exact package name.
    ///
    /// Output:
    /// - Contiguous slice of records; empty when the name is unknown.
    #[must_use]
    pub fn versions_of(&self, name: &str) -> &[Arc<PackageRecord>] {
        let lower = name.to_lowercase();
        let key = (lower.as_str(), name);
        self.names
            .binary_search_by(|e| (e.lower.as_str(), e.name.as_str()).cmp(&key))
            .map_or(&[][..], |i| &self.records[self.names[i].records.clone()])
    }

    /// What: Resolve filter text into matched records.
    ///
    /// Inputs:
    /// - `text`: Filter text; trimmed and compared case-insensitively.
    ///
    /// Output:
    /// - `MatchSet` in tier order: exact, prefix, substring. When none of those
    ///   match, the fuzzy tier is used instead.
    ///
    /// Details:
    /// - Prefix lookup is two binary searches over the name table.
    /// - Within a tier: newest version first, then name, then canonical order.
    /// - Every tier is collected in full so `total` is exact. The substring
    ///   tier scans distinct names once, even when the prefix block alone
    ///   would fill the page; result lists are short next to the record count.
    #[must_use]
    pub fn matches(&self, text: &str) -> MatchSet<'_> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return MatchSet {
                tier: (!self.names.is_empty()).then_some(MatchTier::All),
                all: &self.records,
                ranked: Vec::new(),
            };
        }
        let lo = self.names.partition_point(|e| e.lower.as_str() < needle.as_str());
        let hi = lo + self.names[lo..].partition_point(|e| e.lower.starts_with(&needle));
        let exact_end = lo + self.names[lo..hi].partition_point(|e| e.lower == needle);
        let substring: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(i, e)| !(lo..hi).contains(i) && e.lower.contains(&needle))
            .map(|(i, _)| i)
            .collect();

        let tier = if lo < exact_end {
            Some(MatchTier::Exact)
        } else if lo < hi {
            Some(MatchTier::Prefix)
        } else if !substring.is_empty() {
            Some(MatchTier::Substring)
        } else {
            None
        };
        if tier.is_some() {
            let mut ranked = self.ranked_run(lo..exact_end);
            ranked.extend(self.ranked_run(exact_end..hi));
            ranked.extend(self.ranked_names(&substring));
            return MatchSet {
                tier,
                all: &[],
                ranked,
            };
        }

        let ranked = self.fuzzy_ranked(&needle);
        MatchSet {
            tier: (!ranked.is_empty()).then_some(MatchTier::Fuzzy),
            all: &[],
            ranked,
        }
    }

    /// Records of a contiguous name block, ranked within the tier.
    fn ranked_run(&self, names: Range<usize>) -> Vec<&Arc<PackageRecord>> {
        if names.is_empty() {
            return Vec::new();
        }
        let start = self.names[names.start].records.start;
        let end = self.names[names.end - 1].records.end;
        self.ranked_records(start..end)
    }

    /// Records of scattered names, ranked within the tier.
    fn ranked_names(&self, names: &[usize]) -> Vec<&Arc<PackageRecord>> {
        let mut positions: Vec<usize> = names
            .iter()
            .flat_map(|&i| self.names[i].records.clone())
            .collect();
        self.sort_positions(&mut positions);
        positions.into_iter().map(|p| &self.records[p]).collect()
    }

    fn ranked_records(&self, span: Range<usize>) -> Vec<&Arc<PackageRecord>> {
        let mut positions: Vec<usize> = span.collect();
        self.sort_positions(&mut positions);
        positions.into_iter().map(|p| &self.records[p]).collect()
    }

    /// Version descending; canonical position breaks ties, which orders by name.
    fn sort_positions(&self, positions: &mut [usize]) {
        positions.sort_by(|&a, &b| {
            self.records[b]
                .version
                .cmp(&self.records[a].version)
                .then(a.cmp(&b))
        });
    }

    /// Records whose name matches `needle` as a fuzzy subsequence.
    ///
    /// Best score first, then newest version, then canonical position.
    fn fuzzy_ranked(&self, needle: &str) -> Vec<&Arc<PackageRecord>> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, usize)> = self
            .names
            .iter()
            .filter_map(|e| {
                matcher
                    .fuzzy_match(&e.lower, needle)
                    .map(|score| (score, e.records.clone()))
            })
            .flat_map(|(score, run)| run.map(move |p| (score, p)))
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| self.records[b.1].version.cmp(&self.records[a.1].version))
                .then(a.1.cmp(&b.1))
        });
        scored.into_iter().map(|(_, p)| &self.records[p]).collect()
    }

    /// What: One page of records matching `text`.
    ///
    /// Inputs:
    /// - `text`: Filter text (names only, no structured filters).
    /// - `limit`: Page size; `0` is treated as `1`.
    /// - `offset`: Position of the first record in the full result list.
    ///
    /// Output:
    /// - `ResultPage` stamped with this index's identity.
    #[must_use]
    pub fn search(&self, text: &str, limit: usize, offset: usize) -> ResultPage {
        let set = self.matches(text);
        let total = set.len();
        paginate(set.iter(), total, limit, offset, self.id, set.tier())
    }
}
