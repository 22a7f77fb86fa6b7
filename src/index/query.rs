//! Query engine: filter parsing, result pages and cursor pagination.
//!
//! Filter text is whitespace-separated. `field:value` tokens narrow the result
//! set; everything else is joined back into the name text ranked by the
//! package index.
//!
//! | Field | Meaning |
//! |---|---|
//! | `subdir:` / `platform:` | platform subdir equals value |
//! | `build:` | build string contains value |
//! | `depends:` / `dep:` | some dependency's package name equals value |
//! | `channel:` | channel base URL contains value |

use std::sync::Arc;

use super::{MatchTier, PackageIndex, PackageRecord, SnapshotId};

/// What: Position in the result list of one specific index build.
///
/// Details:
/// - Only meaningful against the index it was issued by; `execute` restarts
///   from the first page when the identity no longer matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// Index build the position refers to.
    pub index: SnapshotId,
    /// Offset of the next record to return.
    pub offset: usize,
}

/// What: Everything needed to produce one result page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    /// Raw filter text as typed.
    pub text: String,
    /// Records per page.
    pub page_size: usize,
    /// Continuation cursor; `None` for the first page.
    pub cursor: Option<Cursor>,
}

impl QuerySpec {
    /// First-page query for `text`.
    #[must_use]
    pub fn new(text: impl Into<String>, page_size: usize) -> Self {
        Self {
            text: text.into(),
            page_size,
            cursor: None,
        }
    }

    /// Same filter, continuing at `cursor`.
    #[must_use]
    pub fn with_cursor(&self, cursor: Option<Cursor>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

/// What: One page of ranked query results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultPage {
    /// Records on this page in rank order.
    pub records: Vec<Arc<PackageRecord>>,
    /// Matching records across all pages.
    pub total: usize,
    /// Offset of `records[0]` in the full result list.
    pub offset: usize,
    /// Cursor of the following page, `None` on the last page.
    pub next_cursor: Option<Cursor>,
    /// Index build the page was computed against.
    pub index_id: SnapshotId,
    /// Best match tier present, `None` when nothing matched.
    pub tier: Option<MatchTier>,
}

impl ResultPage {
    /// What: Placeholder page before any index exists.
    #[must_use]
    pub const fn empty(index_id: SnapshotId) -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            offset: 0,
            next_cursor: None,
            index_id,
            tier: None,
        }
    }

    /// 1-based page number for display.
    #[must_use]
    pub const fn page_number(&self, page_size: usize) -> usize {
        self.offset / if page_size == 0 { 1 } else { page_size } + 1
    }

    /// Total page count for display (at least 1).
    #[must_use]
    pub const fn page_count(&self, page_size: usize) -> usize {
        let size = if page_size == 0 { 1 } else { page_size };
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(size)
        }
    }
}

/// Malformed filter text. Shown next to the input, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// `field:` prefix that is not a known filter.
    #[error("unknown filter field '{0}' (use subdir:, build:, depends:, channel:)")]
    UnknownField(String),
    /// Known field with nothing after the colon.
    #[error("filter '{0}:' needs a value")]
    EmptyValue(String),
}

/// One structured filter, values already lowercased.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Filter {
    /// Platform subdir equals.
    Subdir(String),
    /// Build string contains.
    Build(String),
    /// A dependency name equals.
    Depends(String),
    /// Channel base URL contains.
    Channel(String),
}

impl Filter {
    /// Whether `record` passes this filter.
    fn accepts(&self, record: &PackageRecord) -> bool {
        match self {
            Self::Subdir(v) => record.subdir.eq_ignore_ascii_case(v),
            Self::Build(v) => record.build.to_lowercase().contains(v.as_str()),
            Self::Depends(v) => record
                .dependency_names()
                .any(|d| d.eq_ignore_ascii_case(v)),
            Self::Channel(v) => record.channel.base_url().to_lowercase().contains(v.as_str()),
        }
    }
}

/// Filter text split into name text and structured filters.
#[derive(Debug, PartialEq, Eq)]
struct ParsedFilter {
    /// Remaining tokens joined by single spaces.
    text: String,
    /// Structured filters, all of which must accept a record.
    filters: Vec<Filter>,
}

/// Split filter text into name text and structured filters.
fn parse_filter(text: &str) -> Result<ParsedFilter, QueryError> {
    let mut words = Vec::new();
    let mut filters = Vec::new();
    for token in text.split_whitespace() {
        let Some((field, value)) = token.split_once(':') else {
            words.push(token);
            continue;
        };
        let field = field.to_ascii_lowercase();
        let value = value.to_lowercase();
        let make: fn(String) -> Filter = match field.as_str() {
            "subdir" | "platform" => Filter::Subdir,
            "build" => Filter::Build,
            "depends" | "dep" => Filter::Depends,
            "channel" => Filter::Channel,
            _ => return Err(QueryError::UnknownField(field)),
        };
        if value.is_empty() {
            return Err(QueryError::EmptyValue(field));
        }
        filters.push(make(value));
    }
    Ok(ParsedFilter {
        text: words.join(" "),
        filters,
    })
}

/// What: Check filter text without running it.
///
/// # Errors
/// - `QueryError` for unknown fields or empty values.
pub fn validate(text: &str) -> Result<(), QueryError> {
    parse_filter(text).map(|_| ())
}

/// What: Run a query against an index.
///
/// Inputs:
/// - `spec`: Filter text, page size and optional cursor.
/// - `index`: Index to search.
///
/// Output:
/// - `ResultPage` for the requested position.
///
/// # Errors
/// - `QueryError` when the filter text is malformed.
///
/// Details:
/// - Pure: the same spec against the same index build always yields an equal page.
/// - A cursor issued by another index build is ignored and the first page is returned.
pub fn execute(spec: &QuerySpec, index: &PackageIndex) -> Result<ResultPage, QueryError> {
    let parsed = parse_filter(&spec.text)?;
    let offset = spec
        .cursor
        .filter(|c| c.index == index.id())
        .map_or(0, |c| c.offset);
    if parsed.filters.is_empty() {
        return Ok(index.search(&parsed.text, spec.page_size, offset));
    }

    let set = index.matches(&parsed.text);
    let limit = spec.page_size.max(1);
    let mut total = 0;
    let mut records = Vec::new();
    for record in set
        .iter()
        .filter(|r| parsed.filters.iter().all(|f| f.accepts(r)))
    {
        if total >= offset && records.len() < limit {
            records.push(Arc::clone(record));
        }
        total += 1;
    }
    let tier = if total == 0 { None } else { set.tier() };
    Ok(finish(records, total, offset, index.id(), tier))
}

/// What: Cut one page out of an already ranked record stream.
///
/// Inputs:
/// - `ranked`: Matching records in rank order.
/// - `total`: Length of `ranked`.
/// - `limit`: Page size; `0` is treated as `1`.
/// - `offset`: First position to return.
pub(crate) fn paginate<'a>(
    ranked: impl Iterator<Item = &'a Arc<PackageRecord>>,
    total: usize,
    limit: usize,
    offset: usize,
    index_id: SnapshotId,
    tier: Option<MatchTier>,
) -> ResultPage {
    let records = ranked.skip(offset).take(limit.max(1)).cloned().collect();
    finish(records, total, offset, index_id, tier)
}

/// Assemble a page and its continuation cursor.
fn finish(
    records: Vec<Arc<PackageRecord>>,
    total: usize,
    offset: usize,
    index_id: SnapshotId,
    tier: Option<MatchTier>,
) -> ResultPage {
    let end = offset + records.len();
    let next_cursor = (!records.is_empty() && end < total).then_some(Cursor {
        index: index_id,
        offset: end,
    });
    ResultPage {
        records,
        total,
        offset,
        next_cursor,
        index_id,
        tier,
    }
}
