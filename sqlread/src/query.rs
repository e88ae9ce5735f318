//! The fixed range queries every run issues.

use std::fmt;

use crate::ConfigError;

pub const DEFAULT_TABLE: &str = "dbo.test_table";
pub const DEFAULT_TOTAL_ROWS: u64 = 50_000_000;
pub const DEFAULT_PARTITIONS: u64 = 5;

/// Key interval `(lo, hi]` over the fixture's `ID` column. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct QueryRange {
    lo: u64,
    hi: u64,
}

impl QueryRange {
    pub fn new(lo: u64, hi: u64) -> Result<Self, ConfigError> {
        if lo >= hi {
            return Err(ConfigError::EmptyRange { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> u64 {
        self.lo
    }

    pub fn hi(&self) -> u64 {
        self.hi
    }

    pub fn contains(&self, id: u64) -> bool {
        id > self.lo && id <= self.hi
    }

    pub fn len(&self) -> u64 {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn where_clause(&self) -> String {
        format!(" WHERE ID > {} AND ID <= {}", self.lo, self.hi)
    }
}

impl fmt::Display for QueryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.lo, self.hi)
    }
}

/// The ranges of one table and the SQL text for each, built once and reused
/// by every run.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    ranges: Vec<QueryRange>,
    queries: Vec<String>,
}

impl QueryPlan {
    /// Splits `(0, total_rows]` into `partitions` contiguous bands.
    ///
    /// Bands are `total_rows / partitions` wide; the last one also takes the remainder.
    pub fn partition(table: &str, total_rows: u64, partitions: u64) -> Result<Self, ConfigError> {
        if partitions == 0 {
            return Err(ConfigError::NoPartitions);
        }
        if total_rows < partitions {
            return Err(ConfigError::TooFewRows {
                total_rows,
                partitions,
            });
        }
        let band = total_rows / partitions;
        let ranges = (0..partitions)
            .map(|i| {
                let lo = i * band;
                let hi = if i + 1 == partitions {
                    total_rows
                } else {
                    lo + band
                };
                QueryRange::new(lo, hi)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ranges(table, ranges)
    }

    /// Ranges must be non-empty, sorted and contiguous: each one starts where
    /// the previous one ends.
    pub fn from_ranges(table: &str, ranges: Vec<QueryRange>) -> Result<Self, ConfigError> {
        if ranges.is_empty() {
            return Err(ConfigError::NoPartitions);
        }
        if let Some(pair) = ranges.windows(2).find(|pair| pair[0].hi != pair[1].lo) {
            return Err(ConfigError::NotContiguous {
                previous: pair[0].to_string(),
                next: pair[1].to_string(),
            });
        }
        let select = select_statement(table);
        let queries = ranges
            .iter()
            .map(|range| format!("{select}{}", range.where_clause()))
            .collect();
        Ok(Self { ranges, queries })
    }

    pub fn ranges(&self) -> &[QueryRange] {
        &self.ranges
    }

    /// SQL text of the `index`th range.
    pub fn query(&self, index: usize) -> &str {
        &self.queries[index]
    }

    pub fn range(&self, index: usize) -> QueryRange {
        self.ranges[index]
    }

    /// `(range, sql)` pairs in range order.
    pub fn iter(&self) -> impl Iterator<Item = (QueryRange, &str)> + '_ {
        self.ranges
            .iter()
            .copied()
            .zip(self.queries.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn total_rows(&self) -> u64 {
        self.ranges.iter().map(QueryRange::len).sum()
    }

    /// The range that would return row `id`, if any.
    pub fn range_of(&self, id: u64) -> Option<QueryRange> {
        self.ranges.iter().copied().find(|r| r.contains(id))
    }
}

pub fn select_statement(table: &str) -> String {
    format!("SELECT ID, c1, d1 FROM {table}")
}
