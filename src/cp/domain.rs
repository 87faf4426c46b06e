//! Integer domains.
//!
//! A domain is either a contiguous interval or an explicit set of values.
//! Every narrowing operation is pure: it returns the narrowed domain, or
//! `None` when nothing is left. Narrowing never widens.

use std::collections::BTreeSet;

/// Interior removals on intervals up to this size switch to an explicit set.
/// Larger intervals keep their bounds and ignore the hole.
const SPARSE_LIMIT: u64 = 1 << 16;

/// A non-empty set of integer values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    /// Every value in `[min, max]`.
    Interval {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
    },
    /// An explicit, non-empty set of values.
    Sparse(BTreeSet<i64>),
}

impl Domain {
    /// Interval domain, `None` when `min > max`.
    pub fn interval(min: i64, max: i64) -> Option<Self> {
        (min <= max).then_some(Domain::Interval { min, max })
    }

    /// Single-value domain.
    pub fn singleton(value: i64) -> Self {
        Domain::Interval {
            min: value,
            max: value,
        }
    }

    /// Explicit domain, `None` when no value is given.
    pub fn from_values(values: impl IntoIterator<Item = i64>) -> Option<Self> {
        let set: BTreeSet<i64> = values.into_iter().collect();
        Self::from_set(set)
    }

    fn from_set(set: BTreeSet<i64>) -> Option<Self> {
        match (set.first().copied(), set.last().copied()) {
            (Some(min), Some(max)) if max.abs_diff(min) + 1 == set.len() as u64 => {
                Some(Domain::Interval { min, max })
            }
            (Some(_), Some(_)) => Some(Domain::Sparse(set)),
            _ => None,
        }
    }

    /// Smallest value.
    pub fn min(&self) -> i64 {
        match self {
            Domain::Interval { min, .. } => *min,
            Domain::Sparse(set) => set.first().copied().unwrap_or(i64::MAX),
        }
    }

    /// Largest value.
    pub fn max(&self) -> i64 {
        match self {
            Domain::Interval { max, .. } => *max,
            Domain::Sparse(set) => set.last().copied().unwrap_or(i64::MIN),
        }
    }

    /// Number of values.
    pub fn size(&self) -> u64 {
        match self {
            Domain::Interval { min, max } => max.abs_diff(*min) + 1,
            Domain::Sparse(set) => set.len() as u64,
        }
    }

    /// Whether the domain holds `value`.
    pub fn contains(&self, value: i64) -> bool {
        match self {
            Domain::Interval { min, max } => *min <= value && value <= *max,
            Domain::Sparse(set) => set.contains(&value),
        }
    }

    /// Whether a single value is left.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.min() == self.max()
    }

    /// The value of a fixed domain.
    pub fn value(&self) -> Option<i64> {
        self.is_fixed().then(|| self.min())
    }

    /// Values in increasing order.
    pub fn values(&self) -> Vec<i64> {
        match self {
            Domain::Interval { min, max } => (*min..=*max).collect(),
            Domain::Sparse(set) => set.iter().copied().collect(),
        }
    }

    /// Domain without the values below `bound`.
    pub fn with_min(&self, bound: i64) -> Option<Self> {
        match self {
            Domain::Interval { min, max } => Self::interval((*min).max(bound), *max),
            Domain::Sparse(set) => Self::from_set(set.range(bound..).copied().collect()),
        }
    }

    /// Domain without the values above `bound`.
    pub fn with_max(&self, bound: i64) -> Option<Self> {
        match self {
            Domain::Interval { min, max } => Self::interval(*min, (*max).min(bound)),
            Domain::Sparse(set) => Self::from_set(set.range(..=bound).copied().collect()),
        }
    }

    /// Domain without `value`.
    pub fn without(&self, value: i64) -> Option<Self> {
        match self {
            Domain::Interval { min, max } if value == *min => Self::interval(min + 1, *max),
            Domain::Interval { min, max } if value == *max => Self::interval(*min, max - 1),
            Domain::Interval { min, max } if value < *min || value > *max => Some(self.clone()),
            Domain::Interval { min, max } if max.abs_diff(*min) < SPARSE_LIMIT => {
                Self::from_set((*min..=*max).filter(|&v| v != value).collect())
            }
            Domain::Interval { .. } => Some(self.clone()),
            Domain::Sparse(set) => {
                let mut set = set.clone();
                set.remove(&value);
                Self::from_set(set)
            }
        }
    }

    /// Domain restricted to the values of `other`.
    pub fn intersect(&self, other: &Domain) -> Option<Self> {
        match (self, other) {
            (Domain::Interval { min, max }, Domain::Interval { min: lo, max: hi }) => {
                Self::interval((*min).max(*lo), (*max).min(*hi))
            }
            (Domain::Sparse(set), d) | (d, Domain::Sparse(set)) => {
                Self::from_set(set.iter().copied().filter(|&v| d.contains(v)).collect())
            }
        }
    }

    /// Domain restricted to `values`.
    pub fn restrict(&self, values: &BTreeSet<i64>) -> Option<Self> {
        Self::from_set(values.iter().copied().filter(|&v| self.contains(v)).collect())
    }

    /// Whether every value of `self` belongs to `other`.
    pub fn is_subset_of(&self, other: &Domain) -> bool {
        match (self, other) {
            (Domain::Interval { min, max }, Domain::Interval { min: lo, max: hi }) => {
                lo <= min && max <= hi
            }
            (Domain::Sparse(set), d) => set.iter().all(|&v| d.contains(v)),
            (Domain::Interval { min, max }, Domain::Sparse(set)) => {
                set.range(*min..=*max).count() as u64 == max.abs_diff(*min) + 1
            }
        }
    }
}
