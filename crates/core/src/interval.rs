//! Closed integer intervals and hundred-number block arithmetic.
//!
//! An [`Interval`] is always stored normalized (`min <= max`). Direction along
//! a street is tracked separately by the owner of the interval.

use serde::{Deserialize, Serialize};

use crate::scheme::Scheme;

/// Width of an address block.
pub const BLOCK_SIZE: i64 = 100;

/// Largest civic or unit number accepted from the registry.
pub const MAX_CIVIC: i64 = 999_999;

/// Most numbers one declared range or unit span may cover.
pub const MAX_SPAN: i64 = 100_000;

/// Whether `n` is a civic number the engine will load.
pub fn is_civic(n: i64) -> bool {
    (0..=MAX_CIVIC).contains(&n)
}

/// Block number of a civic number: `floor(n / 100) * 100`.
pub fn block_from(n: i64) -> i64 {
    n.div_euclid(BLOCK_SIZE) * BLOCK_SIZE
}

/// Last number of the block containing `n`.
pub fn block_to(n: i64) -> i64 {
    block_from(n).saturating_add(BLOCK_SIZE - 1)
}

/// Span `[block, block + 99]` of the block containing `n`.
pub fn block_span(n: i64) -> Interval {
    Interval::new(block_from(n), block_to(n))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    min: i64,
    max: i64,
}

impl Interval {
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn single(n: i64) -> Self {
        Self { min: n, max: n }
    }

    /// Hull of the given numbers, `None` when empty.
    pub fn spanning<I>(numbers: I) -> Option<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        numbers.into_iter().fold(None, |acc: Option<Interval>, n| {
            Some(match acc {
                Some(iv) => iv.union(&Interval::single(n)),
                None => Interval::single(n),
            })
        })
    }

    /// Lowest member.
    pub fn start(&self) -> i64 {
        self.min
    }

    /// Highest member.
    pub fn end(&self) -> i64 {
        self.max
    }

    /// Smallest interval covering both.
    pub fn union(&self, other: &Interval) -> Interval {
        Interval {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Interval { min, max })
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Restrict this interval to `span`, moving each end inward until it is
    /// a member of `scheme`. `None` when nothing of the scheme remains.
    pub fn clip(&self, span: &Interval, scheme: Scheme) -> Option<Interval> {
        let clipped = self.intersect(span)?;
        match scheme {
            Scheme::None => None,
            Scheme::Continuous => Some(clipped),
            Scheme::Odd | Scheme::Even => {
                let mut min = clipped.min;
                let mut max = clipped.max;
                if !scheme.accepts(min) {
                    min += 1;
                }
                if !scheme.accepts(max) {
                    max -= 1;
                }
                (min <= max).then_some(Interval { min, max })
            }
        }
    }

    /// Block numbers this interval touches, ascending.
    pub fn blocks(&self) -> impl Iterator<Item = i64> {
        let first = block_from(self.min);
        let last = block_from(self.max);
        (0..)
            .map(move |i| first + i * BLOCK_SIZE)
            .take_while(move |b| *b <= last)
    }

    /// Interval of whole blocks covered: `[block_from(min), block_to(max)]`.
    pub fn block_range(&self) -> Interval {
        Interval {
            min: block_from(self.min),
            max: block_to(self.max),
        }
    }

    /// Distance between the nearest blocks of two intervals: 0 when they
    /// share a block, 100 when the blocks are adjacent.
    pub fn block_gap(&self, other: &Interval) -> i64 {
        let a = self.block_range();
        let b = other.block_range();
        if a.overlaps(&b) {
            0
        } else if a.max < b.min {
            b.min - block_from(a.max)
        } else {
            a.min - block_from(b.max)
        }
    }

    pub fn len(&self) -> i64 {
        self.max.saturating_sub(self.min).saturating_add(1)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}
