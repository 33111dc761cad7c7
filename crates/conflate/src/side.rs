//! One side of a street: the declared range merged from its segments and
//! the range observed from the address points assigned to it.

use std::collections::BTreeSet;

use civic_core::{block_from, block_span, Interval, Scheme};
use serde::Serialize;

use crate::model::{LocalityId, Side, SideNumbering};

/// A point assigned to a street side.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOnSide {
    /// Index of the point within the locality pass.
    pub site: usize,
    /// Numbers tested against the side (civic, or unit numbers on strata).
    pub numbers: Vec<i64>,
    /// Distance along the street.
    pub along: f64,
    pub is_virtual: bool,
}

#[derive(Debug, Clone)]
pub struct SideAddressRange {
    pub side: Side,
    pub locality: LocalityId,
    pub scheme: Scheme,
    /// Number at the start of the street, in travel direction.
    pub from: Option<i64>,
    /// Number at the end of the street, in travel direction.
    pub to: Option<i64>,
    /// Hull of every segment's declared range.
    pub interval: Option<Interval>,

    /// Declared range of each addressed segment, in travel order. Numbers
    /// between two parts are not declared even when the hull covers them.
    parts: Vec<(Scheme, Interval)>,

    sites: Vec<SiteOnSide>,
    site_numbers: Vec<i64>,
    site_scheme: Scheme,
    site_from: Option<i64>,
    site_to: Option<i64>,

    expanded: Option<Interval>,
    expanded_blocks: BTreeSet<i64>,
}

/// Serializable view used in findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideSummary {
    pub side: Side,
    pub scheme: Scheme,
    pub declared: Option<String>,
    pub observed: Option<String>,
    pub observed_scheme: Scheme,
}

impl SideAddressRange {
    /// Merge the direction-resolved numbering of consecutive segments.
    pub fn declared(side: Side, parts: &[SideNumbering]) -> Self {
        let locality = parts.first().map_or(LocalityId(0), |p| p.locality);
        let scheme = parts
            .iter()
            .fold(Scheme::None, |acc, p| acc.union(p.scheme));
        let addressed: Vec<&SideNumbering> = parts.iter().filter(|p| p.has_addressing()).collect();
        let from = addressed.first().and_then(|p| p.from);
        let to = addressed.last().and_then(|p| p.to);
        let parts: Vec<(Scheme, Interval)> = addressed
            .iter()
            .filter_map(|p| Some((p.scheme, p.interval()?)))
            .collect();
        let interval = parts.iter().map(|(_, iv)| *iv).reduce(|a, b| a.union(&b));

        Self {
            side,
            locality,
            scheme,
            from,
            to,
            interval,
            parts,
            sites: Vec::new(),
            site_numbers: Vec::new(),
            site_scheme: Scheme::None,
            site_from: None,
            site_to: None,
            expanded: None,
            expanded_blocks: BTreeSet::new(),
        }
    }

    pub fn has_addressing(&self) -> bool {
        !self.scheme.is_none() && !self.parts.is_empty()
    }

    pub fn declared_parts(&self) -> &[(Scheme, Interval)] {
        &self.parts
    }

    // -----------------------------------------------------------------------
    // Declared-range tests
    // -----------------------------------------------------------------------

    /// Some segment's declared numbering covers `n`.
    pub fn declares(&self, n: i64) -> bool {
        self.parts
            .iter()
            .any(|(scheme, iv)| scheme.accepts(n) && iv.contains(n))
    }

    /// Every number is declared by one of the merged segments.
    pub fn accepts_declared(&self, numbers: &[i64]) -> bool {
        !numbers.is_empty() && numbers.iter().all(|n| self.declares(*n))
    }

    /// Every number fits the scheme.
    pub fn accepts_scheme(&self, numbers: &[i64]) -> bool {
        !numbers.is_empty() && numbers.iter().all(|n| self.scheme.accepts(*n))
    }

    /// The scheme does not actively reject any of the numbers. A side with
    /// no scheme rejects nothing.
    pub fn admits(&self, numbers: &[i64]) -> bool {
        self.scheme.is_none() || self.accepts_scheme(numbers)
    }

    // -----------------------------------------------------------------------
    // Observed range
    // -----------------------------------------------------------------------

    pub fn add_site(&mut self, site: SiteOnSide) {
        self.sites.push(site);
    }

    pub fn remove_site(&mut self, site: usize) -> Option<SiteOnSide> {
        let pos = self.sites.iter().position(|s| s.site == site)?;
        Some(self.sites.remove(pos))
    }

    pub fn sites(&self) -> &[SiteOnSide] {
        &self.sites
    }

    /// Rebuild the observed numbers after sites were added or moved.
    pub fn recompute(&mut self) {
        self.sites
            .sort_by(|a, b| a.along.total_cmp(&b.along).then(a.site.cmp(&b.site)));
        self.site_numbers = self
            .sites
            .iter()
            .flat_map(|s| {
                let mut numbers = s.numbers.clone();
                numbers.sort_unstable();
                numbers
            })
            .collect();
        self.site_scheme = Scheme::classify(self.site_numbers.iter().copied());

        let (first, last) = match (self.site_numbers.first(), self.site_numbers.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => {
                self.site_from = None;
                self.site_to = None;
                return;
            }
        };
        let min = self.site_numbers.iter().copied().min().unwrap_or(first);
        let max = self.site_numbers.iter().copied().max().unwrap_or(last);
        if first <= last {
            self.site_from = Some(min);
            self.site_to = Some(max);
        } else {
            self.site_from = Some(max);
            self.site_to = Some(min);
        }
    }

    /// Observed numbers in street order.
    pub fn site_numbers(&self) -> &[i64] {
        &self.site_numbers
    }

    pub fn site_scheme(&self) -> Scheme {
        self.site_scheme
    }

    pub fn site_from(&self) -> Option<i64> {
        self.site_from
    }

    pub fn site_to(&self) -> Option<i64> {
        self.site_to
    }

    pub fn observed_interval(&self) -> Option<Interval> {
        Interval::spanning(self.site_numbers.iter().copied())
    }

    /// Declared ends equal the observed ends, direction included.
    pub fn has_exact_match(&self) -> bool {
        self.from.is_some() && self.from == self.site_from && self.to == self.site_to
    }

    pub fn numbers_in_block(&self, block: i64) -> Vec<i64> {
        self.site_numbers
            .iter()
            .copied()
            .filter(|n| block_from(*n) == block)
            .collect()
    }

    pub fn sites_in_block(&self, block: i64) -> impl Iterator<Item = &SiteOnSide> {
        self.sites
            .iter()
            .filter(move |s| s.numbers.iter().any(|n| block_from(*n) == block))
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    /// Declared range, widened by any expansion.
    pub fn effective_interval(&self) -> Option<Interval> {
        match (self.interval, self.expanded) {
            (Some(iv), Some(ex)) => Some(iv.union(&ex)),
            (iv, ex) => iv.or(ex),
        }
    }

    /// Declared parts and expansion restricted to one block, each clipped
    /// to its own parity.
    pub fn declared_in_block(&self, block: i64) -> Option<Interval> {
        let span = block_span(block);
        let expanded = self
            .is_expanded(block_from(block))
            .then(|| span.clip(&span, self.scheme))
            .flatten();
        self.parts
            .iter()
            .filter_map(|(scheme, iv)| iv.clip(&span, *scheme))
            .chain(expanded)
            .reduce(|a, b| a.union(&b))
    }

    pub fn expand_to(&mut self, block: i64) {
        let span = block_span(block);
        self.expanded = Some(match self.expanded {
            Some(ex) => ex.union(&span),
            None => span,
        });
        self.expanded_blocks.insert(block);
    }

    pub fn is_expanded(&self, block: i64) -> bool {
        self.expanded_blocks.contains(&block)
    }

    pub fn expanded_blocks(&self) -> impl Iterator<Item = i64> + '_ {
        self.expanded_blocks.iter().copied()
    }

    /// Blocks touched by at least one declared part, ascending.
    pub fn declared_blocks(&self) -> Vec<i64> {
        let blocks: BTreeSet<i64> = self.parts.iter().flat_map(|(_, iv)| iv.blocks()).collect();
        blocks.into_iter().collect()
    }

    pub fn summary(&self, block: i64) -> SideSummary {
        let observed = self.numbers_in_block(block);
        SideSummary {
            side: self.side,
            scheme: self.scheme,
            declared: self.declared_in_block(block).map(|iv| iv.to_string()),
            observed: Interval::spanning(observed.iter().copied()).map(|iv| iv.to_string()),
            observed_scheme: Scheme::classify(observed),
        }
    }
}
