use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::finding::{Finding, FindingKind};

// Counter names.
pub const STREET: &str = "Street";
pub const STREET_MERGED: &str = "Street merged";
pub const SITE: &str = "Site";
pub const SITE_MATCHED: &str = "Site matched";
pub const SITE_REASSIGNED: &str = "Site reassigned";
/// A point with no segment given its first one by the matcher.
pub const SITE_ASSIGNED: &str = "Site assigned";
pub const VIRTUAL_MOVED: &str = "Virtual moved";
pub const BLOCK: &str = "Block";
pub const BLOCK_MATCHED: &str = "Block matched";
pub const BLOCK_UNRESOLVED: &str = "Block unresolved";
pub const BLOCK_EXPANDED: &str = "Block expanded";
pub const DUPLICATE: &str = "Duplicate";

/// Named counters for one locality pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tally {
    counts: BTreeMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &str, n: usize) {
        *self.counts.entry(name.to_string()).or_insert(0) += n;
    }

    pub fn get(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &Tally) {
        for (name, n) in &other.counts {
            self.add(name, *n);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Counters shared by all workers. Each locality's tally is merged in once,
/// when the locality finishes.
#[derive(Debug, Default)]
pub struct Counters {
    inner: Mutex<Tally>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, tally: &Tally) {
        self.inner.lock().merge(tally);
    }

    pub fn snapshot(&self) -> Tally {
        self.inner.lock().clone()
    }
}

fn kind_name(kind: &FindingKind) -> &'static str {
    match kind {
        FindingKind::MalformedSite { .. } => "malformed_site",
        FindingKind::MalformedSegment { .. } => "malformed_segment",
        FindingKind::NoMatchingSegment { .. } => "no_matching_segment",
        FindingKind::NotClosest { .. } => "not_closest",
        FindingKind::SiteUnplaced { .. } => "site_unplaced",
        FindingKind::NoSegmentNumbers(_) => "no_segment_numbers",
        FindingKind::NoAddressPoints(_) => "no_address_points",
        FindingKind::RangesDiffer(_) => "ranges_differ",
        FindingKind::SchemeDiffers { .. } => "scheme_differs",
        FindingKind::DuplicateCivic { .. } => "duplicate_civic",
        FindingKind::BlockUnresolved { .. } => "block_unresolved",
    }
}

/// Findings per kind.
pub fn finding_counts(findings: &[Finding]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for f in findings {
        *counts.entry(kind_name(&f.kind).to_string()).or_insert(0) += 1;
    }
    counts
}
