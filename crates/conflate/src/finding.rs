//! Validation findings, their auto-fixes, and where they are reported.

use parking_lot::Mutex;
use serde::Serialize;

use crate::model::{AddressPoint, AffectedSides, LocalityId, SegmentId, SiteId};
use crate::side::SideSummary;
use crate::street::StreetId;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A street as named in findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreetRef {
    pub street: StreetId,
    pub name: String,
    pub segments: Vec<SegmentId>,
}

/// How many streets a validated block held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockContext {
    /// One street, wholly inside the block.
    Uniform,
    /// One street reaching past the block.
    Span,
    /// Several streets, each wholly inside the block.
    Shared,
}

/// A per-street, per-block range problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockIssue {
    pub block: i64,
    pub context: BlockContext,
    pub street: StreetRef,
    pub sides: AffectedSides,
    pub ranges: Vec<SideSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    MalformedSite {
        site: SiteId,
        reason: String,
    },
    MalformedSegment {
        segment: SegmentId,
        reason: String,
    },
    /// No addressable segment sharing a street name within the largest radius.
    NoMatchingSegment {
        site: SiteId,
        civic: Option<i64>,
        current: Option<SegmentId>,
    },
    /// A better segment than the assigned one exists.
    NotClosest {
        site: SiteId,
        civic: Option<i64>,
        current: Option<SegmentId>,
        best: SegmentId,
        distance: f64,
    },
    /// Neither side of the street would take the point.
    SiteUnplaced {
        site: SiteId,
        civic: Option<i64>,
        street: StreetRef,
    },
    NoSegmentNumbers(BlockIssue),
    NoAddressPoints(BlockIssue),
    RangesDiffer(BlockIssue),
    SchemeDiffers {
        issue: BlockIssue,
        sites: Vec<SiteId>,
    },
    DuplicateCivic {
        block: i64,
        civic: i64,
        suffix: Option<String>,
        sites: Vec<SiteId>,
        streets: Vec<StreetRef>,
        /// The one virtual duplicate, when exactly one is virtual.
        virtual_site: Option<SiteId>,
    },
    /// Several streets share a block and not all lie wholly inside it.
    BlockUnresolved {
        block: i64,
        streets: Vec<StreetRef>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Entity a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Site(SiteId),
    Segment(SegmentId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum FindingGeometry {
    Point([f64; 2]),
    MultiPoint(Vec<[f64; 2]>),
    LineString(Vec<[f64; 2]>),
}

// ---------------------------------------------------------------------------
// Auto-fix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AutoFix {
    /// Set the point's transport-line id.
    SetSegment { site: SiteId, segment: SegmentId },
    /// Null out the point's transport-line id.
    ClearSegment { site: SiteId },
    /// Delete a duplicate point.
    DeleteSite { site: SiteId },
}

impl AutoFix {
    pub fn site(&self) -> SiteId {
        match self {
            Self::SetSegment { site, .. }
            | Self::ClearSegment { site }
            | Self::DeleteSite { site } => *site,
        }
    }

    /// Apply to a point list, returning the fixed list.
    pub fn apply(&self, points: &[AddressPoint]) -> Vec<AddressPoint> {
        match self {
            Self::SetSegment { site, segment } => points
                .iter()
                .cloned()
                .map(|mut p| {
                    if p.id == *site {
                        p.segment = Some(*segment);
                    }
                    p
                })
                .collect(),
            Self::ClearSegment { site } => points
                .iter()
                .cloned()
                .map(|mut p| {
                    if p.id == *site {
                        p.segment = None;
                    }
                    p
                })
                .collect(),
            Self::DeleteSite { site } => points.iter().filter(|p| p.id != *site).cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub locality: LocalityId,
    #[serde(flatten)]
    pub kind: FindingKind,
    pub geometry: Option<FindingGeometry>,
    pub message: String,
}

impl Finding {
    pub fn new(locality: LocalityId, kind: FindingKind, geometry: Option<FindingGeometry>) -> Self {
        let message = kind.describe();
        Self {
            locality,
            kind,
            geometry,
            message,
        }
    }

    pub fn severity(&self) -> Severity {
        match &self.kind {
            FindingKind::MalformedSite { .. }
            | FindingKind::MalformedSegment { .. }
            | FindingKind::NoMatchingSegment { .. }
            | FindingKind::DuplicateCivic { .. } => Severity::Error,
            FindingKind::NotClosest { .. }
            | FindingKind::NoSegmentNumbers(_)
            | FindingKind::NoAddressPoints(_)
            | FindingKind::RangesDiffer(_)
            | FindingKind::SchemeDiffers { .. } => Severity::Warning,
            FindingKind::SiteUnplaced { .. } | FindingKind::BlockUnresolved { .. } => {
                Severity::Info
            }
        }
    }

    pub fn auto_fix(&self) -> Option<AutoFix> {
        match &self.kind {
            FindingKind::NoMatchingSegment {
                site,
                current: Some(_),
                ..
            } => Some(AutoFix::ClearSegment { site: *site }),
            FindingKind::NotClosest { site, best, .. } => Some(AutoFix::SetSegment {
                site: *site,
                segment: *best,
            }),
            FindingKind::DuplicateCivic {
                virtual_site: Some(site),
                ..
            } => Some(AutoFix::DeleteSite { site: *site }),
            FindingKind::MalformedSite { .. }
            | FindingKind::MalformedSegment { .. }
            | FindingKind::NoMatchingSegment { .. }
            | FindingKind::SiteUnplaced { .. }
            | FindingKind::NoSegmentNumbers(_)
            | FindingKind::NoAddressPoints(_)
            | FindingKind::RangesDiffer(_)
            | FindingKind::SchemeDiffers { .. }
            | FindingKind::DuplicateCivic { .. }
            | FindingKind::BlockUnresolved { .. } => None,
        }
    }

    pub fn entities(&self) -> Vec<EntityRef> {
        let segments = |street: &StreetRef| {
            street
                .segments
                .iter()
                .map(|s| EntityRef::Segment(*s))
                .collect::<Vec<_>>()
        };
        match &self.kind {
            FindingKind::MalformedSite { site, .. }
            | FindingKind::NoMatchingSegment { site, .. } => vec![EntityRef::Site(*site)],
            FindingKind::MalformedSegment { segment, .. } => vec![EntityRef::Segment(*segment)],
            FindingKind::NotClosest { site, best, .. } => {
                vec![EntityRef::Site(*site), EntityRef::Segment(*best)]
            }
            FindingKind::SiteUnplaced { site, street, .. } => {
                let mut out = vec![EntityRef::Site(*site)];
                out.extend(segments(street));
                out
            }
            FindingKind::NoSegmentNumbers(issue)
            | FindingKind::NoAddressPoints(issue)
            | FindingKind::RangesDiffer(issue) => segments(&issue.street),
            FindingKind::SchemeDiffers { issue, sites } => {
                let mut out = segments(&issue.street);
                out.extend(sites.iter().map(|s| EntityRef::Site(*s)));
                out
            }
            FindingKind::DuplicateCivic { sites, .. } => {
                sites.iter().map(|s| EntityRef::Site(*s)).collect()
            }
            FindingKind::BlockUnresolved { streets, .. } => {
                streets.iter().flat_map(segments).collect()
            }
        }
    }
}

fn civic_text(civic: &Option<i64>) -> String {
    civic.map_or_else(|| "-".to_string(), |c| c.to_string())
}

fn issue_text(issue: &BlockIssue) -> String {
    format!(
        "{} ({}) block {} {}",
        issue.street.name, issue.street.street, issue.block, issue.sides
    )
}

impl FindingKind {
    /// One-line description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::MalformedSite { site, reason } => format!("{site}: malformed: {reason}"),
            Self::MalformedSegment { segment, reason } => {
                format!("{segment}: malformed: {reason}")
            }
            Self::NoMatchingSegment { site, civic, .. } => {
                format!("{site} ({}): no matching road segment", civic_text(civic))
            }
            Self::NotClosest {
                site,
                civic,
                current,
                best,
                distance,
            } => {
                let assigned = match current {
                    Some(segment) => format!("assigned to {segment}"),
                    None => "has no segment".to_string(),
                };
                format!(
                    "{site} ({}): {assigned}, closest match is {best} at {distance:.1}",
                    civic_text(civic)
                )
            }
            Self::SiteUnplaced { site, civic, street } => format!(
                "{site} ({}): no side of {} takes this number",
                civic_text(civic),
                street.name
            ),
            Self::NoSegmentNumbers(issue) => {
                format!("{}: address points but no road segment numbers", issue_text(issue))
            }
            Self::NoAddressPoints(issue) => {
                format!("{}: road segment numbers but no address points", issue_text(issue))
            }
            Self::RangesDiffer(issue) => {
                let ranges: Vec<String> = issue
                    .ranges
                    .iter()
                    .map(|r| {
                        format!(
                            "{} declared {} observed {}",
                            r.side,
                            r.declared.as_deref().unwrap_or("-"),
                            r.observed.as_deref().unwrap_or("-")
                        )
                    })
                    .collect();
                format!("{}: ranges differ ({})", issue_text(issue), ranges.join("; "))
            }
            Self::SchemeDiffers { issue, .. } => {
                let schemes: Vec<String> = issue
                    .ranges
                    .iter()
                    .map(|r| {
                        format!(
                            "{} declared {} observed {}",
                            r.side, r.scheme, r.observed_scheme
                        )
                    })
                    .collect();
                format!("{}: scheme differs ({})", issue_text(issue), schemes.join("; "))
            }
            Self::DuplicateCivic {
                civic,
                suffix,
                sites,
                streets,
                ..
            } => {
                let names: Vec<&str> = streets.iter().map(|s| s.name.as_str()).collect();
                format!(
                    "civic {civic}{} appears {} times on {}",
                    suffix.as_deref().unwrap_or(""),
                    sites.len(),
                    names.join(", ")
                )
            }
            Self::BlockUnresolved { block, streets } => format!(
                "block {block}: {} streets share the block and cannot be resolved",
                streets.len()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receives findings as localities finish. Shared across workers.
pub trait FindingSink: Send + Sync {
    fn report(&self, finding: &Finding);
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<Finding>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FindingSink for CollectingSink {
    fn report(&self, finding: &Finding) {
        self.findings.lock().push(finding.clone());
    }
}

/// Writes findings to the log facade at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FindingSink for LogSink {
    fn report(&self, finding: &Finding) {
        match finding.severity() {
            Severity::Error => log::error!("{}: {}", finding.locality, finding.message),
            Severity::Warning => log::warn!("{}: {}", finding.locality, finding.message),
            Severity::Info => log::info!("{}: {}", finding.locality, finding.message),
        }
    }
}
