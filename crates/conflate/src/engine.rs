//! One locality pass.
//!
//! A pass moves strictly through
//! `Loaded -> TopologyBuilt -> PointsAssigned -> BlocksDerived -> Validated -> Done`.
//! Each stage method checks the current state first and refuses to run out
//! of order. Any error ends the pass with an incomplete report that carries
//! no findings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::Utc;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::assign::assign_sites;
use crate::block::{derive_blocks, AddressBlock};
use crate::classify::BlockValidator;
use crate::config::ConflateConfig;
use crate::error::ConflateError;
use crate::evidence::{self, finding_counts, Tally};
use crate::expand::expand_ranges;
use crate::finding::{Finding, FindingGeometry, FindingKind, StreetRef};
use crate::geometry::SegmentIndex;
use crate::matcher::{LineMatcher, MatchOutcome};
use crate::model::{AddressPoint, LocalityId, RoadSegment, SegmentId};
use crate::registry::{Lookups, Registry};
use crate::street::{StreetArena, StreetId};
use crate::topology::build_streets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Loaded,
    TopologyBuilt,
    PointsAssigned,
    BlocksDerived,
    Validated,
    Done,
}

impl PassState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::TopologyBuilt => "topology_built",
            Self::PointsAssigned => "points_assigned",
            Self::BlocksDerived => "blocks_derived",
            Self::Validated => "validated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Incomplete { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalityReport {
    pub locality: LocalityId,
    pub name: Option<String>,
    #[serde(flatten)]
    pub status: ReportStatus,
    pub started_at: String,
    pub finished_at: String,
    pub findings: Vec<Finding>,
    /// Findings per kind.
    pub by_kind: BTreeMap<String, usize>,
    pub tally: Tally,
}

impl LocalityReport {
    pub fn is_complete(&self) -> bool {
        self.status == ReportStatus::Complete
    }

    pub(crate) fn incomplete(locality: LocalityId, reason: String, started_at: String) -> Self {
        Self {
            locality,
            name: None,
            status: ReportStatus::Incomplete { reason },
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            findings: Vec::new(),
            by_kind: BTreeMap::new(),
            tally: Tally::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Working state of one locality pass. Owns copies of every entity it
/// reads; nothing here is shared with other passes.
pub struct LocalityContext<'a> {
    locality: LocalityId,
    name: String,
    config: &'a ConflateConfig,
    lookups: &'a dyn Lookups,
    state: PassState,
    started_at: String,

    segments: Vec<RoadSegment>,
    points: Vec<AddressPoint>,
    segment_index: FxHashMap<SegmentId, usize>,

    streets: StreetArena,
    street_of: FxHashMap<SegmentId, StreetId>,
    blocks: BTreeMap<i64, AddressBlock>,

    findings: Vec<Finding>,
    tally: Tally,
}

impl<'a> LocalityContext<'a> {
    /// Fetch and validate a locality's entities. Malformed entities become
    /// findings and are left out of the pass.
    pub fn load(
        locality: LocalityId,
        registry: &dyn Registry,
        lookups: &'a dyn Lookups,
        config: &'a ConflateConfig,
    ) -> Result<Self, ConflateError> {
        let started_at = Utc::now().to_rfc3339();
        let name = lookups
            .locality_name(locality)
            .ok_or(ConflateError::MissingLocality(locality))?;
        let registry_error = |e: crate::registry::RegistryError| ConflateError::Registry {
            locality,
            message: e.message,
        };
        let segment_records = registry.road_segments(locality).map_err(registry_error)?;
        let site_records = registry.address_points(locality).map_err(registry_error)?;

        let mut findings = Vec::new();
        let mut segments = Vec::with_capacity(segment_records.len());
        for record in segment_records {
            let id = record.id;
            match record.into_segment() {
                Ok(segment) if segment.belongs_to(locality) => segments.push(segment),
                Ok(segment) => debug!("{locality}: {} belongs elsewhere", segment.id),
                Err(reason) => {
                    warn!("{locality}: {id} excluded: {reason}");
                    findings.push(Finding::new(
                        locality,
                        FindingKind::MalformedSegment { segment: id, reason },
                        None,
                    ));
                }
            }
        }

        let mut points = Vec::with_capacity(site_records.len());
        for record in site_records {
            let id = record.id;
            let location = record.location;
            match record.into_point() {
                Ok(point) => points.push(point),
                Err(reason) => {
                    warn!("{locality}: {id} excluded: {reason}");
                    findings.push(Finding::new(
                        locality,
                        FindingKind::MalformedSite { site: id, reason },
                        location.map(FindingGeometry::Point),
                    ));
                }
            }
        }

        let segment_index = segments
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let mut tally = Tally::new();
        tally.add(evidence::SITE, points.len());

        debug!(
            "{locality}: loaded {} segments, {} sites",
            segments.len(),
            points.len()
        );
        Ok(Self {
            locality,
            name,
            config,
            lookups,
            state: PassState::Loaded,
            started_at,
            segments,
            points,
            segment_index,
            streets: StreetArena::new(),
            street_of: FxHashMap::default(),
            blocks: BTreeMap::new(),
            findings,
            tally,
        })
    }

    fn advance(&mut self, from: PassState, to: PassState) -> Result<(), ConflateError> {
        if self.state != from {
            return Err(ConflateError::InvalidTransition {
                from: self.state.name(),
                to: to.name(),
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn build_topology(&mut self) -> Result<(), ConflateError> {
        self.advance(PassState::Loaded, PassState::TopologyBuilt)?;
        let topology = build_streets(&self.segments, &self.config.topology);
        self.streets = topology.streets;
        self.street_of = self
            .streets
            .iter()
            .flat_map(|street| {
                street
                    .segment_indices()
                    .map(|i| (self.segments[i].id, street.id))
                    .collect::<Vec<_>>()
            })
            .collect();
        self.tally.add(evidence::STREET, self.streets.len());
        self.tally.add(evidence::STREET_MERGED, topology.merges);
        Ok(())
    }

    /// Match every point to its best segment, then place points on street
    /// sides.
    pub fn assign_points(&mut self) -> Result<(), ConflateError> {
        self.advance(PassState::TopologyBuilt, PassState::PointsAssigned)?;
        self.match_points();

        let outcome = assign_sites(
            &mut self.streets,
            &self.points,
            &self.street_of,
            &self.config.assignment,
        );
        self.tally.add(evidence::VIRTUAL_MOVED, outcome.virtual_moved);
        for (index, street) in outcome.unplaced {
            let Some(street) = self.streets.get(street) else {
                continue;
            };
            let point = &self.points[index];
            self.findings.push(Finding::new(
                self.locality,
                FindingKind::SiteUnplaced {
                    site: point.id,
                    civic: point.civic,
                    street: StreetRef {
                        street: street.id,
                        name: street.display_name(&self.segments, self.lookups),
                        segments: street.segment_ids(&self.segments),
                    },
                },
                Some(FindingGeometry::Point(point.coords())),
            ));
        }
        Ok(())
    }

    fn match_points(&mut self) {
        let index = SegmentIndex::build(
            self.segments
                .iter()
                .enumerate()
                .filter(|(_, s)| s.addressable)
                .map(|(i, s)| (i, &s.geometry)),
        );
        let matcher = LineMatcher::new(
            &self.segments,
            &index,
            &self.config.matcher,
            self.config.assignment.on_line_tolerance,
        );

        let mut updates: Vec<(usize, Option<SegmentId>)> = Vec::new();
        let mut findings = Vec::new();
        for (i, point) in self.points.iter().enumerate() {
            let current = point
                .segment
                .and_then(|id| self.segment_index.get(&id).copied());
            let geometry = Some(FindingGeometry::Point(point.coords()));
            match matcher.match_point(point, current) {
                MatchOutcome::Confirmed { .. } => self.tally.incr(evidence::SITE_MATCHED),
                MatchOutcome::Reassigned { to, distance, .. } => {
                    let best = self.segments[to].id;
                    if point.segment.is_some() {
                        self.tally.incr(evidence::SITE_REASSIGNED);
                    } else {
                        self.tally.incr(evidence::SITE_ASSIGNED);
                    }
                    findings.push(Finding::new(
                        self.locality,
                        FindingKind::NotClosest {
                            site: point.id,
                            civic: point.civic,
                            current: point.segment,
                            best,
                            distance,
                        },
                        geometry,
                    ));
                    updates.push((i, Some(best)));
                }
                MatchOutcome::Unmatched => {
                    findings.push(Finding::new(
                        self.locality,
                        FindingKind::NoMatchingSegment {
                            site: point.id,
                            civic: point.civic,
                            current: point.segment,
                        },
                        geometry,
                    ));
                    updates.push((i, None));
                }
            }
        }

        // The pass continues on the corrected working copy.
        for (i, segment) in updates {
            self.points[i].segment = segment;
        }
        self.findings.extend(findings);
    }

    pub fn derive_blocks(&mut self) -> Result<(), ConflateError> {
        self.advance(PassState::PointsAssigned, PassState::BlocksDerived)?;
        self.blocks = derive_blocks(&self.streets);
        let expanded = expand_ranges(&mut self.streets, &self.blocks, &self.config.expansion);
        self.tally.add(evidence::BLOCK_EXPANDED, expanded);
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), ConflateError> {
        self.advance(PassState::BlocksDerived, PassState::Validated)?;
        let validator = BlockValidator {
            locality: self.locality,
            streets: &self.streets,
            segments: &self.segments,
            points: &self.points,
            lookups: self.lookups,
        };
        let findings = validator.validate(&self.blocks, &mut self.tally);
        self.findings.extend(findings);
        Ok(())
    }

    pub fn finish(mut self) -> Result<LocalityReport, ConflateError> {
        self.advance(PassState::Validated, PassState::Done)?;
        Ok(LocalityReport {
            locality: self.locality,
            name: Some(self.name),
            status: ReportStatus::Complete,
            started_at: self.started_at,
            finished_at: Utc::now().to_rfc3339(),
            by_kind: finding_counts(&self.findings),
            findings: self.findings,
            tally: self.tally,
        })
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn locality(&self) -> LocalityId {
        self.locality
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    /// Working copy of the points, with matcher corrections applied.
    pub fn points(&self) -> &[AddressPoint] {
        &self.points
    }

    pub fn streets(&self) -> &StreetArena {
        &self.streets
    }

    pub fn blocks(&self) -> &BTreeMap<i64, AddressBlock> {
        &self.blocks
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Streets a point ended up on, for inspection.
    pub fn streets_of_site(&self, index: usize) -> BTreeSet<StreetId> {
        self.streets
            .iter()
            .filter(|s| {
                s.left.sites().iter().any(|x| x.site == index)
                    || s.right.sites().iter().any(|x| x.site == index)
            })
            .map(|s| s.id)
            .collect()
    }
}

fn run_stages(
    locality: LocalityId,
    registry: &dyn Registry,
    lookups: &dyn Lookups,
    config: &ConflateConfig,
) -> Result<LocalityReport, ConflateError> {
    let mut ctx = LocalityContext::load(locality, registry, lookups, config)?;
    ctx.build_topology()?;
    ctx.assign_points()?;
    ctx.derive_blocks()?;
    ctx.validate()?;
    ctx.finish()
}

/// Run a full pass over one locality. Never fails: errors produce an
/// incomplete report.
pub fn run_locality(
    locality: LocalityId,
    registry: &dyn Registry,
    lookups: &dyn Lookups,
    config: &ConflateConfig,
) -> LocalityReport {
    let started_at = Utc::now().to_rfc3339();
    info!("{locality}: pass started");
    match run_stages(locality, registry, lookups, config) {
        Ok(report) => {
            info!(
                "{locality}: pass complete, {} findings",
                report.findings.len()
            );
            report
        }
        Err(e) => {
            warn!("{locality}: pass incomplete: {e}");
            LocalityReport::incomplete(locality, e.to_string(), started_at)
        }
    }
}
