//! Block validation.
//!
//! Each block is classified by the streets touching it. A block with a
//! single street is checked side by side against the declared range; a
//! block shared by several streets is only checked when every street lies
//! wholly inside it, and is reported unresolved otherwise. Duplicate civic
//! numbers are looked for in every block.

use std::collections::{BTreeMap, BTreeSet};

use civic_core::{block_from, Interval, Scheme};
use log::debug;

use crate::block::AddressBlock;
use crate::evidence::{self, Tally};
use crate::finding::{BlockContext, BlockIssue, Finding, FindingGeometry, FindingKind, StreetRef};
use crate::model::{AddressPoint, AffectedSides, LocalityId, RoadSegment, Side};
use crate::registry::Lookups;
use crate::street::{Street, StreetArena, StreetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    NoSegmentNumbers,
    NoAddressPoints,
    RangesDiffer,
    SchemeDiffers,
}

#[derive(Debug, Clone)]
struct SideFailure {
    failure: Failure,
    side: Side,
    /// Points on the side in this block, for scheme findings.
    sites: Vec<usize>,
}

pub struct BlockValidator<'a> {
    pub locality: LocalityId,
    pub streets: &'a StreetArena,
    pub segments: &'a [RoadSegment],
    pub points: &'a [AddressPoint],
    pub lookups: &'a dyn Lookups,
}

impl<'a> BlockValidator<'a> {
    pub fn validate(
        &self,
        blocks: &BTreeMap<i64, AddressBlock>,
        tally: &mut Tally,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for block in blocks.values() {
            tally.incr(evidence::BLOCK);
            self.validate_block(block, tally, &mut findings);
        }
        debug!(
            "validation: {} blocks, {} findings",
            blocks.len(),
            findings.len()
        );
        findings
    }

    fn validate_block(&self, block: &AddressBlock, tally: &mut Tally, out: &mut Vec<Finding>) {
        let streets: Vec<&Street> = block
            .streets
            .iter()
            .filter_map(|id| self.streets.get(*id))
            .collect();
        let span = block.span();

        let before = out.len();
        let resolved = match streets.as_slice() {
            [] => false,
            [street] => {
                let context = if self.is_within(street, &span) {
                    BlockContext::Uniform
                } else {
                    BlockContext::Span
                };
                out.extend(self.street_findings(street, block.block, context));
                true
            }
            many if many.iter().all(|s| self.is_within(s, &span)) => {
                for street in many {
                    out.extend(self.street_findings(street, block.block, BlockContext::Shared));
                }
                true
            }
            many => {
                tally.incr(evidence::BLOCK_UNRESOLVED);
                out.push(self.unresolved(block, many));
                false
            }
        };
        if resolved && out.len() == before {
            tally.incr(evidence::BLOCK_MATCHED);
        }

        for finding in self.duplicates(block) {
            tally.incr(evidence::DUPLICATE);
            out.push(finding);
        }
    }

    /// Declared and observed numbers all fall inside `span`.
    fn is_within(&self, street: &Street, span: &Interval) -> bool {
        let declared = street
            .declared_interval()
            .map_or(true, |iv| span.contains_interval(&iv));
        declared
            && Side::BOTH
                .iter()
                .flat_map(|s| street.side(*s).site_numbers())
                .all(|n| span.contains(*n))
    }

    fn check_side(&self, street: &Street, side: Side, block: i64) -> Option<SideFailure> {
        let range = street.side(side);
        let sites: Vec<usize> = range.sites_in_block(block).map(|s| s.site).collect();
        let observed = range.numbers_in_block(block);
        let fail = |failure| {
            Some(SideFailure {
                failure,
                side,
                sites: sites.clone(),
            })
        };

        if range.scheme.is_none() {
            return if observed.is_empty() {
                None
            } else {
                fail(Failure::NoSegmentNumbers)
            };
        }
        let declared = range.declared_in_block(block);
        let observed_range = Interval::spanning(observed.iter().copied());
        match (declared, observed_range) {
            (_, None) if range.is_expanded(block) => None,
            // Range reaches the block only through the other side.
            (None, None) => None,
            (Some(_), None) => fail(Failure::NoAddressPoints),
            (None, Some(_)) => fail(Failure::RangesDiffer),
            (Some(decl), Some(obs)) => {
                let observed_scheme = Scheme::classify(observed.iter().copied());
                if range.scheme.is_even_or_odd() && observed_scheme != range.scheme {
                    fail(Failure::SchemeDiffers)
                } else if !decl.contains_interval(&obs) {
                    fail(Failure::RangesDiffer)
                } else {
                    None
                }
            }
        }
    }

    fn street_findings(&self, street: &Street, block: i64, context: BlockContext) -> Vec<Finding> {
        let left = self.check_side(street, Side::Left, block);
        let right = self.check_side(street, Side::Right, block);

        let grouped: Vec<(AffectedSides, Vec<SideFailure>)> = match (left, right) {
            (Some(l), Some(r)) if l.failure == r.failure => vec![(AffectedSides::Both, vec![l, r])],
            (l, r) => l
                .into_iter()
                .chain(r)
                .map(|f| (AffectedSides::from(f.side), vec![f]))
                .collect(),
        };

        grouped
            .into_iter()
            .map(|(sides, failures)| self.range_finding(street, block, context, sides, &failures))
            .collect()
    }

    fn range_finding(
        &self,
        street: &Street,
        block: i64,
        context: BlockContext,
        sides: AffectedSides,
        failures: &[SideFailure],
    ) -> Finding {
        let issue = BlockIssue {
            block,
            context,
            street: self.street_ref(street),
            sides,
            ranges: failures
                .iter()
                .map(|f| street.side(f.side).summary(block))
                .collect(),
        };
        let kind = match failures.first().map(|f| f.failure) {
            Some(Failure::NoSegmentNumbers) => FindingKind::NoSegmentNumbers(issue),
            Some(Failure::NoAddressPoints) => FindingKind::NoAddressPoints(issue),
            Some(Failure::SchemeDiffers) => FindingKind::SchemeDiffers {
                issue,
                sites: failures
                    .iter()
                    .flat_map(|f| f.sites.iter().map(|i| self.points[*i].id))
                    .collect(),
            },
            Some(Failure::RangesDiffer) | None => FindingKind::RangesDiffer(issue),
        };
        let geometry = FindingGeometry::LineString(
            street.geometry.0.iter().map(|c| [c.x, c.y]).collect(),
        );
        Finding::new(self.locality, kind, Some(geometry))
    }

    fn unresolved(&self, block: &AddressBlock, streets: &[&Street]) -> Finding {
        let coords: Vec<[f64; 2]> = block.sites.iter().map(|i| self.points[*i].coords()).collect();
        let geometry = (!coords.is_empty()).then_some(FindingGeometry::MultiPoint(coords));
        Finding::new(
            self.locality,
            FindingKind::BlockUnresolved {
                block: block.block,
                streets: streets.iter().map(|s| self.street_ref(s)).collect(),
            },
            geometry,
        )
    }

    /// Civic numbers served by more than one street in the block.
    fn duplicates(&self, block: &AddressBlock) -> Vec<Finding> {
        let mut served: BTreeMap<(i64, Option<String>), (BTreeSet<StreetId>, BTreeSet<usize>)> =
            BTreeMap::new();
        for id in &block.streets {
            let Some(street) = self.streets.get(*id) else {
                continue;
            };
            for side in Side::BOTH {
                for site in street.side(side).sites_in_block(block.block) {
                    let point = &self.points[site.site];
                    let Some(civic) = point.civic else {
                        continue;
                    };
                    if point.parent.is_some() || block_from(civic) != block.block {
                        continue;
                    }
                    let entry = served.entry((civic, point.suffix.clone())).or_default();
                    entry.0.insert(*id);
                    entry.1.insert(site.site);
                }
            }
        }

        served
            .into_iter()
            .filter(|(_, (streets, _))| streets.len() > 1)
            .map(|((civic, suffix), (streets, sites))| {
                let points: Vec<&AddressPoint> = sites.iter().map(|i| &self.points[*i]).collect();
                let virtuals: Vec<&AddressPoint> =
                    points.iter().copied().filter(|p| p.is_virtual()).collect();
                let virtual_site = match virtuals.as_slice() {
                    [only] => Some(only.id),
                    _ => None,
                };
                let geometry =
                    FindingGeometry::MultiPoint(points.iter().map(|p| p.coords()).collect());
                Finding::new(
                    self.locality,
                    FindingKind::DuplicateCivic {
                        block: block.block,
                        civic,
                        suffix,
                        sites: points.iter().map(|p| p.id).collect(),
                        streets: streets
                            .iter()
                            .filter_map(|id| self.streets.get(*id))
                            .map(|s| self.street_ref(s))
                            .collect(),
                        virtual_site,
                    },
                    Some(geometry),
                )
            })
            .collect()
    }

    fn street_ref(&self, street: &Street) -> StreetRef {
        StreetRef {
            street: street.id,
            name: street.display_name(self.segments, self.lookups),
            segments: street.segment_ids(self.segments),
        }
    }
}
