//! Line matcher: find the road segment an address point belongs to.
//!
//! The search widens through the configured radii and stops at the first
//! radius that yields any eligible segment. Eligible segments are
//! addressable and share a street name with the point. Candidates rank by
//! (1) declared numbering containing the civic number, (2) the point lying
//! beside the segment rather than past an end, (3) distance, (4) segment id.

use std::cmp::Ordering;

use geo::Point;

use crate::config::MatcherConfig;
use crate::geometry::{project, SpatialIndex};
use crate::model::{AddressPoint, RoadSegment};

/// Distances closer than this are treated as equal.
const DISTANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index of the segment within the locality pass.
    pub segment: usize,
    pub distance: f64,
    pub contains: bool,
    pub beside: bool,
}

impl Candidate {
    /// Ranking order: smaller is better.
    fn rank(&self, other: &Candidate, segments: &[RoadSegment]) -> Ordering {
        other
            .contains
            .cmp(&self.contains)
            .then(other.beside.cmp(&self.beside))
            .then(self.distance.total_cmp(&other.distance))
            .then(segments[self.segment].id.cmp(&segments[other.segment].id))
    }

    /// Strictly better placement, ignoring numbering and id.
    fn better_placed_than(&self, other: &Candidate) -> bool {
        (self.beside && !other.beside)
            || (self.beside == other.beside && self.distance + DISTANCE_EPSILON < other.distance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The current assignment stands.
    Confirmed { segment: usize },
    /// A better segment was found. `from` is the current segment, if any.
    Reassigned {
        from: Option<usize>,
        to: usize,
        distance: f64,
    },
    /// Nothing eligible within the largest radius.
    Unmatched,
}

pub struct LineMatcher<'a, I: SpatialIndex> {
    segments: &'a [RoadSegment],
    index: &'a I,
    radii: Vec<f64>,
    on_line_tolerance: f64,
}

impl<'a, I: SpatialIndex> LineMatcher<'a, I> {
    pub fn new(
        segments: &'a [RoadSegment],
        index: &'a I,
        config: &MatcherConfig,
        on_line_tolerance: f64,
    ) -> Self {
        Self {
            segments,
            index,
            radii: config.radii(),
            on_line_tolerance,
        }
    }

    fn eligible(&self, segment: usize, point: &AddressPoint) -> bool {
        let s = &self.segments[segment];
        s.addressable && s.shares_name(&point.street_names)
    }

    fn evaluate(&self, segment: usize, point: &AddressPoint) -> Candidate {
        let s = &self.segments[segment];
        let projection = project(&s.geometry, &point.location, self.on_line_tolerance);
        Candidate {
            segment,
            distance: projection.distance,
            contains: point.civic.is_some_and(|n| s.contains_civic(n)),
            beside: projection.is_beside(),
        }
    }

    /// Ranked candidates from the first radius that has any.
    pub fn candidates(&self, point: &AddressPoint) -> Vec<Candidate> {
        let location: &Point<f64> = &point.location;
        for radius in &self.radii {
            let hits = self
                .index
                .within_radius(location, *radius, &|i| self.eligible(i, point));
            if hits.is_empty() {
                continue;
            }
            let mut candidates: Vec<Candidate> =
                hits.iter().map(|(i, _)| self.evaluate(*i, point)).collect();
            candidates.sort_by(|a, b| a.rank(b, self.segments));
            return candidates;
        }
        Vec::new()
    }

    /// Decide the segment for a point currently assigned to `current`.
    pub fn match_point(&self, point: &AddressPoint, current: Option<usize>) -> MatchOutcome {
        let candidates = self.candidates(point);
        let Some(best) = candidates.first().copied() else {
            return MatchOutcome::Unmatched;
        };

        if let Some(cur) = current.filter(|c| self.eligible(*c, point)) {
            if cur == best.segment {
                return MatchOutcome::Confirmed { segment: cur };
            }
            let held = self.evaluate(cur, point);
            // A current segment whose numbering takes the point is only
            // replaced by one that also takes it and sits strictly better.
            if held.contains && !(best.contains && best.better_placed_than(&held)) {
                return MatchOutcome::Confirmed { segment: cur };
            }
        }

        MatchOutcome::Reassigned {
            from: current,
            to: best.segment,
            distance: best.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SegmentIndex;
    use crate::model::{LocalityId, SegmentId, SideNumbering, SiteId, SiteType, StreetNameId};
    use civic_core::{LabelRangeSet, Scheme};
    use geo::LineString;

    fn segment(id: u64, coords: Vec<(f64, f64)>, from: i64, to: i64) -> RoadSegment {
        RoadSegment {
            id: SegmentId(id),
            geometry: LineString::from(coords),
            left: SideNumbering::new(LocalityId(1), Scheme::Even, from, to - 1),
            right: SideNumbering::new(LocalityId(1), Scheme::Odd, from + 1, to),
            single_civic: None,
            street_names: vec![StreetNameId(1)],
            divided: false,
            addressable: true,
        }
    }

    fn point(civic: i64, x: f64, y: f64) -> AddressPoint {
        AddressPoint {
            id: SiteId(1),
            location: Point::new(x, y),
            civic: Some(civic),
            suffix: None,
            units: LabelRangeSet::new(),
            locality: LocalityId(1),
            street_names: vec![StreetNameId(1)],
            use_in_range: true,
            site_type: SiteType::Civic,
            parent: None,
            segment: None,
        }
    }

    fn main_street() -> Vec<RoadSegment> {
        vec![
            segment(1, vec![(0.0, 0.0), (100.0, 0.0)], 100, 199),
            segment(2, vec![(100.0, 0.0), (200.0, 0.0)], 200, 299),
        ]
    }

    fn matcher_for(segments: &[RoadSegment]) -> (SegmentIndex, MatcherConfig) {
        let index = SegmentIndex::build(segments.iter().enumerate().map(|(i, s)| (i, &s.geometry)));
        (index, MatcherConfig::default())
    }

    #[test]
    fn numbering_beats_distance() {
        let segments = main_street();
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        // Closer to segment 2 but numbered on segment 1.
        let p = point(150, 110.0, 30.0);
        assert_eq!(
            m.match_point(&p, None),
            MatchOutcome::Reassigned {
                from: None,
                to: 0,
                distance: m.candidates(&p)[0].distance
            }
        );
        assert_eq!(m.match_point(&p, Some(0)), MatchOutcome::Confirmed { segment: 0 });
    }

    #[test]
    fn wrong_assignment_is_corrected() {
        let segments = main_street();
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        let p = point(150, 50.0, 30.0);
        match m.match_point(&p, Some(1)) {
            MatchOutcome::Reassigned { from, to, .. } => {
                assert_eq!(from, Some(1));
                assert_eq!(to, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn search_widens_until_something_is_found() {
        let segments = main_street();
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        let p = point(150, 50.0, 650.0);
        assert!(matches!(m.match_point(&p, None), MatchOutcome::Reassigned { to: 0, .. }));
        let far = point(150, 50.0, 5000.0);
        assert_eq!(m.match_point(&far, Some(0)), MatchOutcome::Unmatched);
    }

    #[test]
    fn ineligible_segments_are_ignored() {
        let mut segments = main_street();
        segments[0].addressable = false;
        segments[1].street_names = vec![StreetNameId(2)];
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        assert_eq!(m.match_point(&point(150, 50.0, 10.0), None), MatchOutcome::Unmatched);
    }

    #[test]
    fn beside_beats_beyond_when_neither_contains() {
        let segments = vec![
            segment(1, vec![(0.0, 0.0), (100.0, 0.0)], 100, 199),
            segment(2, vec![(0.0, 40.0), (200.0, 40.0)], 100, 199),
        ];
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        // Past the end of segment 1, beside the farther segment 2.
        let p = point(999, 130.0, 5.0);
        let candidates = m.candidates(&p);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| !c.contains));
        assert_eq!(candidates[0].segment, 1);
        assert!(candidates[0].beside);
        assert!(candidates[0].distance > candidates[1].distance);
    }

    #[test]
    fn equal_candidates_keep_current_assignment() {
        // Two parallel segments with identical numbering, equidistant.
        let segments = vec![
            segment(1, vec![(0.0, 10.0), (100.0, 10.0)], 100, 199),
            segment(2, vec![(0.0, -10.0), (100.0, -10.0)], 100, 199),
        ];
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        let p = point(150, 50.0, 0.0);
        assert_eq!(m.match_point(&p, Some(1)), MatchOutcome::Confirmed { segment: 1 });
        // Without an assignment the lower id wins the tie.
        assert!(matches!(m.match_point(&p, None), MatchOutcome::Reassigned { to: 0, .. }));
    }

    #[test]
    fn strata_segment_matches_single_civic() {
        let mut segments = main_street();
        segments.push(segment(3, vec![(50.0, 20.0), (50.0, 40.0)], 100, 199));
        segments[2].single_civic = Some(500);
        let (index, config) = matcher_for(&segments);
        let m = LineMatcher::new(&segments, &index, &config, 2.0);
        let p = point(500, 55.0, 30.0);
        assert_eq!(m.candidates(&p)[0].segment, 2);
        // 150 is inside the strata segment's declared sides but not its civic.
        let q = point(150, 55.0, 30.0);
        assert_eq!(m.candidates(&q)[0].segment, 0);
    }
}
