//! Planar geometry helpers over `geo` types and an `rstar` segment index.
//!
//! All coordinates are projected metres. Sides are taken relative to the
//! stored direction of a line: a point with a positive cross product against
//! the nearest piece lies on the LEFT.

use geo::{BoundingRect, Closest, ClosestPoint, Coord, Distance, Euclidean, Line, LineLocatePoint};
use geo::{LineString, Point};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::model::Side;

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Where a point falls relative to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Past the start of the line.
    Before,
    /// Past the end of the line.
    After,
    /// Within tolerance of the line itself.
    On,
    Beside(Side),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Distance from the point to the nearest point of the line.
    pub distance: f64,
    /// Distance along the line to the projected point.
    pub along: f64,
    /// `along` divided by the line length, in `[0, 1]`.
    pub fraction: f64,
    pub placement: Placement,
}

impl Projection {
    /// Beside (or on) the line rather than beyond one of its ends.
    pub fn is_beside(&self) -> bool {
        !matches!(self.placement, Placement::Before | Placement::After)
    }

    pub fn side(&self) -> Option<Side> {
        match self.placement {
            Placement::Beside(side) => Some(side),
            _ => None,
        }
    }
}

fn cross(line: &Line<f64>, p: Coord<f64>) -> f64 {
    let d = line.delta();
    d.x * (p.y - line.start.y) - d.y * (p.x - line.start.x)
}

fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

fn closest_on(line: &Line<f64>, point: &Point<f64>) -> Point<f64> {
    match line.closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => p,
        Closest::Indeterminate => Point::from(line.start),
    }
}

/// Nearest straight piece of `line` and the distance to it.
fn nearest_piece(line: &LineString<f64>, point: &Point<f64>) -> Option<(Line<f64>, f64)> {
    line.lines()
        .map(|piece| {
            let d = Euclidean::distance(closest_on(&piece, point), *point);
            (piece, d)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

/// Side of the nearest piece of `line` the point lies on. `None` when the
/// point is collinear with it or the line is empty.
pub fn side_of_line(line: &LineString<f64>, point: &Point<f64>) -> Option<Side> {
    let (piece, _) = nearest_piece(line, point)?;
    let c = cross(&piece, point.0);
    if c > 0.0 {
        Some(Side::Left)
    } else if c < 0.0 {
        Some(Side::Right)
    } else {
        None
    }
}

/// Distance along `line` to the projection of `point`.
pub fn distance_along(line: &LineString<f64>, point: &Point<f64>) -> f64 {
    line.line_locate_point(point).unwrap_or(0.0) * line_length(line)
}

pub fn project(line: &LineString<f64>, point: &Point<f64>, on_line_tolerance: f64) -> Projection {
    let length = line_length(line);
    let fraction = line.line_locate_point(point).unwrap_or(0.0).clamp(0.0, 1.0);
    let Some((piece, distance)) = nearest_piece(line, point) else {
        return Projection {
            distance: f64::INFINITY,
            along: 0.0,
            fraction: 0.0,
            placement: Placement::On,
        };
    };

    let placement = if distance <= on_line_tolerance {
        Placement::On
    } else if is_before(line, point) {
        Placement::Before
    } else if is_after(line, point) {
        Placement::After
    } else {
        match cross(&piece, point.0) {
            c if c > 0.0 => Placement::Beside(Side::Left),
            c if c < 0.0 => Placement::Beside(Side::Right),
            _ => Placement::On,
        }
    };

    Projection {
        distance,
        along: fraction * length,
        fraction,
        placement,
    }
}

// Beyond the start: projects onto the start coordinate from the outside.
fn is_before(line: &LineString<f64>, point: &Point<f64>) -> bool {
    let Some(first) = line.lines().next() else {
        return false;
    };
    let closest = closest_point_of(line, point);
    closest == Point::from(first.start) && dot(point.0 - first.start, first.delta()) < 0.0
}

fn is_after(line: &LineString<f64>, point: &Point<f64>) -> bool {
    let Some(last) = line.lines().last() else {
        return false;
    };
    let closest = closest_point_of(line, point);
    closest == Point::from(last.end) && dot(point.0 - last.end, last.delta()) > 0.0
}

fn closest_point_of(line: &LineString<f64>, point: &Point<f64>) -> Point<f64> {
    match line.closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => p,
        Closest::Indeterminate => line.points().next().unwrap_or(*point),
    }
}

/// Join two lines where `a` ends at the start of `b`. The shared
/// coordinate appears once in the result.
pub fn merge_lines(a: &LineString<f64>, b: &LineString<f64>) -> LineString<f64> {
    let mut coords = a.0.clone();
    let skip = match (coords.last(), b.0.first()) {
        (Some(end), Some(start)) if end == start => 1,
        _ => 0,
    };
    coords.extend(b.0.iter().skip(skip).copied());
    LineString::new(coords)
}

pub fn reversed(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().copied().collect())
}

// ---------------------------------------------------------------------------
// Spatial index
// ---------------------------------------------------------------------------

/// Radius search over indexed lines.
pub trait SpatialIndex {
    /// Entries within `radius` of `point` for which `predicate` holds,
    /// sorted by distance then index.
    fn within_radius(
        &self,
        point: &Point<f64>,
        radius: f64,
        predicate: &dyn Fn(usize) -> bool,
    ) -> Vec<(usize, f64)>;
}

type SegmentEntry = GeomWithData<Rectangle<[f64; 2]>, (usize, LineString<f64>)>;

/// R-tree of line envelopes keyed by the caller's index.
pub struct SegmentIndex {
    tree: RTree<SegmentEntry>,
}

impl SegmentIndex {
    pub fn build<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a LineString<f64>)>,
    {
        let entries: Vec<SegmentEntry> = lines
            .into_iter()
            .filter_map(|(index, line)| {
                let rect = line.bounding_rect()?;
                let envelope = Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                Some(GeomWithData::new(envelope, (index, line.clone())))
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl SpatialIndex for SegmentIndex {
    fn within_radius(
        &self,
        point: &Point<f64>,
        radius: f64,
        predicate: &dyn Fn(usize) -> bool,
    ) -> Vec<(usize, f64)> {
        let envelope = AABB::from_corners(
            [point.x() - radius, point.y() - radius],
            [point.x() + radius, point.y() + radius],
        );
        let mut hits: Vec<(usize, f64)> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| predicate(entry.data.0))
            .filter_map(|entry| {
                let (index, line) = &entry.data;
                let d = Euclidean::distance(closest_point_of(line, point), *point);
                (d <= radius).then_some((*index, d))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn east() -> LineString<f64> {
        LineString::from(vec![(0.0, 0.0), (100.0, 0.0)])
    }

    #[test]
    fn side_by_cross_product() {
        let line = east();
        assert_eq!(side_of_line(&line, &Point::new(50.0, 10.0)), Some(Side::Left));
        assert_eq!(side_of_line(&line, &Point::new(50.0, -10.0)), Some(Side::Right));
        assert_eq!(side_of_line(&line, &Point::new(50.0, 0.0)), None);
        assert_eq!(
            side_of_line(&reversed(&line), &Point::new(50.0, 10.0)),
            Some(Side::Right)
        );
    }

    #[test]
    fn projection_beside() {
        let p = project(&east(), &Point::new(25.0, 10.0), 2.0);
        assert_eq!(p.placement, Placement::Beside(Side::Left));
        assert!((p.distance - 10.0).abs() < 1e-9);
        assert!((p.along - 25.0).abs() < 1e-9);
        assert!((p.fraction - 0.25).abs() < 1e-9);
        assert!(p.is_beside());
    }

    #[test]
    fn projection_beyond_ends() {
        let line = east();
        assert_eq!(project(&line, &Point::new(-20.0, 5.0), 2.0).placement, Placement::Before);
        let after = project(&line, &Point::new(130.0, -5.0), 2.0);
        assert_eq!(after.placement, Placement::After);
        assert!(!after.is_beside());
        assert!((after.fraction - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_on_line() {
        let p = project(&east(), &Point::new(40.0, 1.0), 2.0);
        assert_eq!(p.placement, Placement::On);
        assert_eq!(p.side(), None);
    }

    #[test]
    fn bent_line_uses_nearest_piece() {
        let line = LineString::from(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        assert!((line_length(&line) - 200.0).abs() < 1e-9);
        // Inside the bend: left of the northbound piece.
        let p = project(&line, &Point::new(90.0, 60.0), 2.0);
        assert_eq!(p.placement, Placement::Beside(Side::Left));
        assert!((p.along - 160.0).abs() < 1e-9);
        assert!((distance_along(&line, &Point::new(110.0, 50.0)) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn merge_drops_shared_coordinate() {
        let a = east();
        let b = LineString::from(vec![(100.0, 0.0), (200.0, 0.0)]);
        let merged = merge_lines(&a, &b);
        assert_eq!(merged.0.len(), 3);
        assert!((line_length(&merged) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn index_filters_and_sorts() {
        let lines = [
            LineString::from(vec![(0.0, 0.0), (100.0, 0.0)]),
            LineString::from(vec![(0.0, 50.0), (100.0, 50.0)]),
            LineString::from(vec![(0.0, 500.0), (100.0, 500.0)]),
        ];
        let index = SegmentIndex::build(lines.iter().enumerate());
        assert_eq!(index.len(), 3);

        let p = Point::new(50.0, 40.0);
        let hits = index.within_radius(&p, 100.0, &|_| true);
        let ids: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![1, 0]);
        assert!((hits[0].1 - 10.0).abs() < 1e-9);

        let filtered = index.within_radius(&p, 100.0, &|i| i != 1);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].0, 0);

        assert_eq!(index.within_radius(&p, 5.0, &|_| true), vec![]);
    }

    #[test]
    fn distance_past_the_end_is_straight_line() {
        let lines = [east()];
        let index = SegmentIndex::build(lines.iter().enumerate());
        let hits = index.within_radius(&Point::new(130.0, 40.0), 60.0, &|_| true);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - 50.0).abs() < 1e-9);
        assert!(index.within_radius(&Point::new(130.0, 40.0), 49.0, &|_| true).is_empty());
    }

    #[test]
    fn index_breaks_distance_ties_by_index() {
        let lines = [
            LineString::from(vec![(0.0, 10.0), (100.0, 10.0)]),
            LineString::from(vec![(0.0, -10.0), (100.0, -10.0)]),
        ];
        let index = SegmentIndex::build(lines.iter().enumerate());
        let hits = index.within_radius(&Point::new(50.0, 0.0), 20.0, &|_| true);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 1]);
    }
}
