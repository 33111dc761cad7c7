//! Streets: chains of road segments merged end to end.
//!
//! Streets live in a [`StreetArena`] and refer to each other by
//! [`StreetId`] handle. `previous` / `next` are plain handles, never
//! owning references.

use std::fmt;

use civic_core::Interval;
use geo::LineString;
use serde::Serialize;

use crate::geometry::{merge_lines, reversed};
use crate::model::{RoadSegment, SegmentId, Side, SideNumbering};
use crate::registry::Lookups;
use crate::side::SideAddressRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StreetId(pub usize);

impl fmt::Display for StreetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "street {}", self.0)
    }
}

/// Travel direction of a segment within its street.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forwards,
    Backwards,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forwards => Self::Backwards,
            Self::Backwards => Self::Forwards,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreetPart {
    /// Index of the segment within the locality pass.
    pub segment: usize,
    pub direction: Direction,
}

impl StreetPart {
    /// The segment's numbering for a street side. A backwards segment
    /// contributes its opposite side with from/to swapped.
    pub fn numbering(&self, segments: &[RoadSegment], side: Side) -> SideNumbering {
        let segment = &segments[self.segment];
        match self.direction {
            Direction::Forwards => segment.side(side).clone(),
            Direction::Backwards => segment.side(side.opposite()).reversed(),
        }
    }

    pub fn geometry(&self, segments: &[RoadSegment]) -> LineString<f64> {
        let line = &segments[self.segment].geometry;
        match self.direction {
            Direction::Forwards => line.clone(),
            Direction::Backwards => reversed(line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Street {
    pub id: StreetId,
    pub parts: Vec<StreetPart>,
    pub geometry: LineString<f64>,
    pub left: SideAddressRange,
    pub right: SideAddressRange,
    pub previous: Option<StreetId>,
    pub next: Option<StreetId>,
    /// A single strata segment.
    pub strata: bool,
}

impl Street {
    pub fn from_parts(id: StreetId, parts: Vec<StreetPart>, segments: &[RoadSegment]) -> Self {
        let geometry = parts
            .iter()
            .map(|p| p.geometry(segments))
            .reduce(|a, b| merge_lines(&a, &b))
            .unwrap_or_else(|| LineString::new(Vec::new()));
        let side_range = |side: Side| {
            let numbering: Vec<SideNumbering> =
                parts.iter().map(|p| p.numbering(segments, side)).collect();
            SideAddressRange::declared(side, &numbering)
        };
        let left = side_range(Side::Left);
        let right = side_range(Side::Right);
        let strata = parts.len() == 1 && segments[parts[0].segment].is_strata();

        Self {
            id,
            parts,
            geometry,
            left,
            right,
            previous: None,
            next: None,
            strata,
        }
    }

    pub fn from_segment(id: StreetId, segment: usize, segments: &[RoadSegment]) -> Self {
        let part = StreetPart {
            segment,
            direction: Direction::Forwards,
        };
        Self::from_parts(id, vec![part], segments)
    }

    pub fn side(&self, side: Side) -> &SideAddressRange {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideAddressRange {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Parts in reverse travel order, each flipped.
    pub fn reversed_parts(&self) -> Vec<StreetPart> {
        self.parts
            .iter()
            .rev()
            .map(|p| StreetPart {
                segment: p.segment,
                direction: p.direction.reversed(),
            })
            .collect()
    }

    pub fn segment_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.parts.iter().map(|p| p.segment)
    }

    pub fn segment_ids(&self, segments: &[RoadSegment]) -> Vec<SegmentId> {
        self.segment_indices().map(|i| segments[i].id).collect()
    }

    /// Hull of both sides' effective ranges.
    pub fn declared_interval(&self) -> Option<Interval> {
        match (self.left.effective_interval(), self.right.effective_interval()) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        }
    }

    pub fn display_name(&self, segments: &[RoadSegment], lookups: &dyn Lookups) -> String {
        let name = self
            .parts
            .first()
            .and_then(|p| segments[p.segment].street_names.first())
            .map(|id| lookups.street_name(*id).unwrap_or_else(|| format!("#{}", id.0)));
        name.unwrap_or_else(|| format!("unnamed {}", self.id))
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Street storage. Removed streets leave an empty slot so ids stay stable.
#[derive(Debug, Clone, Default)]
pub struct StreetArena {
    slots: Vec<Option<Street>>,
}

impl StreetArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> StreetId {
        StreetId(self.slots.len())
    }

    pub fn push(&mut self, street: Street) -> StreetId {
        let id = street.id;
        debug_assert_eq!(id, self.next_id());
        self.slots.push(Some(street));
        id
    }

    pub fn get(&self, id: StreetId) -> Option<&Street> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: StreetId) -> Option<&mut Street> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn replace(&mut self, street: Street) {
        if let Some(slot) = self.slots.get_mut(street.id.0) {
            *slot = Some(street);
        }
    }

    pub fn remove(&mut self, id: StreetId) -> Option<Street> {
        self.slots.get_mut(id.0).and_then(|s| s.take())
    }

    /// Live streets in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Street> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Street> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    pub fn ids(&self) -> Vec<StreetId> {
        self.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
