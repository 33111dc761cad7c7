//! Street graph construction.
//!
//! Every road segment starts as its own street. Endpoints are snapped to a
//! grid and grouped into nodes; a node touched by exactly two different
//! streets is a merge candidate. Candidates are merged until a full pass
//! over the nodes changes nothing. Remaining degree-2 nodes become
//! `previous` / `next` links.
//!
//! Nodes are kept in a `BTreeMap` so merge order, and with it the resulting
//! street ids, is deterministic.

use std::collections::BTreeMap;

use civic_core::Scheme;
use geo::Coord;
use log::debug;
use rustc_hash::FxHashMap;

use crate::config::TopologyConfig;
use crate::model::{RoadSegment, Side};
use crate::street::{Street, StreetArena, StreetId, StreetPart};

type NodeKey = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Incidence {
    street: StreetId,
    end: End,
}

/// Result of building the street graph.
#[derive(Debug)]
pub struct Topology {
    pub streets: StreetArena,
    pub merges: usize,
}

fn node_key(c: Coord<f64>, snap: f64) -> NodeKey {
    if snap > 0.0 {
        ((c.x / snap).round() as i64, (c.y / snap).round() as i64)
    } else {
        (c.x.to_bits() as i64, c.y.to_bits() as i64)
    }
}

struct Builder<'a> {
    segments: &'a [RoadSegment],
    config: &'a TopologyConfig,
    streets: StreetArena,
    nodes: BTreeMap<NodeKey, Vec<Incidence>>,
    ends: FxHashMap<StreetId, (NodeKey, NodeKey)>,
    merges: usize,
}

/// Build streets from the segments of one locality.
pub fn build_streets(segments: &[RoadSegment], config: &TopologyConfig) -> Topology {
    let mut builder = Builder {
        segments,
        config,
        streets: StreetArena::new(),
        nodes: BTreeMap::new(),
        ends: FxHashMap::default(),
        merges: 0,
    };
    builder.seed();
    while builder.merge_pass() {}
    builder.link();

    debug!(
        "topology: {} segments -> {} streets ({} merges)",
        segments.len(),
        builder.streets.len(),
        builder.merges
    );
    Topology {
        streets: builder.streets,
        merges: builder.merges,
    }
}

impl<'a> Builder<'a> {
    fn seed(&mut self) {
        for (index, segment) in self.segments.iter().enumerate() {
            let (Some(start), Some(end)) = (segment.start(), segment.end()) else {
                continue;
            };
            let id = self.streets.next_id();
            self.streets
                .push(Street::from_segment(id, index, self.segments));
            let start = node_key(start, self.config.snap_tolerance);
            let end = node_key(end, self.config.snap_tolerance);
            self.attach(start, id, End::Start);
            self.attach(end, id, End::End);
            self.ends.insert(id, (start, end));
        }
    }

    fn attach(&mut self, key: NodeKey, street: StreetId, end: End) {
        self.nodes
            .entry(key)
            .or_default()
            .push(Incidence { street, end });
    }

    fn detach(&mut self, key: NodeKey, street: StreetId) {
        if let Some(incidences) = self.nodes.get_mut(&key) {
            incidences.retain(|i| i.street != street);
            if incidences.is_empty() {
                self.nodes.remove(&key);
            }
        }
    }

    /// One pass over all nodes. Returns whether anything merged.
    fn merge_pass(&mut self) -> bool {
        let keys: Vec<NodeKey> = self.nodes.keys().copied().collect();
        let mut merged = false;
        for key in keys {
            let pair = match self.nodes.get(&key).map(Vec::as_slice) {
                Some([a, b]) if a.street != b.street => (*a, *b),
                _ => continue,
            };
            if self.try_merge(key, pair.0, pair.1) {
                merged = true;
            }
        }
        merged
    }

    /// Orient two streets meeting at a node so the first ends where the
    /// second starts. Returns `(street, reversed)` for each in chain order.
    fn orient(a: Incidence, b: Incidence) -> ((StreetId, bool), (StreetId, bool)) {
        match (a.end, b.end) {
            (End::End, End::Start) => ((a.street, false), (b.street, false)),
            (End::Start, End::End) => ((b.street, false), (a.street, false)),
            (End::End, End::End) => ((a.street, false), (b.street, true)),
            (End::Start, End::Start) => ((a.street, true), (b.street, false)),
        }
    }

    fn oriented_parts(&self, id: StreetId, reversed: bool) -> Option<Vec<StreetPart>> {
        let street = self.streets.get(id)?;
        Some(if reversed {
            street.reversed_parts()
        } else {
            street.parts.clone()
        })
    }

    fn try_merge(&mut self, key: NodeKey, a: Incidence, b: Incidence) -> bool {
        let ((first, first_rev), (second, second_rev)) = Self::orient(a, b);
        let (Some(first_parts), Some(second_parts)) = (
            self.oriented_parts(first, first_rev),
            self.oriented_parts(second, second_rev),
        ) else {
            return false;
        };
        let (Some(tail), Some(head)) = (first_parts.last(), second_parts.first()) else {
            return false;
        };
        if !can_join(self.segments, self.config, tail, head) {
            return false;
        }

        // Far ends of the merged street, in chain order.
        let far_start = self.far_node(first, first_rev, End::Start);
        let far_end = self.far_node(second, second_rev, End::End);
        let (Some(far_start), Some(far_end)) = (far_start, far_end) else {
            return false;
        };

        let survivor = first.min(second);
        let absorbed = first.max(second);
        let mut parts = first_parts;
        parts.extend(second_parts);

        self.nodes.remove(&key);
        self.detach(far_start, first);
        self.detach(far_start, second);
        self.detach(far_end, first);
        self.detach(far_end, second);

        self.streets.remove(absorbed);
        self.ends.remove(&absorbed);
        self.streets
            .replace(Street::from_parts(survivor, parts, self.segments));
        self.attach(far_start, survivor, End::Start);
        self.attach(far_end, survivor, End::End);
        self.ends.insert(survivor, (far_start, far_end));
        self.merges += 1;
        true
    }

    /// Node at the requested end of a street after optional reversal.
    fn far_node(&self, id: StreetId, reversed: bool, end: End) -> Option<NodeKey> {
        let (start, finish) = *self.ends.get(&id)?;
        Some(match (end, reversed) {
            (End::Start, false) | (End::End, true) => start,
            (End::End, false) | (End::Start, true) => finish,
        })
    }

    fn link(&mut self) {
        let mut links: Vec<(StreetId, End, StreetId)> = Vec::new();
        for incidences in self.nodes.values() {
            if let [a, b] = incidences.as_slice() {
                if a.street != b.street {
                    links.push((a.street, a.end, b.street));
                    links.push((b.street, b.end, a.street));
                }
            }
        }
        for (street, end, other) in links {
            if let Some(s) = self.streets.get_mut(street) {
                match end {
                    End::Start => s.previous = Some(other),
                    End::End => s.next = Some(other),
                }
            }
        }
    }
}

/// Whether two segments meeting head to tail may become one street.
/// `tail` is the last part of the first street, `head` the first part of
/// the second, both already in chain direction.
pub fn can_join(
    segments: &[RoadSegment],
    config: &TopologyConfig,
    tail: &StreetPart,
    head: &StreetPart,
) -> bool {
    let seg_a = &segments[tail.segment];
    let seg_b = &segments[head.segment];

    if seg_a.is_strata() || seg_b.is_strata() {
        return false;
    }
    if config.match_divided && seg_a.divided != seg_b.divided {
        return false;
    }
    if config.require_shared_name && !seg_a.shares_name(&seg_b.street_names) {
        return false;
    }

    Side::BOTH.iter().all(|side| {
        let a = tail.numbering(segments, *side);
        let b = head.numbering(segments, *side);
        if a.locality != b.locality || !a.scheme.is_compatible(b.scheme) {
            return false;
        }
        match (a.to, b.from, a.interval(), b.interval()) {
            (Some(to), Some(from), Some(ia), Some(ib)) => {
                let step = a.scheme.combine(b.scheme).unwrap_or(Scheme::None).step();
                let gap = (from - to).abs();
                let numeric = gap > 0 && gap <= config.max_join_gap && gap % step == 0;
                numeric || ia.block_gap(&ib) <= config.max_block_gap
            }
            // One side unaddressed: chains freely.
            _ => true,
        }
    })
}
