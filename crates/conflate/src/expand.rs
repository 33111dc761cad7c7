//! Range expansion.
//!
//! A street side that declares an odd or even scheme but has no points in a
//! block it takes part in borrows evidence from its neighbours: when the
//! touching side of a linked street shows points of the same parity in or
//! next to that block, the side's range is widened to cover the block and
//! the block is recorded as expanded.

use std::collections::{BTreeMap, BTreeSet};

use civic_core::BLOCK_SIZE;
use log::debug;

use crate::block::AddressBlock;
use crate::config::ExpansionConfig;
use crate::model::Side;
use crate::side::SideAddressRange;
use crate::street::{StreetArena, StreetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Forward,
    Backward,
}

impl Walk {
    fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

fn link(streets: &StreetArena, id: StreetId, walk: Walk) -> Option<StreetId> {
    let street = streets.get(id)?;
    match walk {
        Walk::Forward => street.next,
        Walk::Backward => street.previous,
    }
}

/// Whether `neighbour` continues in the travel direction of `current`
/// when reached by walking `walk` from it.
fn same_orientation(
    streets: &StreetArena,
    current: StreetId,
    neighbour: StreetId,
    walk: Walk,
) -> bool {
    let Some(n) = streets.get(neighbour) else {
        return true;
    };
    match walk {
        Walk::Forward => n.previous == Some(current),
        Walk::Backward => n.next == Some(current),
    }
}

fn touches_block(range: &SideAddressRange, block: i64) -> bool {
    [block - BLOCK_SIZE, block, block + BLOCK_SIZE]
        .iter()
        .any(|b| !range.numbers_in_block(*b).is_empty())
}

/// Walk links from `start` looking for the first neighbour side with
/// points. Returns whether that side supports expanding `side` into `block`.
fn neighbour_supports(
    streets: &StreetArena,
    start: StreetId,
    side: Side,
    block: i64,
    walk: Walk,
    max_depth: usize,
) -> bool {
    let Some(wanted) = streets.get(start).map(|s| s.side(side).scheme) else {
        return false;
    };
    let mut visited = BTreeSet::from([start]);
    let (mut current, mut side, mut walk) = (start, side, walk);

    for _ in 0..max_depth {
        let Some(next) = link(streets, current, walk) else {
            return false;
        };
        if !visited.insert(next) {
            return false;
        }
        let same = same_orientation(streets, current, next, walk);
        if !same {
            side = side.opposite();
            walk = walk.flipped();
        }
        let Some(range) = streets.get(next).map(|s| s.side(side)) else {
            return false;
        };
        if !range.site_numbers().is_empty() {
            return range.site_scheme() == wanted && touches_block(range, block);
        }
        current = next;
    }
    false
}

/// Expand street sides into blocks where they have no points of their own.
/// Returns the number of expansions made.
pub fn expand_ranges(
    streets: &mut StreetArena,
    blocks: &BTreeMap<i64, AddressBlock>,
    config: &ExpansionConfig,
) -> usize {
    if !config.enabled {
        return 0;
    }

    let candidates = |streets: &StreetArena| -> Vec<(StreetId, Side, i64)> {
        let mut out = Vec::new();
        for block in blocks.values() {
            for id in &block.streets {
                let Some(street) = streets.get(*id) else {
                    continue;
                };
                for side in Side::BOTH {
                    let range = street.side(side);
                    if range.scheme.is_even_or_odd()
                        && range.numbers_in_block(block.block).is_empty()
                        && !range.is_expanded(block.block)
                    {
                        out.push((*id, side, block.block));
                    }
                }
            }
        }
        out
    };

    let mut expansions = 0;
    for walk in [Walk::Forward, Walk::Backward] {
        let mut pending = candidates(&*streets);
        if walk == Walk::Backward {
            pending.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)));
        }
        for (id, side, block) in pending {
            if streets
                .get(id)
                .is_some_and(|s| s.side(side).is_expanded(block))
            {
                continue;
            }
            if neighbour_supports(streets, id, side, block, walk, config.max_depth) {
                if let Some(street) = streets.get_mut(id) {
                    street.side_mut(side).expand_to(block);
                    expansions += 1;
                }
            }
        }
    }

    debug!("expansion: {expansions} street sides widened");
    expansions
}
