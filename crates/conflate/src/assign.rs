//! Assign address points to street sides.
//!
//! A point beside its street is placed by numbering first: the side whose
//! declared range takes it, then the side whose scheme takes it, then the
//! physical side. Points beyond either end or on the line itself are
//! deferred and placed by parity once every other point is in.

use log::debug;
use rustc_hash::FxHashMap;

use crate::config::{AssignmentConfig, SideRule};
use crate::geometry::{project, Placement, Projection};
use crate::model::{AddressPoint, SegmentId, Side};
use crate::side::{SideAddressRange, SiteOnSide};
use crate::street::{Street, StreetArena, StreetId};

#[derive(Debug, Default)]
pub struct Assignment {
    /// Placed directly.
    pub placed: usize,
    /// Placed after deferral.
    pub deferred: usize,
    /// `(point index, street)` for points no side would take.
    pub unplaced: Vec<(usize, StreetId)>,
    /// Virtual points moved to the side their parity belongs on.
    pub virtual_moved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Place(Side),
    Defer,
    Unplaced,
}

fn unique_side(street: &Street, test: impl Fn(&SideAddressRange) -> bool) -> Option<Side> {
    match (test(&street.left), test(&street.right)) {
        (true, false) => Some(Side::Left),
        (false, true) => Some(Side::Right),
        _ => None,
    }
}

fn choose_side(
    street: &Street,
    numbers: &[i64],
    projection: &Projection,
    rule: SideRule,
) -> Choice {
    let physical = match projection.placement {
        Placement::Beside(side) => side,
        Placement::Before | Placement::After | Placement::On => return Choice::Defer,
    };
    if rule == SideRule::Geometry {
        return Choice::Place(physical);
    }
    if let Some(side) = unique_side(street, |s| s.accepts_declared(numbers)) {
        return Choice::Place(side);
    }
    if let Some(side) = unique_side(street, |s| s.accepts_scheme(numbers)) {
        return Choice::Place(side);
    }
    // Never onto a side whose parity rejects the point.
    if street.side(physical).admits(numbers) {
        Choice::Place(physical)
    } else if street.side(physical.opposite()).admits(numbers) {
        Choice::Place(physical.opposite())
    } else {
        Choice::Unplaced
    }
}

fn resolve_deferred(street: &Street, numbers: &[i64]) -> Option<Side> {
    unique_side(street, |s| s.scheme.is_even_or_odd() && s.accepts_scheme(numbers))
        .or_else(|| unique_side(street, |s| s.accepts_scheme(numbers)))
        .or_else(|| unique_side(street, |s| s.accepts_declared(numbers)))
}

/// Move virtual points off a side whose parity rejects them when the
/// opposite side takes them.
fn relocate_virtual(street: &mut Street) -> usize {
    let mut moved = 0;
    for side in Side::BOTH {
        let here = street.side(side);
        let there = street.side(side.opposite());
        let misplaced: Vec<usize> = here
            .sites()
            .iter()
            .filter(|s| {
                s.is_virtual
                    && here.scheme.is_even_or_odd()
                    && !here.accepts_scheme(&s.numbers)
                    && there.accepts_scheme(&s.numbers)
            })
            .map(|s| s.site)
            .collect();
        for site in misplaced {
            if let Some(entry) = street.side_mut(side).remove_site(site) {
                street.side_mut(side.opposite()).add_site(entry);
                moved += 1;
            }
        }
    }
    moved
}

/// Place every rangeable point on a side of the street its segment belongs
/// to, then rebuild each side's observed range.
pub fn assign_sites(
    streets: &mut StreetArena,
    points: &[AddressPoint],
    street_of: &FxHashMap<SegmentId, StreetId>,
    config: &AssignmentConfig,
) -> Assignment {
    let mut outcome = Assignment::default();
    let mut deferred: Vec<(StreetId, SiteOnSide)> = Vec::new();

    for (index, point) in points.iter().enumerate() {
        if !point.is_rangeable() {
            continue;
        }
        let Some(street_id) = point.segment.and_then(|s| street_of.get(&s).copied()) else {
            continue;
        };
        let Some(street) = streets.get_mut(street_id) else {
            continue;
        };
        let projection = project(&street.geometry, &point.location, config.on_line_tolerance);
        let site = SiteOnSide {
            site: index,
            numbers: point.range_numbers(street.strata),
            along: projection.along,
            is_virtual: point.is_virtual(),
        };
        match choose_side(street, &site.numbers, &projection, config.side_rule) {
            Choice::Place(side) => {
                street.side_mut(side).add_site(site);
                outcome.placed += 1;
            }
            Choice::Defer => deferred.push((street_id, site)),
            Choice::Unplaced => outcome.unplaced.push((index, street_id)),
        }
    }

    for (street_id, site) in deferred {
        let Some(street) = streets.get_mut(street_id) else {
            continue;
        };
        match resolve_deferred(street, &site.numbers) {
            Some(side) => {
                street.side_mut(side).add_site(site);
                outcome.deferred += 1;
            }
            None => outcome.unplaced.push((site.site, street_id)),
        }
    }

    for street in streets.iter_mut() {
        outcome.virtual_moved += relocate_virtual(street);
        street.left.recompute();
        street.right.recompute();
    }

    debug!(
        "assignment: {} placed, {} deferred, {} unplaced, {} virtual moved",
        outcome.placed,
        outcome.deferred,
        outcome.unplaced.len(),
        outcome.virtual_moved
    );
    outcome
}
