use std::collections::{BTreeMap, BTreeSet};

use civic_core::{block_from, block_span, Interval};
use log::debug;

use crate::model::Side;
use crate::street::{StreetArena, StreetId};

/// The streets and sites touching one hundred-number block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBlock {
    pub block: i64,
    pub streets: BTreeSet<StreetId>,
    /// Point indices with a range number in this block.
    pub sites: BTreeSet<usize>,
}

impl AddressBlock {
    fn new(block: i64) -> Self {
        Self {
            block,
            streets: BTreeSet::new(),
            sites: BTreeSet::new(),
        }
    }

    pub fn span(&self) -> Interval {
        block_span(self.block)
    }

    pub fn is_single_street(&self) -> bool {
        self.streets.len() == 1
    }
}

/// Group streets by the blocks their declared ranges and assigned points
/// touch. Deterministic: the same streets always give the same map.
pub fn derive_blocks(streets: &StreetArena) -> BTreeMap<i64, AddressBlock> {
    let mut blocks: BTreeMap<i64, AddressBlock> = BTreeMap::new();
    for street in streets.iter() {
        for side in Side::BOTH {
            let range = street.side(side);
            if !range.scheme.is_none() {
                for b in range.declared_blocks() {
                    blocks
                        .entry(b)
                        .or_insert_with(|| AddressBlock::new(b))
                        .streets
                        .insert(street.id);
                }
            }
            for site in range.sites() {
                for n in &site.numbers {
                    let b = block_from(*n);
                    let entry = blocks.entry(b).or_insert_with(|| AddressBlock::new(b));
                    entry.streets.insert(street.id);
                    entry.sites.insert(site.site);
                }
            }
        }
    }
    debug!("blocks: {} derived from {} streets", blocks.len(), streets.len());
    blocks
}
