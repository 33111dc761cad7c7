//! `civic-core`: value types shared by the addressing engine.
//!
//! Integer intervals with block arithmetic, numbering schemes, and label
//! range sets. No geometry and no IO.

pub mod error;
pub mod interval;
pub mod range_set;
pub mod scheme;

pub use error::RangeParseError;
pub use interval::{
    block_from, block_span, block_to, is_civic, Interval, BLOCK_SIZE, MAX_CIVIC, MAX_SPAN,
};
pub use range_set::{LabelRangeSet, RangeItem};
pub use scheme::Scheme;
