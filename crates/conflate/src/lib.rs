//! `civic-conflate`: Street-addressing conflation and validation engine.
//!
//! Reads road segments and address points for one locality at a time,
//! builds streets from connected segments, matches each point to its
//! segment and street side, groups numbering into blocks of one hundred,
//! and reports every disagreement between declared and observed numbering
//! as a finding. No CLI dependencies; entities come in through [`Registry`].

pub mod assign;
pub mod block;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod expand;
pub mod finding;
pub mod geometry;
pub mod matcher;
pub mod model;
pub mod pool;
pub mod registry;
pub mod side;
pub mod street;
pub mod topology;

pub use config::ConflateConfig;
pub use engine::{run_locality, LocalityContext, LocalityReport, PassState, ReportStatus};
pub use error::ConflateError;
pub use evidence::Tally;
pub use finding::{AutoFix, CollectingSink, Finding, FindingKind, FindingSink, LogSink, Severity};
pub use model::{AddressPoint, LocalityId, RoadSegment, SegmentId, SiteId, StreetNameId};
pub use pool::{run_localities, CancelToken, RunSummary};
pub use registry::{
    load_document, load_document_file, Lookups, MemoryRegistry, Registry, StaticLookups,
};
