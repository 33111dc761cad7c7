//! Registry and lookup collaborators.
//!
//! The engine only reads from the registry; every call returns an owned
//! snapshot so a locality pass never holds a borrow into shared storage.

use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::ConflateError;
use crate::model::{LocalityId, SegmentRecord, SiteRecord, StreetNameId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError {
    pub message: String,
}

impl RegistryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegistryError {}

/// Source of road segments and address points, per locality.
pub trait Registry: Send + Sync {
    fn road_segments(&self, locality: LocalityId) -> Result<Vec<SegmentRecord>, RegistryError>;
    fn address_points(&self, locality: LocalityId) -> Result<Vec<SiteRecord>, RegistryError>;
}

/// Display names for ids. A locality without an entry has no boundary.
pub trait Lookups: Send + Sync {
    fn street_name(&self, id: StreetNameId) -> Option<String>;
    fn locality_name(&self, id: LocalityId) -> Option<String>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    segments: Vec<SegmentRecord>,
    sites: Vec<SiteRecord>,
}

impl MemoryRegistry {
    pub fn new(segments: Vec<SegmentRecord>, sites: Vec<SiteRecord>) -> Self {
        Self { segments, sites }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }
}

impl Registry for MemoryRegistry {
    fn road_segments(&self, locality: LocalityId) -> Result<Vec<SegmentRecord>, RegistryError> {
        Ok(self
            .segments
            .iter()
            .filter(|s| s.left.locality == locality || s.right.locality == locality)
            .cloned()
            .collect())
    }

    fn address_points(&self, locality: LocalityId) -> Result<Vec<SiteRecord>, RegistryError> {
        Ok(self
            .sites
            .iter()
            .filter(|s| s.locality == locality)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticLookups {
    street_names: FxHashMap<StreetNameId, String>,
    localities: FxHashMap<LocalityId, String>,
}

impl StaticLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_street_name(mut self, id: StreetNameId, name: impl Into<String>) -> Self {
        self.street_names.insert(id, name.into());
        self
    }

    pub fn with_locality(mut self, id: LocalityId, name: impl Into<String>) -> Self {
        self.localities.insert(id, name.into());
        self
    }

    /// Known localities, ascending.
    pub fn localities(&self) -> Vec<LocalityId> {
        let mut ids: Vec<LocalityId> = self.localities.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Lookups for StaticLookups {
    fn street_name(&self, id: StreetNameId) -> Option<String> {
        self.street_names.get(&id).cloned()
    }

    fn locality_name(&self, id: LocalityId) -> Option<String> {
        self.localities.get(&id).cloned()
    }
}

// ---------------------------------------------------------------------------
// JSON documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NamedEntry {
    id: u32,
    name: String,
}

/// A registry extract: lookup tables plus raw entities.
#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    localities: Vec<NamedEntry>,
    #[serde(default)]
    street_names: Vec<NamedEntry>,
    #[serde(default)]
    segments: Vec<SegmentRecord>,
    #[serde(default)]
    sites: Vec<SiteRecord>,
}

/// Parse a registry extract into a registry and its lookups.
pub fn load_document(json: &str) -> Result<(MemoryRegistry, StaticLookups), ConflateError> {
    let doc: RegistryDocument =
        serde_json::from_str(json).map_err(|e| ConflateError::DocumentParse(e.to_string()))?;

    let mut lookups = StaticLookups::new();
    for entry in doc.localities {
        lookups = lookups.with_locality(LocalityId(entry.id), entry.name);
    }
    for entry in doc.street_names {
        lookups = lookups.with_street_name(StreetNameId(entry.id), entry.name);
    }
    Ok((MemoryRegistry::new(doc.segments, doc.sites), lookups))
}

pub fn load_document_file(path: &Path) -> Result<(MemoryRegistry, StaticLookups), ConflateError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ConflateError::Io(format!("{}: {e}", path.display())))?;
    load_document(&json)
}
