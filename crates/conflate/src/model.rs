use std::collections::BTreeSet;
use std::fmt;

use civic_core::{block_from, block_span, is_civic, Interval, LabelRangeSet, Scheme};
use civic_core::{MAX_CIVIC, MAX_SPAN};
use geo::{Coord, LineString, Point};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalityId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreetNameId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site {}", self.0)
    }
}

impl fmt::Display for LocalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locality {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// Side of a line relative to its stored direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opposite(self) -> Side {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

/// Which side(s) a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedSides {
    Left,
    Right,
    Both,
}

impl From<Side> for AffectedSides {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Self::Left,
            Side::Right => Self::Right,
        }
    }
}

impl fmt::Display for AffectedSides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

// ---------------------------------------------------------------------------
// Road segments
// ---------------------------------------------------------------------------

/// Declared numbering of one side of a road segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideNumbering {
    pub locality: LocalityId,
    #[serde(default)]
    pub scheme: Scheme,
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
}

impl SideNumbering {
    pub fn none(locality: LocalityId) -> Self {
        Self {
            locality,
            scheme: Scheme::None,
            from: None,
            to: None,
        }
    }

    pub fn new(locality: LocalityId, scheme: Scheme, from: i64, to: i64) -> Self {
        Self {
            locality,
            scheme,
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn has_addressing(&self) -> bool {
        !self.scheme.is_none() && self.from.is_some() && self.to.is_some()
    }

    pub fn interval(&self) -> Option<Interval> {
        if !self.has_addressing() {
            return None;
        }
        Some(Interval::new(self.from?, self.to?))
    }

    /// Scheme membership and interval containment.
    pub fn accepts(&self, n: i64) -> bool {
        self.scheme.accepts(n) && self.interval().is_some_and(|iv| iv.contains(n))
    }

    /// Same numbering read against the opposite travel direction.
    pub fn reversed(&self) -> Self {
        Self {
            locality: self.locality,
            scheme: self.scheme,
            from: self.to,
            to: self.from,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub geometry: LineString<f64>,
    pub left: SideNumbering,
    pub right: SideNumbering,
    /// Set on strata/virtual segments standing for one building.
    pub single_civic: Option<i64>,
    pub street_names: Vec<StreetNameId>,
    pub divided: bool,
    /// False for background / non-demographic lines.
    pub addressable: bool,
}

impl RoadSegment {
    pub fn side(&self, side: Side) -> &SideNumbering {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn is_strata(&self) -> bool {
        self.single_civic.is_some()
    }

    pub fn has_addressing(&self) -> bool {
        self.left.has_addressing() || self.right.has_addressing()
    }

    /// Whether the declared numbering covers `civic`. A strata segment
    /// covers exactly its single civic number.
    pub fn contains_civic(&self, civic: i64) -> bool {
        match self.single_civic {
            Some(single) => single == civic,
            None => self.left.accepts(civic) || self.right.accepts(civic),
        }
    }

    pub fn shares_name(&self, names: &[StreetNameId]) -> bool {
        self.street_names.iter().any(|n| names.contains(n))
    }

    pub fn belongs_to(&self, locality: LocalityId) -> bool {
        self.left.locality == locality || self.right.locality == locality
    }

    pub fn start(&self) -> Option<Coord<f64>> {
        self.geometry.0.first().copied()
    }

    pub fn end(&self) -> Option<Coord<f64>> {
        self.geometry.0.last().copied()
    }
}

// ---------------------------------------------------------------------------
// Address points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    #[default]
    Civic,
    /// Block-end marker with no real-world location, snapped to a street end.
    Virtual,
}

#[derive(Debug, Clone)]
pub struct AddressPoint {
    pub id: SiteId,
    pub location: Point<f64>,
    pub civic: Option<i64>,
    pub suffix: Option<String>,
    pub units: LabelRangeSet,
    pub locality: LocalityId,
    pub street_names: Vec<StreetNameId>,
    pub use_in_range: bool,
    pub site_type: SiteType,
    pub parent: Option<SiteId>,
    pub segment: Option<SegmentId>,
}

impl AddressPoint {
    pub fn is_virtual(&self) -> bool {
        self.site_type == SiteType::Virtual
    }

    /// Participates in side ranges.
    pub fn is_rangeable(&self) -> bool {
        self.use_in_range && self.civic.is_some()
    }

    pub fn block(&self) -> Option<i64> {
        self.civic.map(block_from)
    }

    /// Numbers tested against a side's scheme. On strata streets the unit
    /// descriptors stand in for the civic number.
    pub fn range_numbers(&self, strata: bool) -> Vec<i64> {
        if strata && self.units.has_numbers() {
            let mut out = BTreeSet::new();
            for span in self.units.number_spans() {
                out.extend(span_witnesses(&span));
            }
            return out.into_iter().collect();
        }
        self.civic.into_iter().collect()
    }

    pub fn coords(&self) -> [f64; 2] {
        [self.location.x(), self.location.y()]
    }
}

/// Numbers standing in for a unit span without listing every member: the
/// ends of the span within each block it touches, plus the second number
/// of any piece holding two or more, so that piece shows both parities.
fn span_witnesses(span: &Interval) -> Vec<i64> {
    let mut out = Vec::new();
    for block in span.blocks() {
        if let Some(piece) = span.intersect(&block_span(block)) {
            out.push(piece.start());
            if piece.len() > 1 {
                out.push(piece.start() + 1);
                out.push(piece.end());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Road segment as stored in the registry, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: SegmentId,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    pub left: SideNumbering,
    pub right: SideNumbering,
    #[serde(default)]
    pub single_civic: Option<i64>,
    #[serde(default)]
    pub street_names: Vec<StreetNameId>,
    #[serde(default)]
    pub divided: bool,
    #[serde(default = "default_true")]
    pub addressable: bool,
}

/// Address point as stored in the registry, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: SiteId,
    #[serde(default)]
    pub location: Option<[f64; 2]>,
    #[serde(default)]
    pub civic: Option<i64>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub units: String,
    pub locality: LocalityId,
    #[serde(default)]
    pub street_names: Vec<StreetNameId>,
    #[serde(default = "default_true")]
    pub use_in_range: bool,
    #[serde(default)]
    pub site_type: SiteType,
    #[serde(default)]
    pub parent: Option<SiteId>,
    #[serde(default)]
    pub segment: Option<SegmentId>,
}

fn check_side(side: Side, numbering: &SideNumbering) -> Result<SideNumbering, String> {
    if numbering.scheme.is_none() {
        return Ok(SideNumbering::none(numbering.locality));
    }
    let (Some(from), Some(to)) = (numbering.from, numbering.to) else {
        return Err(format!(
            "{side} scheme {} without from/to numbers",
            numbering.scheme
        ));
    };
    check_range(&format!("{side} range"), Interval::new(from, to))?;
    Ok(numbering.clone())
}

fn check_civic(what: &str, n: i64) -> Result<(), String> {
    if is_civic(n) {
        Ok(())
    } else {
        Err(format!("{what} {n} outside 0-{MAX_CIVIC}"))
    }
}

fn check_range(what: &str, range: Interval) -> Result<(), String> {
    check_civic(what, range.start())?;
    check_civic(what, range.end())?;
    if range.len() > MAX_SPAN {
        return Err(format!("{what} {range} covers more than {MAX_SPAN} numbers"));
    }
    Ok(())
}

fn check_names(names: &[StreetNameId]) -> Result<(), String> {
    match names.len() {
        1 | 2 => Ok(()),
        0 => Err("no street name".into()),
        n => Err(format!("{n} street names, at most 2 allowed")),
    }
}

impl SegmentRecord {
    pub fn into_segment(self) -> Result<RoadSegment, String> {
        if self.coordinates.len() < 2 {
            return Err(format!(
                "geometry has {} coordinate(s), need at least 2",
                self.coordinates.len()
            ));
        }
        if self
            .coordinates
            .iter()
            .any(|[x, y]| !x.is_finite() || !y.is_finite())
        {
            return Err("geometry has non-finite coordinates".into());
        }
        let first = self.coordinates[0];
        if self.coordinates.iter().all(|c| *c == first) {
            return Err("geometry has zero length".into());
        }
        check_names(&self.street_names)?;
        let left = check_side(Side::Left, &self.left)?;
        let right = check_side(Side::Right, &self.right)?;
        if let Some(single) = self.single_civic {
            check_civic("single civic", single)?;
        }

        Ok(RoadSegment {
            id: self.id,
            geometry: LineString::from(self.coordinates),
            left,
            right,
            single_civic: self.single_civic,
            street_names: self.street_names,
            divided: self.divided,
            addressable: self.addressable,
        })
    }
}

impl SiteRecord {
    pub fn into_point(self) -> Result<AddressPoint, String> {
        let [x, y] = self.location.ok_or_else(|| "missing location".to_string())?;
        if !x.is_finite() || !y.is_finite() {
            return Err("location has non-finite coordinates".into());
        }
        check_names(&self.street_names)?;
        if let Some(civic) = self.civic {
            check_civic("civic", civic)?;
        }
        let units = LabelRangeSet::parse(&self.units).map_err(|e| e.to_string())?;
        for span in units.number_spans() {
            check_range("unit span", span)?;
        }

        Ok(AddressPoint {
            id: self.id,
            location: Point::new(x, y),
            civic: self.civic,
            suffix: self.suffix.filter(|s| !s.trim().is_empty()),
            units,
            locality: self.locality,
            street_names: self.street_names,
            use_in_range: self.use_in_range,
            site_type: self.site_type,
            parent: self.parent,
            segment: self.segment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_record() -> SegmentRecord {
        SegmentRecord {
            id: SegmentId(1),
            coordinates: vec![[0.0, 0.0], [100.0, 0.0]],
            left: SideNumbering::new(LocalityId(1), Scheme::Even, 100, 198),
            right: SideNumbering::new(LocalityId(1), Scheme::Odd, 101, 199),
            single_civic: None,
            street_names: vec![StreetNameId(7)],
            divided: false,
            addressable: true,
        }
    }

    fn site_record() -> SiteRecord {
        SiteRecord {
            id: SiteId(1),
            location: Some([10.0, 5.0]),
            civic: Some(150),
            suffix: None,
            units: String::new(),
            locality: LocalityId(1),
            street_names: vec![StreetNameId(7)],
            use_in_range: true,
            site_type: SiteType::Civic,
            parent: None,
            segment: None,
        }
    }

    #[test]
    fn side_numbering_accepts() {
        let side = SideNumbering::new(LocalityId(1), Scheme::Odd, 199, 101);
        assert!(side.accepts(101));
        assert!(side.accepts(155));
        assert!(!side.accepts(150));
        assert!(!side.accepts(201));
        assert_eq!(side.interval(), Some(Interval::new(101, 199)));
        assert_eq!(side.reversed().from, Some(101));
    }

    #[test]
    fn contains_civic_uses_strata_rule() {
        let mut seg = segment_record().into_segment().unwrap();
        assert!(seg.contains_civic(150));
        assert!(seg.contains_civic(151));
        assert!(!seg.contains_civic(250));
        seg.single_civic = Some(500);
        assert!(seg.contains_civic(500));
        assert!(!seg.contains_civic(150));
    }

    #[test]
    fn rejects_degenerate_geometry() {
        let mut rec = segment_record();
        rec.coordinates = vec![[1.0, 1.0]];
        assert!(rec.into_segment().unwrap_err().contains("coordinate"));

        let mut rec = segment_record();
        rec.coordinates = vec![[1.0, 1.0], [1.0, 1.0]];
        assert!(rec.into_segment().unwrap_err().contains("zero length"));
    }

    #[test]
    fn rejects_scheme_without_numbers() {
        let mut rec = segment_record();
        rec.left.to = None;
        let err = rec.into_segment().unwrap_err();
        assert!(err.contains("LEFT"));
    }

    #[test]
    fn none_scheme_drops_stray_numbers() {
        let mut rec = segment_record();
        rec.right.scheme = Scheme::None;
        let seg = rec.into_segment().unwrap();
        assert_eq!(seg.right.from, None);
        assert!(!seg.right.has_addressing());
    }

    #[test]
    fn site_conversion() {
        let mut rec = site_record();
        rec.units = "101~104".into();
        let site = rec.into_point().unwrap();
        assert_eq!(site.range_numbers(false), vec![150]);
        assert_eq!(site.range_numbers(true), vec![101, 102, 104]);
        assert_eq!(site.block(), Some(100));
    }

    #[test]
    fn unit_spans_keep_ends_blocks_and_parity() {
        let mut rec = site_record();
        rec.units = "7, 150~350, 401~401".into();
        let site = rec.into_point().unwrap();
        let numbers = site.range_numbers(true);
        assert_eq!(
            numbers,
            vec![7, 150, 151, 199, 200, 201, 299, 300, 301, 350, 401]
        );
        assert_eq!(Scheme::classify(site.range_numbers(true)), Scheme::Continuous);

        let mut rec = site_record();
        rec.units = "101".into();
        let site = rec.into_point().unwrap();
        assert_eq!(Scheme::classify(site.range_numbers(true)), Scheme::Odd);
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let mut rec = site_record();
        rec.civic = Some(i64::MAX);
        assert!(rec.into_point().unwrap_err().contains("civic"));

        let mut rec = site_record();
        rec.civic = Some(-4);
        assert!(rec.into_point().is_err());

        let mut rec = site_record();
        rec.units = "1~2000000000".into();
        assert!(rec.into_point().unwrap_err().contains("unit span"));

        let mut rec = segment_record();
        rec.left.to = Some(2_000_000_000);
        rec.left.from = Some(0);
        assert!(rec.into_segment().unwrap_err().contains("LEFT range"));

        let mut rec = segment_record();
        rec.right = SideNumbering::new(LocalityId(1), Scheme::Odd, 1, 150_001);
        assert!(rec.into_segment().unwrap_err().contains("more than"));

        let mut rec = segment_record();
        rec.single_civic = Some(MAX_CIVIC + 1);
        assert!(rec.into_segment().unwrap_err().contains("single civic"));
    }

    #[test]
    fn site_rejects_bad_units_and_missing_location() {
        let mut rec = site_record();
        rec.units = "1~B".into();
        assert!(rec.into_point().unwrap_err().contains("1~B"));

        let mut rec = site_record();
        rec.location = None;
        assert_eq!(rec.into_point().unwrap_err(), "missing location");
    }

    #[test]
    fn site_record_defaults_from_json() {
        let rec: SiteRecord = serde_json::from_str(
            r#"{"id": 4, "location": [1.0, 2.0], "civic": 12, "locality": 3, "street_names": [9]}"#,
        )
        .unwrap();
        assert!(rec.use_in_range);
        assert_eq!(rec.site_type, SiteType::Civic);
        let site = rec.into_point().unwrap();
        assert!(site.units.is_empty());
        assert!(site.is_rangeable());
    }
}
