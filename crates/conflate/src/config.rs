use serde::Deserialize;

use crate::error::ConflateError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ConflateConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
}

fn default_workers() -> usize {
    8
}

impl Default for ConflateConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            matcher: MatcherConfig::default(),
            assignment: AssignmentConfig::default(),
            topology: TopologyConfig::default(),
            expansion: ExpansionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Line matcher
// ---------------------------------------------------------------------------

/// Widening search radii for the line matcher.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_start_radius")]
    pub start_radius: f64,
    #[serde(default = "default_radius_step")]
    pub radius_step: f64,
    /// Always searched last, even when the step overshoots it.
    #[serde(default = "default_max_radius")]
    pub max_radius: f64,
}

fn default_start_radius() -> f64 {
    100.0
}

fn default_radius_step() -> f64 {
    200.0
}

fn default_max_radius() -> f64 {
    1000.0
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            start_radius: default_start_radius(),
            radius_step: default_radius_step(),
            max_radius: default_max_radius(),
        }
    }
}

/// Most search radii the matcher will try before the ceiling.
pub const MAX_RADII: usize = 10_000;

impl MatcherConfig {
    /// Radii in search order: start, start + step, ... then the ceiling.
    pub fn radii(&self) -> Vec<f64> {
        let mut radii: Vec<f64> = (0..MAX_RADII)
            .map(|i| self.start_radius + i as f64 * self.radius_step)
            .take_while(|r| *r < self.max_radius)
            .collect();
        radii.push(self.max_radius);
        radii
    }
}

// ---------------------------------------------------------------------------
// Side assignment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default = "default_on_line_tolerance")]
    pub on_line_tolerance: f64,
    #[serde(default)]
    pub side_rule: SideRule,
}

fn default_on_line_tolerance() -> f64 {
    2.0
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            on_line_tolerance: default_on_line_tolerance(),
            side_rule: SideRule::default(),
        }
    }
}

/// How a point beside a street picks its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideRule {
    /// Declared numbering first, physical side as the fallback.
    #[default]
    Numbering,
    /// Real points keep their physical side; parity conflicts become findings.
    Geometry,
}

impl std::fmt::Display for SideRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numbering => write!(f, "numbering"),
            Self::Geometry => write!(f, "geometry"),
        }
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    /// Grid size endpoints are snapped to before node matching.
    #[serde(default = "default_snap_tolerance")]
    pub snap_tolerance: f64,
    #[serde(default = "default_max_join_gap")]
    pub max_join_gap: i64,
    #[serde(default = "default_max_block_gap")]
    pub max_block_gap: i64,
    #[serde(default = "default_true")]
    pub match_divided: bool,
    #[serde(default = "default_true")]
    pub require_shared_name: bool,
}

fn default_snap_tolerance() -> f64 {
    0.001
}

fn default_max_join_gap() -> i64 {
    2
}

fn default_max_block_gap() -> i64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: default_snap_tolerance(),
            max_join_gap: default_max_join_gap(),
            max_block_gap: default_max_block_gap(),
            match_divided: true,
            require_shared_name: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Range expansion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Links followed before giving up on a neighbour.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    8
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: default_max_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ConflateConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConflateError> {
        let config: ConflateConfig =
            toml::from_str(input).map_err(|e| ConflateError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConflateError> {
        if self.workers == 0 {
            return Err(ConflateError::ConfigValidation(
                "workers must be at least 1".into(),
            ));
        }

        let m = &self.matcher;
        for (name, value) in [
            ("matcher.start_radius", m.start_radius),
            ("matcher.radius_step", m.radius_step),
            ("matcher.max_radius", m.max_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConflateError::ConfigValidation(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if m.start_radius > m.max_radius {
            return Err(ConflateError::ConfigValidation(format!(
                "matcher.start_radius ({}) exceeds matcher.max_radius ({})",
                m.start_radius, m.max_radius
            )));
        }
        if (m.max_radius - m.start_radius) / m.radius_step > MAX_RADII as f64 {
            return Err(ConflateError::ConfigValidation(format!(
                "matcher.radius_step ({}) needs more than {MAX_RADII} radii to reach {}",
                m.radius_step, m.max_radius
            )));
        }

        for (name, value) in [
            ("assignment.on_line_tolerance", self.assignment.on_line_tolerance),
            ("topology.snap_tolerance", self.topology.snap_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConflateError::ConfigValidation(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.topology.max_join_gap < 0 || self.topology.max_block_gap < 0 {
            return Err(ConflateError::ConfigValidation(
                "topology gaps must not be negative".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ConflateConfig::from_toml("").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.matcher.start_radius, 100.0);
        assert_eq!(config.assignment.side_rule, SideRule::Numbering);
        assert_eq!(config.topology.max_join_gap, 2);
        assert!(config.topology.match_divided);
        assert!(config.expansion.enabled);
        assert_eq!(config.expansion.max_depth, 8);
    }

    #[test]
    fn parse_sections() {
        let input = r#"
workers = 2

[matcher]
start_radius = 50.0
radius_step = 50.0
max_radius = 200.0

[assignment]
side_rule = "geometry"
on_line_tolerance = 0.5

[topology]
require_shared_name = false

[expansion]
enabled = false
"#;
        let config = ConflateConfig::from_toml(input).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.assignment.side_rule, SideRule::Geometry);
        assert_eq!(config.assignment.on_line_tolerance, 0.5);
        assert!(!config.topology.require_shared_name);
        assert!(config.topology.match_divided);
        assert!(!config.expansion.enabled);
        assert_eq!(config.matcher.radii(), vec![50.0, 100.0, 150.0, 200.0]);
    }

    #[test]
    fn default_radii_end_at_ceiling() {
        let radii = MatcherConfig::default().radii();
        assert_eq!(radii, vec![100.0, 300.0, 500.0, 700.0, 900.0, 1000.0]);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = ConflateConfig::from_toml("workers = 0").unwrap_err();
        assert!(matches!(err, ConflateError::ConfigValidation(_)));
    }

    #[test]
    fn rejects_inverted_radii() {
        let input = "[matcher]\nstart_radius = 500.0\nmax_radius = 100.0\n";
        let err = ConflateConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_step_too_small_to_advance() {
        let input = "[matcher]\nstart_radius = 100.0\nradius_step = 1e-15\nmax_radius = 1000.0\n";
        let err = ConflateConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("radius_step"));

        let unchecked = MatcherConfig {
            start_radius: 100.0,
            radius_step: 1e-15,
            max_radius: 1000.0,
        };
        let radii = unchecked.radii();
        assert!(radii.len() <= MAX_RADII + 1);
        assert_eq!(radii.last(), Some(&1000.0));
    }

    #[test]
    fn rejects_unknown_side_rule() {
        let input = "[assignment]\nside_rule = \"nearest\"\n";
        let err = ConflateConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ConflateError::ConfigParse(_)));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let input = "[topology]\nsnap_tolerance = -1.0\n";
        assert!(ConflateConfig::from_toml(input).is_err());
    }
}
