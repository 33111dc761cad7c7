use std::path::PathBuf;

use civic_conflate::engine::LocalityContext;
use civic_conflate::evidence;
use civic_conflate::finding::{AutoFix, FindingKind};
use civic_conflate::model::{AffectedSides, Side};
use civic_conflate::{
    load_document_file, run_localities, run_locality, CancelToken, CollectingSink, ConflateConfig,
    LocalityId, LocalityReport, MemoryRegistry, ReportStatus, SiteId, StaticLookups,
};
use civic_core::Interval;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_registry() -> (MemoryRegistry, StaticLookups) {
    load_document_file(&fixtures_dir().join("registry.json")).unwrap()
}

fn geometry_config() -> ConflateConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("geometry-rule.toml")).unwrap();
    ConflateConfig::from_toml(&toml).unwrap()
}

fn run(locality: u32, config: &ConflateConfig) -> LocalityReport {
    let (registry, lookups) = load_registry();
    run_locality(LocalityId(locality), &registry, &lookups, config)
}

fn count(report: &LocalityReport, kind: &str) -> usize {
    report.by_kind.get(kind).copied().unwrap_or(0)
}

// -------------------------------------------------------------------------
// Topology and matching
// -------------------------------------------------------------------------

#[test]
fn connected_segments_become_one_street() {
    let (registry, lookups) = load_registry();
    let config = ConflateConfig::default();
    let mut ctx = LocalityContext::load(LocalityId(1), &registry, &lookups, &config).unwrap();
    ctx.build_topology().unwrap();

    assert_eq!(ctx.streets().len(), 2);
    let main = ctx
        .streets()
        .iter()
        .find(|s| s.parts.len() == 2)
        .expect("Main St merged");
    assert_eq!(main.side(Side::Left).interval, Some(Interval::new(100, 298)));
    assert_eq!(main.side(Side::Right).interval, Some(Interval::new(101, 299)));
    assert_eq!(ctx.tally().get(evidence::STREET_MERGED), 1);
}

#[test]
fn merged_street_matches_its_end_points() {
    let json = r#"{
        "localities": [{"id": 1, "name": "Northfield"}],
        "street_names": [{"id": 10, "name": "Main St"}],
        "segments": [
            {"id": 1, "coordinates": [[0, 0], [100, 0]],
             "left": {"locality": 1, "scheme": "even", "from": 100, "to": 198},
             "right": {"locality": 1, "scheme": "odd", "from": 101, "to": 199},
             "street_names": [10]},
            {"id": 2, "coordinates": [[100, 0], [200, 0]],
             "left": {"locality": 1, "scheme": "even", "from": 200, "to": 298},
             "right": {"locality": 1, "scheme": "odd", "from": 201, "to": 299},
             "street_names": [10]}
        ],
        "sites": [
            {"id": 1, "location": [1, 10], "civic": 100, "locality": 1,
             "street_names": [10], "segment": 1},
            {"id": 2, "location": [199, 10], "civic": 298, "locality": 1,
             "street_names": [10], "segment": 2},
            {"id": 3, "location": [1, -10], "civic": 101, "locality": 1,
             "street_names": [10], "segment": 1},
            {"id": 4, "location": [199, -10], "civic": 299, "locality": 1,
             "street_names": [10], "segment": 2},
            {"id": 5, "location": [50, 10], "civic": 150, "locality": 1, "street_names": [10]}
        ]
    }"#;
    let (registry, lookups) = civic_conflate::load_document(json).unwrap();
    let config = ConflateConfig::default();
    let mut ctx = LocalityContext::load(LocalityId(1), &registry, &lookups, &config).unwrap();
    ctx.build_topology().unwrap();
    ctx.assign_points().unwrap();

    // The unassigned point is matched to the first segment, on its left.
    assert_eq!(ctx.points()[4].segment, Some(civic_conflate::SegmentId(1)));
    let street = ctx.streets().iter().next().unwrap();
    assert!(street.side(Side::Left).sites().iter().any(|s| s.site == 4));
    assert!(street.side(Side::Left).has_exact_match());
    assert!(street.side(Side::Right).has_exact_match());

    ctx.derive_blocks().unwrap();
    ctx.validate().unwrap();
    let report = ctx.finish().unwrap();
    assert_eq!(report.by_kind.get("not_closest"), Some(&1));
    assert_eq!(report.findings.len(), 1);
    assert!(report.findings[0].message.contains("has no segment"));
    assert_eq!(report.tally.get(evidence::SITE_ASSIGNED), 1);
    assert_eq!(report.tally.get(evidence::SITE_REASSIGNED), 0);
    assert_eq!(report.tally.get(evidence::BLOCK_MATCHED), 2);
}

#[test]
fn unaddressed_link_adds_no_block() {
    // Odd 101-199, an unnumbered link, then odd 301-399: nothing declares 200.
    let json = r#"{
        "localities": [{"id": 1, "name": "Northfield"}],
        "street_names": [{"id": 10, "name": "Main St"}],
        "segments": [
            {"id": 1, "coordinates": [[0, 0], [100, 0]],
             "left": {"locality": 1},
             "right": {"locality": 1, "scheme": "odd", "from": 101, "to": 199},
             "street_names": [10]},
            {"id": 2, "coordinates": [[100, 0], [200, 0]],
             "left": {"locality": 1},
             "right": {"locality": 1},
             "street_names": [10]},
            {"id": 3, "coordinates": [[200, 0], [300, 0]],
             "left": {"locality": 1},
             "right": {"locality": 1, "scheme": "odd", "from": 301, "to": 399},
             "street_names": [10]}
        ],
        "sites": [
            {"id": 1, "location": [1, -10], "civic": 101, "locality": 1,
             "street_names": [10], "segment": 1},
            {"id": 2, "location": [99, -10], "civic": 199, "locality": 1,
             "street_names": [10], "segment": 1},
            {"id": 3, "location": [201, -10], "civic": 301, "locality": 1,
             "street_names": [10], "segment": 3},
            {"id": 4, "location": [299, -10], "civic": 399, "locality": 1,
             "street_names": [10], "segment": 3}
        ]
    }"#;
    let (registry, lookups) = civic_conflate::load_document(json).unwrap();
    let report = run_locality(LocalityId(1), &registry, &lookups, &ConflateConfig::default());

    assert!(report.is_complete());
    assert_eq!(count(&report, "no_address_points"), 0);
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert_eq!(report.tally.get(evidence::STREET), 1);
    assert_eq!(report.tally.get(evidence::BLOCK), 2);
    assert_eq!(report.tally.get(evidence::BLOCK_MATCHED), 2);
}

#[test]
fn numbering_rule_locality() {
    let report = run(1, &ConflateConfig::default());

    assert!(report.is_complete());
    assert_eq!(report.name.as_deref(), Some("Northfield"));
    assert_eq!(report.findings.len(), 4);
    assert_eq!(count(&report, "malformed_site"), 1);
    assert_eq!(count(&report, "not_closest"), 1);
    assert_eq!(count(&report, "no_matching_segment"), 1);
    assert_eq!(count(&report, "no_address_points"), 1);

    assert_eq!(report.tally.get(evidence::SITE), 7);
    assert_eq!(report.tally.get(evidence::STREET), 2);
    assert_eq!(report.tally.get(evidence::SITE_MATCHED), 5);
    assert_eq!(report.tally.get(evidence::SITE_REASSIGNED), 1);
    assert_eq!(report.tally.get(evidence::BLOCK), 3);
    assert_eq!(report.tally.get(evidence::BLOCK_MATCHED), 2);
    assert_eq!(report.tally.get(evidence::VIRTUAL_MOVED), 0);

    // 321 sits on the even side of Oak Ave but is placed on the odd side,
    // leaving the even side without points.
    let missing = report
        .findings
        .iter()
        .find_map(|f| match &f.kind {
            FindingKind::NoAddressPoints(issue) => Some(issue),
            _ => None,
        })
        .unwrap();
    assert_eq!(missing.block, 300);
    assert_eq!(missing.sides, AffectedSides::Left);
    assert_eq!(missing.street.name, "Oak Ave");
}

#[test]
fn matcher_findings_carry_fixes() {
    let report = run(1, &ConflateConfig::default());
    let fixes: Vec<AutoFix> = report.findings.iter().filter_map(|f| f.auto_fix()).collect();
    assert_eq!(
        fixes,
        vec![
            AutoFix::SetSegment {
                site: SiteId(3),
                segment: civic_conflate::SegmentId(2)
            },
            AutoFix::ClearSegment { site: SiteId(8) },
        ]
    );
}

#[test]
fn geometry_rule_reports_scheme_mismatch() {
    let config = geometry_config();
    assert_eq!(config.workers, 2);
    let report = run(1, &config);

    assert!(report.is_complete());
    assert_eq!(count(&report, "scheme_differs"), 1);
    assert_eq!(count(&report, "no_address_points"), 1);
    assert_eq!(report.tally.get(evidence::VIRTUAL_MOVED), 1);

    let sites = report
        .findings
        .iter()
        .find_map(|f| match &f.kind {
            FindingKind::SchemeDiffers { issue, sites } => {
                assert_eq!(issue.sides, AffectedSides::Left);
                Some(sites.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(sites, vec![SiteId(5)]);
}

// -------------------------------------------------------------------------
// Blocks shared by several streets
// -------------------------------------------------------------------------

#[test]
fn duplicate_civic_across_streets() {
    let report = run(2, &ConflateConfig::default());

    assert!(report.is_complete());
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    match &finding.kind {
        FindingKind::DuplicateCivic {
            block,
            civic,
            sites,
            streets,
            virtual_site,
            ..
        } => {
            assert_eq!(*block, 500);
            assert_eq!(*civic, 510);
            assert_eq!(sites.len(), 2);
            assert_eq!(streets.len(), 2);
            assert_eq!(*virtual_site, Some(SiteId(21)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(finding.auto_fix(), Some(AutoFix::DeleteSite { site: SiteId(21) }));
    assert_eq!(report.tally.get(evidence::DUPLICATE), 1);
    assert_eq!(report.tally.get(evidence::BLOCK_MATCHED), 1);
}

// -------------------------------------------------------------------------
// Failure handling and the worker pool
// -------------------------------------------------------------------------

#[test]
fn missing_boundary_is_incomplete() {
    let report = run(3, &ConflateConfig::default());
    assert!(report.findings.is_empty());
    assert!(matches!(report.status, ReportStatus::Incomplete { .. }));
}

#[test]
fn pool_runs_every_locality() {
    let (registry, lookups) = load_registry();
    let sink = CollectingSink::new();
    let ids = [LocalityId(3), LocalityId(1), LocalityId(2)];
    let summary = run_localities(
        &ids,
        &registry,
        &lookups,
        &sink,
        &geometry_config(),
        &CancelToken::new(),
    );

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.complete(), 2);
    assert_eq!(summary.incomplete(), 1);
    assert_eq!(summary.reports[0].locality, LocalityId(1));
    assert_eq!(sink.len(), summary.finding_total());
    assert_eq!(summary.counters.get(evidence::SITE), 11);
    assert!(sink.findings().iter().all(|f| f.locality != LocalityId(3)));
}

#[test]
fn cancelled_pool_skips_localities() {
    let (registry, lookups) = load_registry();
    let sink = CollectingSink::new();
    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = run_localities(
        &[LocalityId(1), LocalityId(2)],
        &registry,
        &lookups,
        &sink,
        &ConflateConfig::default(),
        &cancel,
    );
    assert!(summary.reports.is_empty());
    assert_eq!(summary.skipped, vec![LocalityId(1), LocalityId(2)]);
    assert!(sink.is_empty());
}

#[test]
fn report_serializes_to_json() {
    let report = run(1, &ConflateConfig::default());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "complete");
    assert_eq!(json["locality"], 1);
    assert_eq!(json["findings"][0]["kind"], "malformed_site");
    assert_eq!(json["tally"]["Street merged"], 1);
}
