// Property-based tests for intervals, schemes and label range sets.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use civic_core::{block_from, block_to, Interval, LabelRangeSet, RangeItem, Scheme, BLOCK_SIZE};
use proptest::prelude::*;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_item() -> impl Strategy<Value = RangeItem> {
    prop_oneof![
        4 => (0i64..2000, 0i64..20).prop_map(|(lo, len)| RangeItem::Numbers(lo, lo + len)),
        2 => (0u8..26, 0u8..5).prop_map(|(lo, len)| {
            let lo = b'A' + lo;
            let hi = (lo + len).min(b'Z');
            RangeItem::Letters(lo as char, hi as char)
        }),
        1 => "[A-Z]{2,4}".prop_map(RangeItem::Text),
    ]
}

fn arb_set() -> impl Strategy<Value = LabelRangeSet> {
    proptest::collection::vec(arb_item(), 0..8).prop_map(|items| {
        let mut set = LabelRangeSet::new();
        for item in items {
            match item {
                RangeItem::Numbers(lo, hi) if lo == hi => set.insert_number(lo),
                RangeItem::Numbers(lo, hi) => set.insert_numbers(lo, hi),
                RangeItem::Letters(lo, hi) => set.insert_letters(lo, hi),
                RangeItem::Text(t) => set.insert_text(t),
            }
        }
        set
    })
}

fn arb_scheme() -> impl Strategy<Value = Scheme> {
    prop_oneof![
        Just(Scheme::None),
        Just(Scheme::Odd),
        Just(Scheme::Even),
        Just(Scheme::Continuous),
    ]
}

// ---------------------------------------------------------------------------
// Label range sets
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn text_form_parses_back(set in arb_set()) {
        let text = set.to_string();
        let parsed = LabelRangeSet::parse(&text).unwrap();
        prop_assert_eq!(parsed, set);
    }

    #[test]
    fn simplify_keeps_members(set in arb_set(), n in 0i64..2100) {
        let simplified = set.simplified();
        prop_assert_eq!(simplified.contains_number(n), set.contains_number(n));
        prop_assert_eq!(simplified.numbers(), set.numbers());
        let again = simplified.simplified();
        prop_assert_eq!(again.items(), simplified.items());
    }

    #[test]
    fn union_contains_both(a in arb_set(), b in arb_set()) {
        let u = a.union(&b);
        prop_assert!(u.contains_set(&a));
        prop_assert!(u.contains_set(&b));
        let expected: BTreeSet<i64> = a.numbers().into_iter().chain(b.numbers()).collect();
        prop_assert_eq!(u.numbers(), expected.into_iter().collect::<Vec<_>>());
    }
}

// ---------------------------------------------------------------------------
// Intervals and schemes
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn block_bounds_hold(n in -5000i64..5000) {
        let b = block_from(n);
        prop_assert_eq!(b.rem_euclid(BLOCK_SIZE), 0);
        prop_assert!(b <= n && n <= block_to(n));
        prop_assert_eq!(block_to(n) - b, BLOCK_SIZE - 1);
    }

    #[test]
    fn clip_stays_inside_and_on_scheme(
        a in 0i64..1000,
        b in 0i64..1000,
        n in 0i64..1000,
        scheme in arb_scheme(),
    ) {
        let iv = Interval::new(a, b);
        let span = civic_core::block_span(n);
        match iv.clip(&span, scheme) {
            Some(c) => {
                prop_assert!(iv.contains_interval(&c));
                prop_assert!(span.contains_interval(&c));
                prop_assert!(scheme.accepts(c.start()));
                prop_assert!(scheme.accepts(c.end()));
            }
            None => {
                let members = (a.min(b)..=a.max(b))
                    .filter(|x| span.contains(*x) && scheme.accepts(*x))
                    .count();
                prop_assert_eq!(members, 0);
            }
        }
    }

    #[test]
    fn classify_matches_parity(numbers in proptest::collection::vec(0i64..1000, 1..20)) {
        let scheme = Scheme::classify(numbers.iter().copied());
        let evens = numbers.iter().filter(|n| *n % 2 == 0).count();
        let expected = if evens == numbers.len() {
            Scheme::Even
        } else if evens == 0 {
            Scheme::Odd
        } else {
            Scheme::Continuous
        };
        prop_assert_eq!(scheme, expected);
        prop_assert!(numbers.iter().all(|n| scheme.accepts(*n)));
    }

    #[test]
    fn combine_is_symmetric(a in arb_scheme(), b in arb_scheme()) {
        prop_assert_eq!(a.combine(b), b.combine(a));
        prop_assert_eq!(a.union(b), b.union(a));
        prop_assert_eq!(a.opposite().opposite(), a);
        prop_assert_eq!(a.is_same(b), a == b);
    }
}
