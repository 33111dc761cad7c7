//! Sparse sets over integers and labels.
//!
//! Used for unit descriptors (`"101~104,201~204"`, `"A~C"`, `"PH"`) and for
//! computed numbering ranges. The text form is a comma separated list of
//! items; an item is a number, a single letter, a `lo~hi` span of either, or
//! a free text label.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RangeParseError;
use crate::interval::Interval;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RangeItem {
    Numbers(i64, i64),
    Letters(char, char),
    Text(String),
}

impl fmt::Display for RangeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbers(lo, hi) if lo == hi => write!(f, "{lo}"),
            Self::Numbers(lo, hi) => write!(f, "{lo}~{hi}"),
            Self::Letters(lo, hi) if lo == hi => write!(f, "{lo}"),
            Self::Letters(lo, hi) => write!(f, "{lo}~{hi}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Items are kept as inserted until [`LabelRangeSet::simplify`] merges them.
/// Equality compares the simplified forms, so `"1~3,2~5"` equals `"1~5"`.
#[derive(Debug, Clone, Default)]
pub struct LabelRangeSet {
    items: Vec<RangeItem>,
}

impl LabelRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[RangeItem] {
        &self.items
    }

    pub fn insert_number(&mut self, n: i64) {
        self.items.push(RangeItem::Numbers(n, n));
    }

    pub fn insert_numbers(&mut self, a: i64, b: i64) {
        self.items.push(RangeItem::Numbers(a.min(b), a.max(b)));
    }

    pub fn insert_letters(&mut self, a: char, b: char) {
        self.items.push(RangeItem::Letters(a.min(b), a.max(b)));
    }

    pub fn insert_text(&mut self, text: impl Into<String>) {
        self.items.push(RangeItem::Text(text.into()));
    }

    /// Union of two sets, simplified.
    pub fn union(&self, other: &LabelRangeSet) -> LabelRangeSet {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        let mut set = LabelRangeSet { items };
        set.simplify();
        set
    }

    pub fn contains_number(&self, n: i64) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, RangeItem::Numbers(lo, hi) if *lo <= n && n <= *hi))
    }

    pub fn contains_letter(&self, c: char) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, RangeItem::Letters(lo, hi) if *lo <= c && c <= *hi))
    }

    /// Membership of a single label written in the text form.
    pub fn contains(&self, label: &str) -> bool {
        let label = label.trim();
        if let Ok(n) = label.parse::<i64>() {
            return self.contains_number(n);
        }
        if let Some(c) = single_letter(label) {
            if self.contains_letter(c) {
                return true;
            }
        }
        self.items
            .iter()
            .any(|item| matches!(item, RangeItem::Text(t) if t == label))
    }

    /// Whether every member of `other` is a member of `self`.
    pub fn contains_set(&self, other: &LabelRangeSet) -> bool {
        let mine = self.simplified();
        other.simplified().items.iter().all(|item| match item {
            RangeItem::Numbers(lo, hi) => mine.items.iter().any(
                |m| matches!(m, RangeItem::Numbers(mlo, mhi) if mlo <= lo && hi <= mhi),
            ),
            RangeItem::Letters(lo, hi) => mine.items.iter().any(
                |m| matches!(m, RangeItem::Letters(mlo, mhi) if mlo <= lo && hi <= mhi),
            ),
            RangeItem::Text(t) => mine
                .items
                .iter()
                .any(|m| matches!(m, RangeItem::Text(mt) if mt == t)),
        })
    }

    pub fn has_numbers(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, RangeItem::Numbers(..)))
    }

    /// Numeric spans after merging, ascending. Members are not expanded.
    pub fn number_spans(&self) -> Vec<Interval> {
        self.simplified()
            .items
            .iter()
            .filter_map(|item| match item {
                RangeItem::Numbers(lo, hi) => Some(Interval::new(*lo, *hi)),
                _ => None,
            })
            .collect()
    }

    /// Every numeric member, ascending and without duplicates.
    pub fn numbers(&self) -> Vec<i64> {
        let mut out = BTreeSet::new();
        for item in &self.items {
            if let RangeItem::Numbers(lo, hi) = item {
                out.extend(*lo..=*hi);
            }
        }
        out.into_iter().collect()
    }

    /// Sort, deduplicate and merge touching spans.
    pub fn simplify(&mut self) {
        let mut numbers: Vec<(i64, i64)> = Vec::new();
        let mut letters: Vec<(char, char)> = Vec::new();
        let mut texts: BTreeSet<String> = BTreeSet::new();

        for item in self.items.drain(..) {
            match item {
                RangeItem::Numbers(lo, hi) => numbers.push((lo, hi)),
                RangeItem::Letters(lo, hi) => letters.push((lo, hi)),
                RangeItem::Text(t) => {
                    texts.insert(t);
                }
            }
        }

        numbers.sort_unstable();
        let mut merged_numbers: Vec<(i64, i64)> = Vec::with_capacity(numbers.len());
        for (lo, hi) in numbers {
            match merged_numbers.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged_numbers.push((lo, hi)),
            }
        }

        letters.sort_unstable();
        let mut merged_letters: Vec<(char, char)> = Vec::with_capacity(letters.len());
        for (lo, hi) in letters {
            match merged_letters.last_mut() {
                Some(last) if (lo as u32) <= (last.1 as u32) + 1 && same_case(last.1, lo) => {
                    last.1 = last.1.max(hi)
                }
                _ => merged_letters.push((lo, hi)),
            }
        }

        self.items = merged_numbers
            .into_iter()
            .map(|(lo, hi)| RangeItem::Numbers(lo, hi))
            .chain(
                merged_letters
                    .into_iter()
                    .map(|(lo, hi)| RangeItem::Letters(lo, hi)),
            )
            .chain(texts.into_iter().map(RangeItem::Text))
            .collect();
    }

    pub fn simplified(&self) -> LabelRangeSet {
        let mut copy = self.clone();
        copy.simplify();
        copy
    }

    pub fn parse(input: &str) -> Result<Self, RangeParseError> {
        let mut set = LabelRangeSet::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            set.items.push(parse_item(input, part)?);
        }
        Ok(set)
    }
}

fn parse_item(input: &str, part: &str) -> Result<RangeItem, RangeParseError> {
    if let Some((a, b)) = part.split_once('~') {
        let (a, b) = (a.trim(), b.trim());
        if let (Ok(lo), Ok(hi)) = (a.parse::<i64>(), b.parse::<i64>()) {
            return Ok(RangeItem::Numbers(lo.min(hi), lo.max(hi)));
        }
        if let (Some(lo), Some(hi)) = (single_letter(a), single_letter(b)) {
            if same_case(lo, hi) {
                return Ok(RangeItem::Letters(lo.min(hi), lo.max(hi)));
            }
            return Err(RangeParseError::new(input, format!("mixed-case letter span '{part}'")));
        }
        return Err(RangeParseError::new(input, format!("invalid span '{part}'")));
    }
    if let Ok(n) = part.parse::<i64>() {
        return Ok(RangeItem::Numbers(n, n));
    }
    if let Some(c) = single_letter(part) {
        return Ok(RangeItem::Letters(c, c));
    }
    if part.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Ok(RangeItem::Text(part.to_string()));
    }
    Err(RangeParseError::new(input, format!("invalid label '{part}'")))
}

fn single_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_alphabetic() => Some(c),
        _ => None,
    }
}

fn same_case(a: char, b: char) -> bool {
    a.is_uppercase() == b.is_uppercase()
}

impl PartialEq for LabelRangeSet {
    fn eq(&self, other: &Self) -> bool {
        self.simplified().items == other.simplified().items
    }
}

impl Eq for LabelRangeSet {}

impl fmt::Display for LabelRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl FromStr for LabelRangeSet {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for LabelRangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LabelRangeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
