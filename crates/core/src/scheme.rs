use serde::{Deserialize, Serialize};

/// How civic numbers progress along one side of a road.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// No addressing on this side. Carries no interval.
    #[default]
    None,
    /// Only odd numbers.
    Odd,
    /// Only even numbers.
    Even,
    /// Every number, odd and even.
    Continuous,
}

impl Scheme {
    /// ODD and EVEN swap; NONE and CONTINUOUS are their own opposite.
    pub fn opposite(self) -> Self {
        match self {
            Self::Odd => Self::Even,
            Self::Even => Self::Odd,
            other => other,
        }
    }

    pub fn is_same(self, other: Scheme) -> bool {
        self == other
    }

    pub fn is_even_or_odd(self) -> bool {
        matches!(self, Self::Odd | Self::Even)
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }

    /// Parity scheme of a single number.
    pub fn of_number(n: i64) -> Self {
        if n.rem_euclid(2) == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }

    /// Whether a number is a valid member of this scheme.
    pub fn accepts(self, n: i64) -> bool {
        match self {
            Self::None => false,
            Self::Odd => n.rem_euclid(2) == 1,
            Self::Even => n.rem_euclid(2) == 0,
            Self::Continuous => true,
        }
    }

    /// Distance between consecutive members.
    pub fn step(self) -> i64 {
        match self {
            Self::Odd | Self::Even => 2,
            Self::Continuous | Self::None => 1,
        }
    }

    /// Combine two schemes describing the same side.
    ///
    /// Returns the stricter of the two when they are compatible and `None`
    /// when they are not (ODD against EVEN). Disagreement is a value here;
    /// callers decide whether it is a validation failure.
    pub fn combine(self, other: Scheme) -> Option<Scheme> {
        match (self, other) {
            (Self::None, x) | (x, Self::None) => Some(x),
            (a, b) if a == b => Some(a),
            (Self::Continuous, x) | (x, Self::Continuous) => Some(x),
            _ => None,
        }
    }

    pub fn is_compatible(self, other: Scheme) -> bool {
        self.combine(other).is_some()
    }

    /// Scheme of the hull of two ranges: the common scheme when they agree,
    /// CONTINUOUS when they do not.
    pub fn union(self, other: Scheme) -> Scheme {
        match (self, other) {
            (Self::None, x) | (x, Self::None) => x,
            (a, b) if a == b => a,
            _ => Self::Continuous,
        }
    }

    /// Classify a set of observed numbers.
    pub fn classify<I>(numbers: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        numbers
            .into_iter()
            .fold(Self::None, |acc, n| acc.union(Self::of_number(n)))
    }

    /// Short code used in diagnostics and text tables.
    pub fn code(self) -> &'static str {
        match self {
            Self::None => "N",
            Self::Odd => "O",
            Self::Even => "E",
            Self::Continuous => "C",
        }
    }

    /// Parse either the short code or the lowercase name.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "n" | "none" | "" => Some(Self::None),
            "o" | "odd" => Some(Self::Odd),
            "e" | "even" => Some(Self::Even),
            "c" | "continuous" => Some(Self::Continuous),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Odd => write!(f, "ODD"),
            Self::Even => write!(f, "EVEN"),
            Self::Continuous => write!(f, "CONTINUOUS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_swaps_parity_only() {
        assert_eq!(Scheme::Odd.opposite(), Scheme::Even);
        assert_eq!(Scheme::Even.opposite(), Scheme::Odd);
        assert_eq!(Scheme::None.opposite(), Scheme::None);
        assert_eq!(Scheme::Continuous.opposite(), Scheme::Continuous);
    }

    #[test]
    fn accepts_by_parity() {
        assert!(Scheme::Odd.accepts(101));
        assert!(!Scheme::Odd.accepts(100));
        assert!(Scheme::Even.accepts(100));
        assert!(Scheme::Even.accepts(-4));
        assert!(Scheme::Odd.accepts(-3));
        assert!(Scheme::Continuous.accepts(7));
        assert!(!Scheme::None.accepts(7));
    }

    #[test]
    fn combine_takes_stricter() {
        assert_eq!(Scheme::Continuous.combine(Scheme::Odd), Some(Scheme::Odd));
        assert_eq!(Scheme::Even.combine(Scheme::Continuous), Some(Scheme::Even));
        assert_eq!(Scheme::None.combine(Scheme::Even), Some(Scheme::Even));
        assert_eq!(Scheme::Odd.combine(Scheme::Odd), Some(Scheme::Odd));
        assert_eq!(Scheme::Odd.combine(Scheme::Even), None);
    }

    #[test]
    fn union_widens_to_continuous() {
        assert_eq!(Scheme::Odd.union(Scheme::Even), Scheme::Continuous);
        assert_eq!(Scheme::None.union(Scheme::Odd), Scheme::Odd);
        assert_eq!(Scheme::Even.union(Scheme::Even), Scheme::Even);
    }

    #[test]
    fn classify_observed_numbers() {
        assert_eq!(Scheme::classify([101, 103, 155]), Scheme::Odd);
        assert_eq!(Scheme::classify([100, 102]), Scheme::Even);
        assert_eq!(Scheme::classify([100, 101]), Scheme::Continuous);
        assert_eq!(Scheme::classify(std::iter::empty()), Scheme::None);
    }

    #[test]
    fn codes_round_trip() {
        for s in [Scheme::None, Scheme::Odd, Scheme::Even, Scheme::Continuous] {
            assert_eq!(Scheme::from_code(s.code()), Some(s));
        }
        assert_eq!(Scheme::from_code("even"), Some(Scheme::Even));
        assert_eq!(Scheme::from_code("x"), None);
    }
}
