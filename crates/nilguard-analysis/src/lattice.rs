//! Three-valued nilness lattice.

/// Nilness of an SSA value under a set of dominating facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nilness {
    /// Provably the null reference.
    Nil,
    /// Provably not the null reference.
    NonNil,
    /// Nothing is known.
    Unknown,
}

impl Nilness {
    /// Negation swaps Nil and NonNil; Unknown is a fixed point.
    pub fn negate(self) -> Nilness {
        match self {
            Nilness::Nil => Nilness::NonNil,
            Nilness::NonNil => Nilness::Nil,
            Nilness::Unknown => Nilness::Unknown,
        }
    }

    /// Meet: agreeing operands keep their value, anything else is Unknown.
    pub fn meet(self, other: Nilness) -> Nilness {
        if self == other {
            self
        } else {
            Nilness::Unknown
        }
    }
}

impl std::fmt::Display for Nilness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nilness::Nil => write!(f, "nil"),
            Nilness::NonNil => write!(f, "non-nil"),
            Nilness::Unknown => write!(f, "unknown"),
        }
    }
}

/// Positional meet of two equal-length vectors.
pub fn meet_vec(a: &[Nilness], b: &[Nilness]) -> Vec<Nilness> {
    assert_eq!(a.len(), b.len(), "inconsistent nilness vector lengths");
    a.iter().zip(b).map(|(&x, &y)| x.meet(y)).collect()
}
