use std::fmt::{Display, Formatter};

/// Bounds on the number of rows returned by a relational expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cardinality {
    pub min: u32,
    pub max: u32,
}

impl Cardinality {
    /// Represents an unbounded number of rows.
    pub const INFINITE: u32 = u32::MAX;

    /// Any number of rows.
    pub const fn any() -> Self {
        Cardinality {
            min: 0,
            max: Cardinality::INFINITE,
        }
    }

    /// Exactly zero rows.
    pub const fn zero() -> Self {
        Cardinality { min: 0, max: 0 }
    }

    /// Exactly one row.
    pub const fn one() -> Self {
        Cardinality { min: 1, max: 1 }
    }

    /// Exactly `n` rows.
    pub fn exactly(n: u32) -> Self {
        Cardinality { min: n, max: n }
    }

    pub fn is_zero(&self) -> bool {
        self.max == 0
    }

    pub fn is_one(&self) -> bool {
        self.min == 1 && self.max == 1
    }

    pub fn is_zero_or_one(&self) -> bool {
        self.max <= 1
    }

    pub fn can_be_zero(&self) -> bool {
        self.min == 0
    }

    pub fn is_unbounded(&self) -> bool {
        self.max == Cardinality::INFINITE
    }

    /// Caps both bounds at `n` rows.
    pub fn limit(&self, n: u32) -> Self {
        Cardinality {
            min: self.min.min(n),
            max: self.max.min(n),
        }
    }

    /// Lowers the minimum to `n` rows when it is larger.
    pub fn as_low_as(&self, n: u32) -> Self {
        Cardinality {
            min: self.min.min(n),
            max: self.max,
        }
    }

    /// Raises the minimum to `n` rows when it is smaller.
    pub fn at_least(&self, n: u32) -> Self {
        let min = self.min.max(n);
        Cardinality {
            min,
            max: self.max.max(min),
        }
    }

    /// Skips the first `n` rows.
    pub fn skip(&self, n: u32) -> Self {
        let max = if self.is_unbounded() {
            self.max
        } else {
            self.max.saturating_sub(n)
        };
        Cardinality {
            min: self.min.saturating_sub(n),
            max,
        }
    }

    /// The cardinality of a cross product.
    pub fn product(&self, other: &Cardinality) -> Self {
        Cardinality {
            min: mul(self.min, other.min),
            max: mul(self.max, other.max),
        }
    }

    /// The cardinality of a concatenation.
    pub fn add(&self, other: &Cardinality) -> Self {
        Cardinality {
            min: add(self.min, other.min),
            max: add(self.max, other.max),
        }
    }
}

fn mul(a: u32, b: u32) -> u32 {
    if a == 0 || b == 0 {
        0
    } else if a == Cardinality::INFINITE || b == Cardinality::INFINITE {
        Cardinality::INFINITE
    } else {
        a.saturating_mul(b)
    }
}

fn add(a: u32, b: u32) -> u32 {
    a.saturating_add(b)
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::any()
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_unbounded() {
            write!(f, "[{} - ]", self.min)
        } else {
            write!(f, "[{} - {}]", self.min, self.max)
        }
    }
}

#[cfg(test)]
mod test {
    use super::Cardinality;

    #[test]
    fn test_predicates() {
        assert!(Cardinality::zero().is_zero());
        assert!(Cardinality::zero().is_zero_or_one());
        assert!(Cardinality::one().is_one());
        assert!(!Cardinality::one().can_be_zero());
        assert!(Cardinality::any().can_be_zero());
        assert!(!Cardinality::any().is_zero_or_one());
    }

    #[test]
    fn test_arithmetic() {
        let c = Cardinality { min: 1, max: 10 };
        assert_eq!(c.limit(5), Cardinality { min: 1, max: 5 });
        assert_eq!(c.skip(3), Cardinality { min: 0, max: 7 });
        assert_eq!(c.product(&Cardinality::any()), Cardinality::any().at_least(0));
        assert_eq!(c.product(&Cardinality::zero()), Cardinality::zero());
        assert_eq!(Cardinality::any().skip(5), Cardinality::any());
        assert_eq!(c.add(&Cardinality::one()), Cardinality { min: 2, max: 11 });
    }

    #[test]
    fn test_display() {
        assert_eq!(Cardinality::any().to_string(), "[0 - ]");
        assert_eq!(Cardinality::one().to_string(), "[1 - 1]");
    }
}
