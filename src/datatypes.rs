use std::fmt::{Display, Formatter};

use itertools::Itertools;

/// Data types supported in scalar expressions and column definitions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum DataType {
    /// The type of an untyped NULL.
    Unknown,
    Bool,
    Int,
    Float,
    String,
    Date,
    Timestamp,
    TimestampTz,
    Tuple(Vec<DataType>),
    Array(Box<DataType>),
}

impl DataType {
    /// Returns `true` if values of this type can be compared with values of the given type.
    pub fn is_comparable_with(&self, other: &DataType) -> bool {
        match (self, other) {
            (DataType::Unknown, _) | (_, DataType::Unknown) => true,
            (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int) => true,
            (DataType::Tuple(l), DataType::Tuple(r)) => {
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(l, r)| l.is_comparable_with(r))
            }
            (DataType::Array(l), DataType::Array(r)) => l.is_comparable_with(r),
            (l, r) => l == r,
        }
    }

    /// Returns `true` if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }

    /// Returns `true` if this is a date or a timestamp type.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp | DataType::TimestampTz)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Unknown => write!(f, "unknown"),
            DataType::Bool => write!(f, "bool"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::String => write!(f, "string"),
            DataType::Date => write!(f, "date"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::TimestampTz => write!(f, "timestamptz"),
            DataType::Tuple(types) => write!(f, "tuple{{{}}}", types.iter().join(", ")),
            DataType::Array(element) => write!(f, "{}[]", element),
        }
    }
}

#[cfg(test)]
mod test {
    use super::DataType;

    #[test]
    fn comparable_types() {
        assert!(DataType::Int.is_comparable_with(&DataType::Float));
        assert!(DataType::Unknown.is_comparable_with(&DataType::Date));
        assert!(!DataType::String.is_comparable_with(&DataType::Int));

        let t1 = DataType::Tuple(vec![DataType::Int, DataType::String]);
        let t2 = DataType::Tuple(vec![DataType::Float, DataType::String]);
        let t3 = DataType::Tuple(vec![DataType::Int]);
        assert!(t1.is_comparable_with(&t2));
        assert!(!t1.is_comparable_with(&t3));
    }

    #[test]
    fn display() {
        let tuple = DataType::Tuple(vec![DataType::Int, DataType::Array(Box::new(DataType::String))]);
        assert_eq!(format!("{}", tuple), "tuple{int, string[]}");
    }
}
