use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ordered_float::OrderedFloat;

use crate::datatypes::DataType;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Supported scalar values.
///
/// A `Const` expression never holds [ScalarValue::Null]; NULLs are represented by the `Null` operator
/// that carries a data type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl ScalarValue {
    /// Returns the type of this scalar value.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Unknown,
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Int(_) => DataType::Int,
            ScalarValue::Float(_) => DataType::Float,
            ScalarValue::String(_) => DataType::String,
            ScalarValue::Date(_) => DataType::Date,
            ScalarValue::Timestamp(_) => DataType::Timestamp,
            ScalarValue::TimestampTz(_) => DataType::TimestampTz,
        }
    }

    /// Creates a float value.
    pub fn float(value: f64) -> Self {
        ScalarValue::Float(OrderedFloat(value))
    }

    /// Creates a date value from a `YYYY-MM-DD` string.
    pub fn date(value: &str) -> Option<Self> {
        NaiveDate::parse_from_str(value, DATE_FORMAT).ok().map(ScalarValue::Date)
    }

    /// Creates a timestamp value from a `YYYY-MM-DD HH:MM:SS` string.
    pub fn timestamp(value: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok().map(ScalarValue::Timestamp)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Compares this value with the given value. Returns `None` if values are not comparable.
    /// NULLs are not comparable with anything.
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Bool(l), ScalarValue::Bool(r)) => Some(l.cmp(r)),
            (ScalarValue::Int(l), ScalarValue::Int(r)) => Some(l.cmp(r)),
            (ScalarValue::Float(l), ScalarValue::Float(r)) => Some(l.cmp(r)),
            (ScalarValue::Int(l), ScalarValue::Float(r)) => Some(OrderedFloat(*l as f64).cmp(r)),
            (ScalarValue::Float(l), ScalarValue::Int(r)) => Some(l.cmp(&OrderedFloat(*r as f64))),
            (ScalarValue::String(l), ScalarValue::String(r)) => Some(l.cmp(r)),
            (ScalarValue::Date(l), ScalarValue::Date(r)) => Some(l.cmp(r)),
            (ScalarValue::Timestamp(l), ScalarValue::Timestamp(r)) => Some(l.cmp(r)),
            (ScalarValue::TimestampTz(l), ScalarValue::TimestampTz(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Converts this value to the given type. Returns `None` if the conversion is not supported
    /// or the value can not be represented in the target type.
    pub fn cast(&self, data_type: &DataType) -> Option<ScalarValue> {
        if self.data_type() == *data_type {
            return Some(self.clone());
        }
        let value = match (self, data_type) {
            (ScalarValue::Null, _) => ScalarValue::Null,
            (ScalarValue::Bool(v), DataType::Int) => ScalarValue::Int(i64::from(*v)),
            (ScalarValue::Bool(v), DataType::String) => ScalarValue::String(v.to_string()),
            (ScalarValue::Int(v), DataType::Bool) => ScalarValue::Bool(*v != 0),
            (ScalarValue::Int(v), DataType::Float) => ScalarValue::float(*v as f64),
            (ScalarValue::Int(v), DataType::String) => ScalarValue::String(v.to_string()),
            (ScalarValue::Float(v), DataType::Int) => {
                let v = v.0.round();
                if !v.is_finite() || v < i64::MIN as f64 || v >= i64::MAX as f64 {
                    return None;
                }
                ScalarValue::Int(v as i64)
            }
            (ScalarValue::Float(v), DataType::String) => ScalarValue::String(v.to_string()),
            (ScalarValue::String(v), DataType::Bool) => match v.trim().to_lowercase().as_str() {
                "true" | "t" => ScalarValue::Bool(true),
                "false" | "f" => ScalarValue::Bool(false),
                _ => return None,
            },
            (ScalarValue::String(v), DataType::Int) => ScalarValue::Int(v.trim().parse().ok()?),
            (ScalarValue::String(v), DataType::Float) => ScalarValue::float(v.trim().parse().ok()?),
            (ScalarValue::String(v), DataType::Date) => ScalarValue::date(v.trim())?,
            (ScalarValue::String(v), DataType::Timestamp) => ScalarValue::timestamp(v.trim())?,
            (ScalarValue::String(v), DataType::TimestampTz) => {
                let ts = NaiveDateTime::parse_from_str(v.trim(), TIMESTAMP_FORMAT).ok()?;
                ScalarValue::TimestampTz(Utc.from_utc_datetime(&ts))
            }
            (ScalarValue::Date(v), DataType::Timestamp) => ScalarValue::Timestamp(v.and_hms_opt(0, 0, 0)?),
            (ScalarValue::Date(v), DataType::TimestampTz) => {
                ScalarValue::TimestampTz(Utc.from_utc_datetime(&v.and_hms_opt(0, 0, 0)?))
            }
            (ScalarValue::Date(v), DataType::String) => ScalarValue::String(v.to_string()),
            (ScalarValue::Timestamp(v), DataType::Date) => ScalarValue::Date(v.date()),
            (ScalarValue::Timestamp(v), DataType::TimestampTz) => ScalarValue::TimestampTz(Utc.from_utc_datetime(v)),
            (ScalarValue::Timestamp(v), DataType::String) => ScalarValue::String(v.to_string()),
            (ScalarValue::TimestampTz(v), DataType::Date) => ScalarValue::Date(v.naive_utc().date()),
            (ScalarValue::TimestampTz(v), DataType::Timestamp) => ScalarValue::Timestamp(v.naive_utc()),
            (ScalarValue::TimestampTz(v), DataType::String) => ScalarValue::String(v.naive_utc().to_string()),
            _ => return None,
        };
        Some(value)
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(value) => write!(f, "{}", value),
            ScalarValue::Int(value) => write!(f, "{}", value),
            ScalarValue::Float(value) => write!(f, "{:?}", value.0),
            ScalarValue::String(value) => write!(f, "'{}'", value),
            ScalarValue::Date(value) => write!(f, "'{}'", value),
            ScalarValue::Timestamp(value) => write!(f, "'{}'", value),
            ScalarValue::TimestampTz(value) => write!(f, "'{}+00:00'", value.naive_utc()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scalar_value_data_types() {
        assert_eq!(ScalarValue::Null.data_type(), DataType::Unknown, "null value");
        assert_eq!(ScalarValue::Bool(true).data_type(), DataType::Bool, "bool value");
        assert_eq!(ScalarValue::Int(1).data_type(), DataType::Int, "int value");
        assert_eq!(ScalarValue::float(1.5).data_type(), DataType::Float, "float value");
        assert_eq!(ScalarValue::String(String::from("abc")).data_type(), DataType::String, "string value");
        assert_eq!(ScalarValue::date("2020-01-02").unwrap().data_type(), DataType::Date, "date value");
    }

    #[test]
    fn test_compare() {
        assert_eq!(ScalarValue::Int(1).compare(&ScalarValue::Int(2)), Some(Ordering::Less));
        assert_eq!(ScalarValue::Int(2).compare(&ScalarValue::float(2.0)), Some(Ordering::Equal));
        assert_eq!(ScalarValue::Int(1).compare(&ScalarValue::String("1".into())), None);
        assert_eq!(ScalarValue::Null.compare(&ScalarValue::Null), None);
    }

    #[test]
    fn test_numeric_casts() {
        assert_eq!(ScalarValue::float(2.0).cast(&DataType::Int), Some(ScalarValue::Int(2)));
        assert_eq!(ScalarValue::float(2.5).cast(&DataType::Int), Some(ScalarValue::Int(3)));
        assert_eq!(ScalarValue::float(f64::NAN).cast(&DataType::Int), None);
        assert_eq!(ScalarValue::float(1e30).cast(&DataType::Int), None);
        assert_eq!(ScalarValue::Int(7).cast(&DataType::Float), Some(ScalarValue::float(7.0)));
        assert_eq!(ScalarValue::String("12".into()).cast(&DataType::Int), Some(ScalarValue::Int(12)));
        assert_eq!(ScalarValue::String("x".into()).cast(&DataType::Int), None);
    }

    #[test]
    fn test_temporal_casts() {
        let date = ScalarValue::date("2021-03-04").unwrap();
        let midnight = ScalarValue::timestamp("2021-03-04 00:00:00").unwrap();
        let noon = ScalarValue::timestamp("2021-03-04 12:00:00").unwrap();

        assert_eq!(date.cast(&DataType::Timestamp), Some(midnight.clone()));
        assert_eq!(noon.cast(&DataType::Date), Some(date.clone()));
        assert_eq!(midnight.cast(&DataType::TimestampTz).and_then(|v| v.cast(&DataType::Timestamp)), Some(midnight));
    }

    #[test]
    fn test_display() {
        assert_eq!(ScalarValue::float(2.0).to_string(), "2.0");
        assert_eq!(ScalarValue::String("a".into()).to_string(), "'a'");
        assert_eq!(ScalarValue::date("2021-03-04").unwrap().to_string(), "'2021-03-04'");
    }
}
