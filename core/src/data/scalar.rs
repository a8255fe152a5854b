use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single typed cell of a data frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(d) => Some(*d),
            Scalar::Str(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
            _ => None,
        }
    }

    /// Infer the narrowest type for a raw text cell
    pub fn parse(raw: &str) -> Scalar {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }
        match trimmed {
            "true" | "True" | "TRUE" => return Scalar::Bool(true),
            "false" | "False" | "FALSE" => return Scalar::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Scalar::Float(f);
            }
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return Scalar::Date(d);
        }
        Scalar::Str(raw.to_string())
    }

    /// Convert a JSON value coming from the UI layer
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }

    /// Order two cells, coercing across int/float and ISO date strings.
    /// Nulls and incompatible types are unordered.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => None,
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Date(_), _) | (_, Scalar::Date(_)) => {
                Some(self.as_date()?.cmp(&other.as_date()?))
            }
            _ => None,
        }
    }

    pub fn matches(&self, other: &Scalar) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::Date(_) => 3,
            Scalar::Str(_) => 4,
        }
    }

    /// Total order for sorting mixed columns: nulls, bools, numbers, dates,
    /// then strings. Within a kind values sort naturally.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Date(a), Scalar::Date(b)) => a.cmp(b),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(value: NaiveDate) -> Self {
        Scalar::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_infers_types() {
        assert_eq!(Scalar::parse("42"), Scalar::Int(42));
        assert_eq!(Scalar::parse("4.5"), Scalar::Float(4.5));
        assert_eq!(Scalar::parse("true"), Scalar::Bool(true));
        assert_eq!(Scalar::parse(""), Scalar::Null);
        assert_eq!(
            Scalar::parse("2007-01-01"),
            Scalar::Date(NaiveDate::from_ymd_opt(2007, 1, 1).unwrap())
        );
        assert_eq!(Scalar::parse("Asia"), Scalar::Str("Asia".into()));
    }

    #[test]
    fn compare_coerces_numbers_and_dates() {
        assert!(Scalar::Int(2).matches(&Scalar::Float(2.0)));
        assert_eq!(
            Scalar::Int(1).compare(&Scalar::Float(1.5)),
            Some(Ordering::Less)
        );
        let d = Scalar::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        assert!(d.matches(&Scalar::from("2020-05-01")));
        assert_eq!(Scalar::Null.compare(&Scalar::Null), None);
        assert_eq!(Scalar::from("a").compare(&Scalar::Int(1)), None);
    }

    #[test]
    fn total_cmp_orders_mixed_kinds() {
        let d = Scalar::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        let mixed = vec![
            Scalar::from("b"),
            Scalar::Float(2.5),
            d.clone(),
            Scalar::Null,
            Scalar::Int(3),
            Scalar::from("a"),
            Scalar::Bool(true),
            Scalar::Int(1),
        ];
        let expected = vec![
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Int(1),
            Scalar::Float(2.5),
            Scalar::Int(3),
            d,
            Scalar::from("a"),
            Scalar::from("b"),
        ];

        let mut forward = mixed.clone();
        forward.sort_by(|a, b| a.total_cmp(b));
        let mut backward: Vec<Scalar> = mixed.into_iter().rev().collect();
        backward.sort_by(|a, b| a.total_cmp(b));

        assert_eq!(forward, expected);
        assert_eq!(backward, expected);
    }
}
