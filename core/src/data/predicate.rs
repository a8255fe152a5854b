use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::frame::{Column, Mask};
use super::scalar::Scalar;

/// Row predicate applied to a single column. Null cells never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Equals { value: Scalar },
    OneOf { values: Vec<Scalar> },
    /// Inclusive on both ends
    Between { min: Scalar, max: Scalar },
}

impl Predicate {
    pub fn test(&self, cell: &Scalar) -> bool {
        match self {
            Predicate::Equals { value } => cell.matches(value),
            Predicate::OneOf { values } => values.iter().any(|v| cell.matches(v)),
            Predicate::Between { min, max } => {
                matches!(
                    cell.compare(min),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                ) && matches!(
                    cell.compare(max),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                )
            }
        }
    }

    pub fn mask(&self, column: &Column) -> Mask {
        Mask::from_iter(column.values().iter().map(|cell| self.test(cell)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_is_inclusive() {
        let p = Predicate::Between {
            min: Scalar::Int(2),
            max: Scalar::Float(3.0),
        };
        assert!(p.test(&Scalar::Int(2)));
        assert!(p.test(&Scalar::Float(3.0)));
        assert!(!p.test(&Scalar::Int(4)));
        assert!(!p.test(&Scalar::Null));
    }

    #[test]
    fn one_of_matches_any() {
        let p = Predicate::OneOf {
            values: vec!["Asia".into(), "Europe".into()],
        };
        assert!(p.test(&"Europe".into()));
        assert!(!p.test(&"Africa".into()));
    }
}
