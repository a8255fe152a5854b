use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{Predicate, Scalar};
use crate::{Result, TrellisError};

/// Literal accepted in multi selections meaning "do not filter"
pub const ALL: &str = "ALL";

/// Current selection of a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    All,
    Single(Scalar),
    Many(Vec<Scalar>),
    Range(Scalar, Scalar),
}

impl ControlValue {
    /// JSON form handed to render functions as a keyword argument
    pub fn to_json(&self) -> Value {
        match self {
            ControlValue::All => Value::from(ALL),
            ControlValue::Single(v) => v.to_json(),
            ControlValue::Many(vs) => Value::Array(vs.iter().map(Scalar::to_json).collect()),
            ControlValue::Range(lo, hi) => Value::Array(vec![lo.to_json(), hi.to_json()]),
        }
    }

    pub fn predicate(&self) -> Option<Predicate> {
        match self {
            ControlValue::All => None,
            ControlValue::Single(v) => Some(Predicate::Equals { value: v.clone() }),
            ControlValue::Many(vs) => Some(Predicate::OneOf { values: vs.clone() }),
            ControlValue::Range(lo, hi) => Some(Predicate::Between {
                min: lo.clone(),
                max: hi.clone(),
            }),
        }
    }
}

/// UI widget backing a control; decides how raw values are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    Dropdown { options: Vec<Scalar>, multi: bool },
    Checklist { options: Vec<Scalar> },
    RadioItems { options: Vec<Scalar> },
    Slider {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    RangeSlider {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    DatePicker {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
        range: bool,
    },
}

impl Selector {
    pub fn dropdown() -> Self {
        Selector::Dropdown {
            options: Vec::new(),
            multi: true,
        }
    }

    pub fn single_dropdown() -> Self {
        Selector::Dropdown {
            options: Vec::new(),
            multi: false,
        }
    }

    pub fn checklist() -> Self {
        Selector::Checklist {
            options: Vec::new(),
        }
    }

    pub fn radio_items() -> Self {
        Selector::RadioItems {
            options: Vec::new(),
        }
    }

    pub fn slider() -> Self {
        Selector::Slider {
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn range_slider() -> Self {
        Selector::RangeSlider {
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn date_range() -> Self {
        Selector::DatePicker {
            min: None,
            max: None,
            range: true,
        }
    }

    pub fn with_options<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        match self {
            Selector::Dropdown { multi, .. } => Selector::Dropdown {
                options: values,
                multi,
            },
            Selector::Checklist { .. } => Selector::Checklist { options: values },
            Selector::RadioItems { .. } => Selector::RadioItems { options: values },
            other => other,
        }
    }

    pub fn with_bounds(self, lo: f64, hi: f64) -> Self {
        match self {
            Selector::Slider { step, .. } => Selector::Slider {
                min: Some(lo),
                max: Some(hi),
                step,
            },
            Selector::RangeSlider { step, .. } => Selector::RangeSlider {
                min: Some(lo),
                max: Some(hi),
                step,
            },
            other => other,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(
            self,
            Selector::Dropdown { .. } | Selector::Checklist { .. } | Selector::RadioItems { .. }
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Selector::Slider { .. } | Selector::RangeSlider { .. })
    }

    fn is_multi(&self) -> bool {
        matches!(
            self,
            Selector::Dropdown { multi: true, .. } | Selector::Checklist { .. }
        )
    }

    fn is_range(&self) -> bool {
        matches!(
            self,
            Selector::RangeSlider { .. } | Selector::DatePicker { range: true, .. }
        )
    }

    /// Whether options or bounds still need to be derived from data
    pub fn needs_data_defaults(&self) -> bool {
        match self {
            Selector::Dropdown { options, .. }
            | Selector::Checklist { options }
            | Selector::RadioItems { options } => options.is_empty(),
            Selector::Slider { min, max, .. } | Selector::RangeSlider { min, max, .. } => {
                min.is_none() || max.is_none()
            }
            Selector::DatePicker { min, max, .. } => min.is_none() || max.is_none(),
        }
    }

    /// Fill missing options or bounds from the values of the filtered column
    pub fn fill_from(self, values: &[Scalar]) -> Self {
        let numeric = || {
            values
                .iter()
                .filter_map(Scalar::as_f64)
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })
        };
        match self {
            Selector::Dropdown { options, multi } if options.is_empty() => Selector::Dropdown {
                options: values.to_vec(),
                multi,
            },
            Selector::Checklist { options } if options.is_empty() => Selector::Checklist {
                options: values.to_vec(),
            },
            Selector::RadioItems { options } if options.is_empty() => Selector::RadioItems {
                options: values.to_vec(),
            },
            Selector::Slider { min, max, step } => {
                let range = numeric();
                Selector::Slider {
                    min: min.or(range.map(|r| r.0)),
                    max: max.or(range.map(|r| r.1)),
                    step,
                }
            }
            Selector::RangeSlider { min, max, step } => {
                let range = numeric();
                Selector::RangeSlider {
                    min: min.or(range.map(|r| r.0)),
                    max: max.or(range.map(|r| r.1)),
                    step,
                }
            }
            Selector::DatePicker { min, max, range } => {
                let dates: Vec<NaiveDate> = values.iter().filter_map(Scalar::as_date).collect();
                Selector::DatePicker {
                    min: min.or(dates.iter().min().copied()),
                    max: max.or(dates.iter().max().copied()),
                    range,
                }
            }
            other => other,
        }
    }

    /// Selection used when the snapshot carries no value for the control
    pub fn default_value(&self) -> ControlValue {
        match self {
            Selector::Dropdown { multi: true, .. } | Selector::Checklist { .. } => {
                ControlValue::All
            }
            Selector::Dropdown { options, .. } | Selector::RadioItems { options } => options
                .first()
                .cloned()
                .map(ControlValue::Single)
                .unwrap_or(ControlValue::All),
            Selector::Slider { min, .. } => min
                .map(|m| ControlValue::Single(Scalar::Float(m)))
                .unwrap_or(ControlValue::All),
            Selector::RangeSlider { min, max, .. } => match (min, max) {
                (Some(lo), Some(hi)) => {
                    ControlValue::Range(Scalar::Float(*lo), Scalar::Float(*hi))
                }
                _ => ControlValue::All,
            },
            Selector::DatePicker {
                min,
                max,
                range: true,
            } => match (min, max) {
                (Some(lo), Some(hi)) => ControlValue::Range(Scalar::Date(*lo), Scalar::Date(*hi)),
                _ => ControlValue::All,
            },
            Selector::DatePicker { min, .. } => min
                .map(|d| ControlValue::Single(Scalar::Date(d)))
                .unwrap_or(ControlValue::All),
        }
    }

    /// Read a raw UI value for the control `control_id`
    pub fn coerce(&self, control_id: &str, raw: &Value) -> Result<ControlValue> {
        let invalid = |reason: String| TrellisError::InvalidControlValue {
            control: control_id.to_string(),
            reason,
        };
        let scalar = |v: &Value| {
            Scalar::from_json(v).ok_or_else(|| invalid(format!("expected a scalar, got {}", v)))
        };

        if raw.is_null() || raw.as_str() == Some(ALL) {
            return Ok(ControlValue::All);
        }

        if self.is_range() {
            return match raw.as_array().map(Vec::as_slice) {
                Some([lo, hi]) => Ok(ControlValue::Range(scalar(lo)?, scalar(hi)?)),
                _ => Err(invalid(format!("expected a [min, max] pair, got {}", raw))),
            };
        }

        if self.is_multi() {
            return match raw {
                Value::Array(items) => {
                    if items.iter().any(|v| v.as_str() == Some(ALL)) {
                        return Ok(ControlValue::All);
                    }
                    items
                        .iter()
                        .map(scalar)
                        .collect::<Result<Vec<_>>>()
                        .map(ControlValue::Many)
                }
                other => Ok(ControlValue::Many(vec![scalar(other)?])),
            };
        }

        match raw {
            Value::Array(_) => Err(invalid(format!("expected a single value, got {}", raw))),
            other => Ok(ControlValue::Single(scalar(other)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlKind {
    /// Row filter over `column` of each target's data
    Filter { column: String },
    /// Overrides a render argument; targets are `component.argument`
    Parameter,
}

/// A filter or parameter affecting one or more targets
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    id: String,
    kind: ControlKind,
    selector: Selector,
    targets: Vec<String>,
}

impl Control {
    /// Filter on `column`; with no explicit targets it applies to every
    /// component on its page whose data carries the column
    pub fn filter(id: impl Into<String>, column: impl Into<String>, selector: Selector) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Filter {
                column: column.into(),
            },
            selector,
            targets: Vec::new(),
        }
    }

    pub fn parameter<I, S>(id: impl Into<String>, targets: I, selector: Selector) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind: ControlKind::Parameter,
            selector,
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Raw targets: component ids for filters, `component.argument` for parameters
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn column(&self) -> Option<&str> {
        match &self.kind {
            ControlKind::Filter { column } => Some(column),
            ControlKind::Parameter => None,
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.kind, ControlKind::Filter { .. })
    }

    /// Component ids affected by this control
    pub fn target_components(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in &self.targets {
            let component = match self.kind {
                ControlKind::Filter { .. } => t.as_str(),
                ControlKind::Parameter => t.rsplit_once('.').map(|(c, _)| c).unwrap_or(t),
            };
            if !out.contains(&component) {
                out.push(component);
            }
        }
        out
    }

    /// Argument name this parameter sets on `component`, if any
    pub fn argument_for(&self, component: &str) -> Option<&str> {
        if self.is_filter() {
            return None;
        }
        self.targets.iter().find_map(|t| match t.rsplit_once('.') {
            Some((c, arg)) if c == component => Some(arg),
            _ => None,
        })
    }

    /// Selection from a snapshot entry, or the selector default
    pub fn value_from(&self, raw: Option<&Value>) -> Result<ControlValue> {
        match raw {
            Some(v) => self.selector.coerce(&self.id, v),
            None => Ok(self.selector.default_value()),
        }
    }
}
