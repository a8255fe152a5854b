use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::executor::ActionContext;
use crate::{BoxError, Result, TrellisError};

/// A `component_id.property` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    pub component_id: String,
    pub property: String,
}

impl Binding {
    pub fn new(component_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            property: property.into(),
        }
    }

    /// Parse `"component.property"`; the split happens on the last dot
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.rsplit_once('.') {
            Some((id, prop)) if !id.is_empty() && !prop.is_empty() => Ok(Self::new(id, prop)),
            _ => Err(TrellisError::InvalidBinding(format!(
                "expected `component.property`, got `{}`",
                raw
            ))),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component_id, self.property)
    }
}

/// User supplied action body; returns one value per declared output, in order
pub type ActionFn =
    Arc<dyn Fn(&ActionContext<'_>) -> std::result::Result<Vec<Value>, BoxError> + Send + Sync>;

/// Tagged action capability
#[derive(Clone)]
pub enum ActionKind {
    /// Recompute every target of a filter
    Filter { control: String },
    /// Recompute every target of a parameter
    Parameter { control: String },
    /// Recompute every data-bound component of a page
    PageLoad { page: String },
    /// Write the filtered data of each target as CSV to a download component
    Export { targets: Vec<String> },
    Custom(ActionFn),
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Filter { .. } => "filter",
            ActionKind::Parameter { .. } => "parameter",
            ActionKind::PageLoad { .. } => "page_load",
            ActionKind::Export { .. } => "export",
            ActionKind::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Filter { control } => {
                f.debug_struct("Filter").field("control", control).finish()
            }
            ActionKind::Parameter { control } => {
                f.debug_struct("Parameter").field("control", control).finish()
            }
            ActionKind::PageLoad { page } => {
                f.debug_struct("PageLoad").field("page", page).finish()
            }
            ActionKind::Export { targets } => {
                f.debug_struct("Export").field("targets", targets).finish()
            }
            ActionKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Named unit of work; immutable once registered
#[derive(Debug, Clone)]
pub struct Action {
    id: String,
    inputs: Vec<Binding>,
    outputs: Vec<Binding>,
    kind: ActionKind,
}

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    pub fn custom<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> std::result::Result<Vec<Value>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(id, ActionKind::Custom(Arc::new(f)))
    }

    /// Export the filtered data of `targets` into the `download` component
    pub fn export_data<I, S>(id: impl Into<String>, download: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut action = Self::new(
            id,
            ActionKind::Export {
                targets: targets.into_iter().map(Into::into).collect(),
            },
        );
        action.outputs.push(Binding::new(download, "data"));
        action
    }

    pub fn input(mut self, binding: Binding) -> Self {
        self.inputs.push(binding);
        self
    }

    pub fn output(mut self, binding: Binding) -> Self {
        self.outputs.push(binding);
        self
    }

    /// Parse and append `component.property` strings as inputs
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in inputs {
            self.inputs.push(Binding::parse(raw.as_ref())?);
        }
        Ok(self)
    }

    /// Parse and append `component.property` strings as outputs
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in outputs {
            self.outputs.push(Binding::parse(raw.as_ref())?);
        }
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inputs(&self) -> &[Binding] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Binding] {
        &self.outputs
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }
}

/// One originating event and the ordered chain of actions it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    source: Binding,
    chain: Vec<String>,
}

impl Trigger {
    pub fn new(source: Binding, chain: Vec<String>) -> Self {
        Self { source, chain }
    }

    pub fn source(&self) -> &Binding {
        &self.source
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}
