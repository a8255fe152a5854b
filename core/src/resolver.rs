//! Dependency resolution: which controls affect a target, and what the target
//! looks like once they are applied.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::{DataFrame, Mask, Predicate};
use crate::figure::Kwargs;
use crate::model::{Component, ComponentKind, Control, ControlState, ControlValue};
use crate::registry::Registry;
use crate::{Result, TrellisError};

/// Outcome of recomputing one target
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Ready { frame: Arc<DataFrame>, value: Value },
    /// Filtering left no rows; callers render a placeholder
    Empty { frame: Arc<DataFrame> },
}

impl Resolved {
    pub fn frame(&self) -> &Arc<DataFrame> {
        match self {
            Resolved::Ready { frame, .. } | Resolved::Empty { frame } => frame,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Resolved::Empty { .. })
    }
}

/// Controls applied to one target, in id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedControls {
    pub filters: Vec<(String, String, Predicate)>,
    pub overrides: Kwargs,
}

/// Stateless view over a frozen registry
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Every snapshot entry must name a registered control
    pub fn validate_state(&self, state: &ControlState) -> Result<()> {
        for id in state.ids() {
            if !self.registry.is_control(id) {
                return Err(TrellisError::UnknownControl(id.to_string()));
            }
        }
        Ok(())
    }

    /// Controls whose targets include `target`
    pub fn applicable_controls(&self, target: &str) -> Vec<Arc<Control>> {
        self.registry
            .controls()
            .into_iter()
            .filter(|c| c.target_components().contains(&target))
            .collect()
    }

    /// Read the current selection of every applicable control.
    ///
    /// Filters become predicates keyed by column; parameters become render
    /// argument overrides. A selection of "all" contributes nothing.
    pub fn applied_controls(&self, target: &str, state: &ControlState) -> Result<AppliedControls> {
        let mut applied = AppliedControls::default();
        for control in self.applicable_controls(target) {
            let value = control.value_from(state.get(control.id()))?;
            match control.column() {
                Some(column) => {
                    if let Some(predicate) = value.predicate() {
                        applied
                            .filters
                            .push((control.id().to_string(), column.to_string(), predicate));
                    }
                }
                None => {
                    if let Some(arg) = control.argument_for(target) {
                        if value != ControlValue::All {
                            applied.overrides.insert(arg.to_string(), value.to_json());
                        }
                    }
                }
            }
        }
        Ok(applied)
    }

    /// Target data with every filter applied as a logical AND
    pub fn filtered_frame(
        &self,
        component: &Component,
        state: &ControlState,
    ) -> Result<Arc<DataFrame>> {
        let source = component.data_source().ok_or_else(|| {
            TrellisError::InvalidBinding(format!("`{}` is not backed by data", component.id()))
        })?;
        let frame = self.registry.get_data(source)?;
        let applied = self.applied_controls(component.id(), state)?;
        self.apply_filters(component.id(), &frame, &applied.filters)
    }

    fn apply_filters(
        &self,
        target: &str,
        frame: &Arc<DataFrame>,
        filters: &[(String, String, Predicate)],
    ) -> Result<Arc<DataFrame>> {
        if filters.is_empty() {
            return Ok(Arc::clone(frame));
        }
        let mut mask = Mask::all(frame.num_rows());
        for (control, column, predicate) in filters {
            let col = frame.column(column).ok_or_else(|| TrellisError::ColumnNotFound {
                target: target.to_string(),
                column: column.clone(),
            })?;
            mask = mask.and(&predicate.mask(col));
            debug!(
                target: "resolver",
                target_id = %target,
                control = %control,
                remaining = mask.count(),
                "Applied filter"
            );
        }
        Ok(Arc::new(frame.filter(&mask)))
    }

    /// Recompute `target` under `state`
    pub fn resolve(&self, target: &str, state: &ControlState) -> Result<Resolved> {
        let component = self.registry.lookup(target)?;
        match component.kind() {
            ComponentKind::Card { text } => Ok(Resolved::Ready {
                frame: Arc::new(DataFrame::default()),
                value: Value::String(text.clone()),
            }),
            ComponentKind::Download => Err(TrellisError::InvalidBinding(format!(
                "`{}` is a download sink and cannot be recomputed",
                target
            ))),
            ComponentKind::Graph { data_source, figure }
            | ComponentKind::Table { data_source, figure } => {
                let frame = self.registry.get_data(data_source)?;
                let applied = self.applied_controls(target, state)?;
                let filtered = self.apply_filters(target, &frame, &applied.filters)?;
                if filtered.is_empty() {
                    warn!(
                        target: "resolver",
                        target_id = %target,
                        source = %data_source,
                        "Empty result after filtering"
                    );
                    return Ok(Resolved::Empty { frame: filtered });
                }
                let value = figure.call(&filtered, &applied.overrides)?;
                Ok(Resolved::Ready {
                    frame: filtered,
                    value,
                })
            }
        }
    }
}
