//! Execution loop: one dispatch per UI event.
//!
//! A dispatch looks up the trigger for the originating binding, runs its chain
//! strictly in declared order and returns one aggregated output map. A failing
//! action aborts the chain and discards everything computed before it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::data::DataFrame;
use crate::figure;
use crate::model::{Action, ActionKind, Binding, Component, ComponentKind, ControlState};
use crate::registry::Registry;
use crate::resolver::{Resolved, Resolver};
use crate::{BoxError, Result, TrellisError};

/// `component_id.property` -> new value
pub type OutputMap = BTreeMap<String, Value>;

type FrameMap = BTreeMap<String, Arc<DataFrame>>;

/// An interaction reported by the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiEvent {
    pub component_id: String,
    pub property: String,
    pub value: Value,
}

impl UiEvent {
    pub fn new(
        component_id: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Control selection change
    pub fn control(control_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(control_id, "value", value)
    }

    pub fn page_load(page_id: impl Into<String>) -> Self {
        Self::new(page_id, "load", Value::Null)
    }

    pub fn source(&self) -> Binding {
        Binding::new(self.component_id.clone(), self.property.clone())
    }
}

/// Dispatch state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Dispatched,
    /// Running the action at this chain position
    Resolving(usize),
    Aggregated,
}

impl Phase {
    pub fn can_advance_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Idle, Phase::Dispatched) => true,
            (Phase::Dispatched, Phase::Resolving(0)) => true,
            (Phase::Dispatched, Phase::Aggregated) => true,
            (Phase::Resolving(i), Phase::Resolving(j)) => j == i + 1,
            (Phase::Resolving(_), Phase::Aggregated) => true,
            // abort or completion
            (Phase::Dispatched | Phase::Resolving(_) | Phase::Aggregated, Phase::Idle) => true,
            _ => false,
        }
    }
}

struct ChainRun {
    phase: Phase,
    history: Vec<Phase>,
}

impl ChainRun {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        trace!(target: "executor", from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        self.history.push(next);
    }
}

/// Read-only view handed to every action of a chain
pub struct ActionContext<'a> {
    action: &'a Action,
    position: usize,
    event: &'a UiEvent,
    state: &'a ControlState,
    outputs: &'a OutputMap,
    frames: &'a FrameMap,
    registry: &'a Registry,
}

impl<'a> ActionContext<'a> {
    pub fn action_id(&self) -> &str {
        self.action.id()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn event(&self) -> &UiEvent {
        self.event
    }

    pub fn state(&self) -> &ControlState {
        self.state
    }

    /// Value of a declared input: a control selection, or the output of an
    /// earlier action in the chain (null if none was produced)
    pub fn input(&self, index: usize) -> Result<Value> {
        let binding = self.action.inputs().get(index).ok_or_else(|| {
            TrellisError::InvalidBinding(format!(
                "action `{}` has no input {}",
                self.action.id(),
                index
            ))
        })?;
        if self.registry.is_control(&binding.component_id) {
            let control = self.registry.control(&binding.component_id)?;
            return Ok(control
                .value_from(self.state.get(control.id()))?
                .to_json());
        }
        Ok(self
            .outputs
            .get(&binding.to_string())
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub fn inputs(&self) -> Result<Vec<Value>> {
        (0..self.action.inputs().len()).map(|i| self.input(i)).collect()
    }

    /// Output produced earlier in the same chain
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    /// Filtered frame of `target` as computed by an earlier action
    pub fn frame(&self, target: &str) -> Option<&Arc<DataFrame>> {
        self.frames.get(target)
    }

    /// Filtered frame of `target`, computing it if no earlier action did
    pub fn filtered(&self, target: &str) -> Result<Arc<DataFrame>> {
        if let Some(frame) = self.frames.get(target) {
            return Ok(Arc::clone(frame));
        }
        let component = self.registry.lookup(target)?;
        Resolver::new(self.registry).filtered_frame(&component, self.state)
    }

    pub fn data(&self, source: &str) -> Result<Arc<DataFrame>> {
        self.registry.get_data(source)
    }

    pub fn resolve(&self, target: &str) -> Result<Resolved> {
        Resolver::new(self.registry).resolve(target, self.state)
    }
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    failed: AtomicU64,
    empty_results: AtomicU64,
}

/// Executor statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStats {
    pub dispatched: u64,
    pub failed: u64,
    pub empty_results: u64,
}

/// Runs trigger chains against a frozen registry.
///
/// Holds no per-dispatch state, so one executor serves concurrent dispatches.
pub struct Executor {
    registry: Arc<Registry>,
    placeholder: String,
    counters: Counters,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            placeholder: "No data to display".to_string(),
            counters: Counters::default(),
        }
    }

    pub fn with_placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholder = text.into();
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            empty_results: self.counters.empty_results.load(Ordering::Relaxed),
        }
    }

    /// Run the chain bound to `event` and aggregate its outputs
    #[tracing::instrument(skip(self, event, state), fields(source = %event.source()))]
    pub fn dispatch(&self, event: &UiEvent, state: &ControlState) -> Result<OutputMap> {
        self.run(event, state, &mut ChainRun::new())
    }

    /// Like [`Executor::dispatch`], also returning the phases walked through
    pub fn dispatch_traced(
        &self,
        event: &UiEvent,
        state: &ControlState,
    ) -> (Result<OutputMap>, Vec<Phase>) {
        let mut run = ChainRun::new();
        let result = self.run(event, state, &mut run);
        (result, run.history)
    }

    /// Dispatch, turning a failure into error payloads routed to every
    /// output the chain declares
    pub fn render(&self, event: &UiEvent, state: &ControlState) -> OutputMap {
        match self.dispatch(event, state) {
            Ok(outputs) => outputs,
            Err(err) => self.error_payload(event, &err),
        }
    }

    pub fn error_payload(&self, event: &UiEvent, err: &TrellisError) -> OutputMap {
        let (action, position) = match err {
            TrellisError::ActionExecution {
                action_id,
                position,
                ..
            } => (Value::from(action_id.as_str()), Value::from(*position)),
            _ => (Value::Null, Value::Null),
        };
        let payload = json!({
            "error": { "action": action, "position": position, "message": err.to_string() }
        });
        let mut targets = self.declared_outputs(&event.source());
        if targets.is_empty() {
            targets.push(event.source());
        }
        targets
            .into_iter()
            .map(|b| (b.to_string(), payload.clone()))
            .collect()
    }

    /// Union of output bindings declared by the chain bound to `source`
    pub fn declared_outputs(&self, source: &Binding) -> Vec<Binding> {
        let mut out: Vec<Binding> = self
            .registry
            .trigger(source)
            .map(|t| {
                t.chain()
                    .iter()
                    .filter_map(|id| self.registry.action(id).ok())
                    .flat_map(|a| a.outputs().to_vec())
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out.dedup();
        out
    }

    fn run(&self, event: &UiEvent, state: &ControlState, run: &mut ChainRun) -> Result<OutputMap> {
        let started = Instant::now();
        run.advance(Phase::Dispatched);
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let result = self.run_chain(event, state, run);
        match &result {
            Ok(outputs) => {
                run.advance(Phase::Aggregated);
                debug!(
                    target: "executor",
                    outputs = outputs.len(),
                    elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "Chain aggregated"
                );
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        run.advance(Phase::Idle);
        result
    }

    fn run_chain(
        &self,
        event: &UiEvent,
        snapshot: &ControlState,
        run: &mut ChainRun,
    ) -> Result<OutputMap> {
        if !self.registry.contains(&event.component_id) {
            return Err(TrellisError::UnknownComponent(event.component_id.clone()));
        }

        // The triggering selection supersedes the snapshot entry
        let mut state = snapshot.clone();
        if self.registry.is_control(&event.component_id) && event.property == "value" {
            state.set(event.component_id.clone(), event.value.clone());
        }
        Resolver::new(&self.registry).validate_state(&state)?;

        let source = event.source();
        let Some(trigger) = self.registry.trigger(&source) else {
            debug!(target: "executor", source = %source, "No trigger bound to event");
            return Ok(OutputMap::new());
        };

        let mut outputs = OutputMap::new();
        let mut frames = FrameMap::new();
        for (position, action_id) in trigger.chain().iter().enumerate() {
            run.advance(Phase::Resolving(position));
            let produced = self
                .registry
                .action(action_id)
                .map_err(BoxError::from)
                .and_then(|action| {
                    self.execute(&action, position, event, &state, &outputs, &mut frames)
                });
            match produced {
                Ok(values) => {
                    for (binding, value) in values {
                        outputs.insert(binding.to_string(), value);
                    }
                }
                Err(err) => {
                    error!(
                        target: "executor",
                        action = %action_id,
                        position,
                        error = %err,
                        "Action failed; discarding chain outputs"
                    );
                    return Err(TrellisError::ActionExecution {
                        action_id: action_id.clone(),
                        position,
                        source: err,
                    });
                }
            }
        }
        info!(
            target: "executor",
            source = %source,
            actions = trigger.chain().len(),
            "Chain completed"
        );
        Ok(outputs)
    }

    fn execute(
        &self,
        action: &Action,
        position: usize,
        event: &UiEvent,
        state: &ControlState,
        outputs: &OutputMap,
        frames: &mut FrameMap,
    ) -> std::result::Result<Vec<(Binding, Value)>, BoxError> {
        debug!(
            target: "executor",
            action = %action.id(),
            kind = action.kind().label(),
            position,
            "Running action"
        );
        match action.kind() {
            ActionKind::Filter { control } | ActionKind::Parameter { control } => {
                let control = self.registry.control(control)?;
                let targets: Vec<String> = control
                    .target_components()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                self.recompute_all(&targets, state, frames)
            }
            ActionKind::PageLoad { page } => {
                let targets: Vec<String> = self
                    .registry
                    .components_on(page)?
                    .iter()
                    .filter(|c| c.is_data_bound())
                    .map(|c| c.id().to_string())
                    .collect();
                self.recompute_all(&targets, state, frames)
            }
            ActionKind::Export { targets } => {
                let sink = action.outputs().first().cloned().ok_or_else(|| {
                    TrellisError::InvalidBinding(format!(
                        "export action `{}` declares no download output",
                        action.id()
                    ))
                })?;
                let resolver = Resolver::new(&self.registry);
                let mut files = Vec::with_capacity(targets.len());
                for target in targets {
                    let frame = match frames.get(target) {
                        Some(frame) => Arc::clone(frame),
                        None => {
                            let component = self.registry.lookup(target)?;
                            resolver.filtered_frame(&component, state)?
                        }
                    };
                    files.push(json!({
                        "filename": format!("{}.csv", target),
                        "content": frame.to_csv_string()?,
                    }));
                }
                Ok(vec![(sink, json!({ "files": files }))])
            }
            ActionKind::Custom(f) => {
                let ctx = ActionContext {
                    action,
                    position,
                    event,
                    state,
                    outputs,
                    frames,
                    registry: &self.registry,
                };
                let values = f(&ctx)?;
                if values.len() != action.outputs().len() {
                    return Err(format!(
                        "returned {} values for {} declared outputs",
                        values.len(),
                        action.outputs().len()
                    )
                    .into());
                }
                Ok(action.outputs().iter().cloned().zip(values).collect())
            }
        }
    }

    // Independent targets; computed in id order for reproducible logs
    fn recompute_all(
        &self,
        targets: &[String],
        state: &ControlState,
        frames: &mut FrameMap,
    ) -> std::result::Result<Vec<(Binding, Value)>, BoxError> {
        let resolver = Resolver::new(&self.registry);
        let mut sorted: Vec<&String> = targets.iter().collect();
        sorted.sort();
        let mut produced = Vec::with_capacity(sorted.len());
        for target in sorted {
            let component = self.registry.lookup(target)?;
            let resolved = resolver.resolve(target, state)?;
            frames.insert(target.clone(), Arc::clone(resolved.frame()));
            let value = match resolved {
                Resolved::Ready { value, .. } => value,
                Resolved::Empty { .. } => {
                    self.counters.empty_results.fetch_add(1, Ordering::Relaxed);
                    self.placeholder_for(&component)
                }
            };
            produced.push((component.output_binding(), value));
        }
        Ok(produced)
    }

    fn placeholder_for(&self, component: &Component) -> Value {
        match component.kind() {
            ComponentKind::Graph { .. } => figure::placeholder_figure(&self.placeholder),
            ComponentKind::Table { .. } => {
                json!({ "columns": [], "rows": [], "placeholder": self.placeholder })
            }
            ComponentKind::Card { .. } | ComponentKind::Download => {
                Value::String(self.placeholder.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions_follow_chain_order() {
        assert!(Phase::Idle.can_advance_to(Phase::Dispatched));
        assert!(Phase::Dispatched.can_advance_to(Phase::Resolving(0)));
        assert!(Phase::Resolving(0).can_advance_to(Phase::Resolving(1)));
        assert!(!Phase::Resolving(0).can_advance_to(Phase::Resolving(2)));
        assert!(!Phase::Dispatched.can_advance_to(Phase::Resolving(1)));
        assert!(Phase::Resolving(3).can_advance_to(Phase::Aggregated));
        assert!(Phase::Resolving(1).can_advance_to(Phase::Idle));
        assert!(!Phase::Idle.can_advance_to(Phase::Aggregated));
        assert!(!Phase::Aggregated.can_advance_to(Phase::Resolving(0)));
    }
}
