//! Dashboard assembly.
//!
//! The builder registers pages, components and controls, derives one built-in
//! action and trigger per control and per page, checks every binding, and
//! freezes the result into an immutable [`Dashboard`].

use std::sync::Arc;
use tracing::info;

use crate::config::EngineConfig;
use crate::data::{DataFrame, Loader, Scalar};
use crate::executor::Executor;
use crate::model::{
    Action, ActionKind, Binding, Component, ComponentKind, Control, ControlKind, Page, Trigger,
};
use crate::registry::Registry;
use crate::{BoxError, Result, TrellisError};

/// Declarative page definition
#[derive(Debug, Clone)]
pub struct PageSpec {
    id: String,
    title: String,
    components: Vec<Component>,
    controls: Vec<Control>,
}

impl PageSpec {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            components: Vec::new(),
            controls: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }
}

enum DataSpec {
    Frame(DataFrame),
    Loader(Loader),
}

/// Collects the dashboard definition; see [`DashboardBuilder::build`]
#[derive(Default)]
pub struct DashboardBuilder {
    pages: Vec<PageSpec>,
    data: Vec<(String, DataSpec)>,
    actions: Vec<(Binding, Action)>,
}

impl DashboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_frame(mut self, name: impl Into<String>, frame: DataFrame) -> Self {
        self.data.push((name.into(), DataSpec::Frame(frame)));
        self
    }

    pub fn data_source<F>(mut self, name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> std::result::Result<DataFrame, BoxError> + Send + Sync + 'static,
    {
        self.data.push((name.into(), DataSpec::Loader(Arc::new(loader))));
        self
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    /// Append `action` to the chain run when `source` fires. Built-in actions
    /// of a control or page run before any action added here.
    pub fn on(mut self, source: Binding, action: Action) -> Self {
        self.actions.push((source, action));
        self
    }

    pub fn build(self) -> Result<Dashboard> {
        let registry = Registry::new();
        let mut chains: Vec<(Binding, Vec<String>)> = Vec::new();

        for (name, spec) in self.data {
            match spec {
                DataSpec::Frame(frame) => registry.register_frame(name, frame),
                DataSpec::Loader(loader) => registry.register_data(name, move || loader()),
            }
        }

        for page in self.pages {
            build_page(&registry, page, &mut chains)?;
        }

        for (source, action) in self.actions {
            validate_action(&registry, &source, &action)?;
            let action = registry.register_action(action)?;
            push_chain(&mut chains, source, action.id());
        }

        for (source, chain) in chains {
            registry.register_trigger(Trigger::new(source, chain))?;
        }
        registry.freeze();
        info!(target: "builder", "Dashboard built");

        Ok(Dashboard {
            registry: Arc::new(registry),
        })
    }
}

/// Immutable, shareable dashboard configuration
#[derive(Debug, Clone)]
pub struct Dashboard {
    registry: Arc<Registry>,
}

impl Dashboard {
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::new()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn executor(&self) -> Executor {
        Executor::new(Arc::clone(&self.registry))
    }

    pub fn executor_with(&self, config: &EngineConfig) -> Executor {
        self.executor().with_placeholder(config.placeholder_text.clone())
    }
}

fn push_chain(chains: &mut Vec<(Binding, Vec<String>)>, source: Binding, action_id: &str) {
    match chains.iter_mut().find(|(s, _)| *s == source) {
        Some((_, chain)) => chain.push(action_id.to_string()),
        None => chains.push((source, vec![action_id.to_string()])),
    }
}

fn build_page(
    registry: &Registry,
    page: PageSpec,
    chains: &mut Vec<(Binding, Vec<String>)>,
) -> Result<()> {
    let component_ids: Vec<String> = page.components.iter().map(|c| c.id().to_string()).collect();
    let control_ids: Vec<String> = page.controls.iter().map(|c| c.id().to_string()).collect();

    for component in page.components {
        registry.register(component)?;
    }
    registry.register_page(Page::new(
        page.id.clone(),
        page.title,
        component_ids.clone(),
        control_ids,
    ))?;

    for control in page.controls {
        let control = finalize_control(registry, &component_ids, control)?;
        let control = registry.register_control(control)?;
        let (label, kind) = match control.kind() {
            ControlKind::Filter { .. } => (
                "filter",
                ActionKind::Filter {
                    control: control.id().to_string(),
                },
            ),
            ControlKind::Parameter => (
                "parameter",
                ActionKind::Parameter {
                    control: control.id().to_string(),
                },
            ),
        };
        let source = Binding::new(control.id(), "value");
        let mut action =
            Action::new(format!("{}_action_{}", label, control.id()), kind).input(source.clone());
        for target in control.target_components() {
            action = action.output(registry.lookup(target)?.output_binding());
        }
        let action = registry.register_action(action)?;
        push_chain(chains, source, action.id());
    }

    let mut on_load = Action::new(
        format!("on_page_load_{}", page.id),
        ActionKind::PageLoad {
            page: page.id.clone(),
        },
    );
    for component in registry.components_on(&page.id)? {
        if component.is_data_bound() {
            on_load = on_load.output(component.output_binding());
        }
    }
    let on_load = registry.register_action(on_load)?;
    push_chain(chains, Binding::new(page.id, "load"), on_load.id());
    Ok(())
}

/// Resolve implied targets, check the bindings of a control and derive
/// missing selector options from data
fn finalize_control(
    registry: &Registry,
    page_components: &[String],
    control: Control,
) -> Result<Control> {
    match control.kind().clone() {
        ControlKind::Filter { column } => {
            let targets: Vec<String> = if control.targets().is_empty() {
                let mut implied = Vec::new();
                for id in page_components {
                    let component = registry.lookup(id)?;
                    if let Some(source) = component.data_source() {
                        if registry.get_data(source)?.has_column(&column) {
                            implied.push(id.clone());
                        }
                    }
                }
                if implied.is_empty() {
                    return Err(TrellisError::InvalidBinding(format!(
                        "filter `{}`: column `{}` not found in any component on its page",
                        control.id(),
                        column
                    )));
                }
                implied
            } else {
                control.targets().to_vec()
            };

            let mut values: Vec<Scalar> = Vec::new();
            for target in &targets {
                if !page_components.contains(target) {
                    return Err(TrellisError::InvalidBinding(format!(
                        "filter `{}` targets `{}` outside its page",
                        control.id(),
                        target
                    )));
                }
                let component = registry.lookup(target)?;
                let source = component.data_source().ok_or_else(|| {
                    TrellisError::InvalidBinding(format!(
                        "filter `{}` targets `{}` which is not backed by data",
                        control.id(),
                        target
                    ))
                })?;
                let frame = registry.get_data(source)?;
                let col = frame.column(&column).ok_or_else(|| TrellisError::ColumnNotFound {
                    target: target.clone(),
                    column: column.clone(),
                })?;
                if control.selector().is_numeric()
                    && !col.values().iter().all(|v| v.is_null() || v.is_numeric())
                {
                    return Err(TrellisError::InvalidBinding(format!(
                        "filter `{}` uses a numeric selector on non-numeric column `{}`",
                        control.id(),
                        column
                    )));
                }
                for v in col.unique() {
                    if !values.contains(&v) {
                        values.push(v);
                    }
                }
            }
            values.sort_by(|a, b| a.total_cmp(b));

            let selector = control.selector().clone().fill_from(&values);
            Ok(control.with_targets(targets).with_selector(selector))
        }
        ControlKind::Parameter => {
            if control.targets().is_empty() {
                return Err(TrellisError::InvalidBinding(format!(
                    "parameter `{}` has no targets",
                    control.id()
                )));
            }
            for target in control.targets() {
                let binding = Binding::parse(target)?;
                if !page_components.contains(&binding.component_id) {
                    return Err(TrellisError::InvalidBinding(format!(
                        "parameter `{}` targets `{}` outside its page",
                        control.id(),
                        binding.component_id
                    )));
                }
                let component = registry.lookup(&binding.component_id)?;
                let accepts = component
                    .figure()
                    .map(|f| f.accepts(&binding.property))
                    .unwrap_or(false);
                if !accepts {
                    return Err(TrellisError::InvalidBinding(format!(
                        "parameter `{}`: `{}` takes no argument `{}`",
                        control.id(),
                        binding.component_id,
                        binding.property
                    )));
                }
            }
            let selector = control.selector();
            if (selector.is_categorical() || selector.is_numeric())
                && selector.needs_data_defaults()
            {
                return Err(TrellisError::InvalidBinding(format!(
                    "parameter `{}` needs explicit options or bounds",
                    control.id()
                )));
            }
            Ok(control)
        }
    }
}

fn validate_action(registry: &Registry, source: &Binding, action: &Action) -> Result<()> {
    if !registry.contains(&source.component_id) {
        return Err(TrellisError::UnknownComponent(source.component_id.clone()));
    }
    for output in action.outputs() {
        registry.lookup(&output.component_id)?;
    }
    for input in action.inputs() {
        if registry.is_control(&input.component_id) {
            if input.property != "value" {
                return Err(TrellisError::InvalidBinding(format!(
                    "action `{}`: control input `{}` must read `value`",
                    action.id(),
                    input
                )));
            }
            continue;
        }
        let component = registry.lookup(&input.component_id)?;
        if component.output_property() != input.property {
            return Err(TrellisError::InvalidBinding(format!(
                "action `{}`: `{}` exposes `{}`, not `{}`",
                action.id(),
                input.component_id,
                component.output_property(),
                input.property
            )));
        }
    }
    if let ActionKind::Export { targets } = action.kind() {
        for output in action.outputs() {
            if !matches!(registry.lookup(&output.component_id)?.kind(), ComponentKind::Download) {
                return Err(TrellisError::InvalidBinding(format!(
                    "export action `{}` must write to a download component, not `{}`",
                    action.id(),
                    output.component_id
                )));
            }
        }
        for target in targets {
            if !registry.lookup(target)?.is_data_bound() {
                return Err(TrellisError::InvalidBinding(format!(
                    "export action `{}` targets `{}` which is not backed by data",
                    action.id(),
                    target
                )));
            }
        }
    }
    Ok(())
}
