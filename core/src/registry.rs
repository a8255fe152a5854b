use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{DataFrame, DataManager};
use crate::model::{Action, Binding, Component, Control, Page, Trigger};
use crate::{BoxError, Result, TrellisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelKind {
    Component,
    Control,
    Action,
    Page,
}

/// Lookup tables for every model of a dashboard plus its data sources.
///
/// Built once, then frozen. Registrations after [`Registry::freeze`] still go
/// through but are reported with a warning. All ids share one namespace.
#[derive(Debug, Default)]
pub struct Registry {
    ids: DashMap<String, ModelKind>,
    components: DashMap<String, Arc<Component>>,
    controls: DashMap<String, Arc<Control>>,
    actions: DashMap<String, Arc<Action>>,
    pages: DashMap<String, Arc<Page>>,
    triggers: DashMap<Binding, Arc<Trigger>>,
    data: DataManager,
    frozen: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
        info!(
            target: "registry",
            components = self.components.len(),
            controls = self.controls.len(),
            actions = self.actions.len(),
            triggers = self.triggers.len(),
            "Registry frozen"
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    fn note_mutation(&self, what: &str, id: &str) {
        if self.is_frozen() {
            warn!(target: "registry", kind = what, id = %id, "Registry mutated after freeze");
        }
    }

    fn claim(&self, id: &str, kind: ModelKind) -> Result<()> {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(_) => Err(TrellisError::DuplicateId(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(kind);
                Ok(())
            }
        }
    }

    /// Whether any model uses `id`
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn register(&self, component: Component) -> Result<Arc<Component>> {
        self.register_arc(Arc::new(component))
    }

    pub fn register_arc(&self, component: Arc<Component>) -> Result<Arc<Component>> {
        let id = component.id().to_string();
        self.note_mutation("component", &id);
        self.claim(&id, ModelKind::Component)?;
        debug!(
            target: "registry",
            component = %id,
            property = component.output_property(),
            "Registering component"
        );
        self.components.insert(id, Arc::clone(&component));
        Ok(component)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<Component>> {
        self.components
            .get(id)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| TrellisError::UnknownComponent(id.to_string()))
    }

    pub fn components(&self) -> Vec<Arc<Component>> {
        let mut all: Vec<Arc<Component>> =
            self.components.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn register_control(&self, control: Control) -> Result<Arc<Control>> {
        let id = control.id().to_string();
        self.note_mutation("control", &id);
        self.claim(&id, ModelKind::Control)?;
        debug!(target: "registry", control = %id, "Registering control");
        let control = Arc::new(control);
        self.controls.insert(id, Arc::clone(&control));
        Ok(control)
    }

    pub fn control(&self, id: &str) -> Result<Arc<Control>> {
        self.controls
            .get(id)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| TrellisError::UnknownControl(id.to_string()))
    }

    pub fn is_control(&self, id: &str) -> bool {
        self.controls.contains_key(id)
    }

    /// All controls ordered by id
    pub fn controls(&self) -> Vec<Arc<Control>> {
        let mut all: Vec<Arc<Control>> =
            self.controls.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn register_action(&self, action: Action) -> Result<Arc<Action>> {
        let id = action.id().to_string();
        self.note_mutation("action", &id);
        self.claim(&id, ModelKind::Action)?;
        debug!(
            target: "registry",
            action = %id,
            kind = action.kind().label(),
            "Registering action"
        );
        let action = Arc::new(action);
        self.actions.insert(id, Arc::clone(&action));
        Ok(action)
    }

    pub fn action(&self, id: &str) -> Result<Arc<Action>> {
        self.actions
            .get(id)
            .map(|a| Arc::clone(a.value()))
            .ok_or_else(|| TrellisError::UnknownAction(id.to_string()))
    }

    pub fn register_page(&self, page: Page) -> Result<Arc<Page>> {
        let id = page.id().to_string();
        self.note_mutation("page", &id);
        self.claim(&id, ModelKind::Page)?;
        let page = Arc::new(page);
        self.pages.insert(id, Arc::clone(&page));
        Ok(page)
    }

    pub fn page(&self, id: &str) -> Result<Arc<Page>> {
        self.pages
            .get(id)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| TrellisError::UnknownPage(id.to_string()))
    }

    pub fn is_page(&self, id: &str) -> bool {
        self.pages.contains_key(id)
    }

    /// Page owning a component or control
    pub fn page_of(&self, id: &str) -> Option<Arc<Page>> {
        self.pages
            .iter()
            .find(|p| p.value().contains(id))
            .map(|p| Arc::clone(p.value()))
    }

    /// Components of `page` in declaration order
    pub fn components_on(&self, page: &str) -> Result<Vec<Arc<Component>>> {
        self.page(page)?
            .components()
            .iter()
            .map(|id| self.lookup(id))
            .collect()
    }

    /// One trigger per originating binding
    pub fn register_trigger(&self, trigger: Trigger) -> Result<Arc<Trigger>> {
        let source = trigger.source().clone();
        self.note_mutation("trigger", &source.to_string());
        let trigger = Arc::new(trigger);
        match self.triggers.entry(source.clone()) {
            Entry::Occupied(_) => Err(TrellisError::DuplicateTrigger(source.to_string())),
            Entry::Vacant(slot) => {
                debug!(
                    target: "registry",
                    source = %source,
                    chain = ?trigger.chain(),
                    "Registering trigger"
                );
                slot.insert(Arc::clone(&trigger));
                Ok(trigger)
            }
        }
    }

    pub fn trigger(&self, source: &Binding) -> Option<Arc<Trigger>> {
        self.triggers.get(source).map(|t| Arc::clone(t.value()))
    }

    pub fn triggers(&self) -> Vec<Arc<Trigger>> {
        let mut all: Vec<Arc<Trigger>> =
            self.triggers.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.source().cmp(b.source()));
        all
    }

    pub fn register_data<F>(&self, name: impl Into<String>, loader: F)
    where
        F: Fn() -> std::result::Result<DataFrame, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.note_mutation("data_source", &name);
        self.data.register(name, loader);
    }

    pub fn register_frame(&self, name: impl Into<String>, frame: DataFrame) {
        let name = name.into();
        self.note_mutation("data_source", &name);
        self.data.register_frame(name, frame);
    }

    pub fn get_data(&self, name: &str) -> Result<Arc<DataFrame>> {
        self.data.get(name)
    }

    pub fn reload_data(&self, name: &str) -> Result<()> {
        self.data.reload(name)
    }

    pub fn data(&self) -> &DataManager {
        &self.data
    }
}
