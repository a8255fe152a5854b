//! Dashboard models: components, controls, actions, triggers and pages.

mod action;
mod component;
mod control;
mod page;
mod state;

pub use action::{Action, ActionFn, ActionKind, Binding, Trigger};
pub use component::{Component, ComponentKind};
pub use control::{Control, ControlKind, ControlValue, Selector};
pub use page::Page;
pub use state::ControlState;
