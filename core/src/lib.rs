// Trellis Core Library
// Declarative dashboard action engine

pub mod builder;
pub mod config;
pub mod data;
pub mod dispatcher;
pub mod executor;
pub mod figure;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod telemetry;

// Export core types
pub use builder::{Dashboard, DashboardBuilder, PageSpec};
pub use config::EngineConfig;
pub use data::{Column, DataFrame, DataManager, Mask, Predicate, Scalar};
pub use dispatcher::{Delivery, Dispatcher, Freshness, ViewState};
pub use executor::{ActionContext, Executor, ExecutorStats, OutputMap, Phase, UiEvent};
pub use figure::{FigureFn, Kwargs};
pub use model::{
    Action, ActionFn, ActionKind, Binding, Component, ComponentKind, Control, ControlKind,
    ControlState, ControlValue, Page, Selector, Trigger,
};
pub use registry::Registry;
pub use resolver::{Resolved, Resolver};

// Error types
use thiserror::Error;

/// Error type returned by user supplied action functions and data loaders
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Duplicate trigger: {0}")]
    DuplicateTrigger(String),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Unknown control: {0}")]
    UnknownControl(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown page: {0}")]
    UnknownPage(String),

    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    #[error("Column `{column}` not found in data of `{target}`")]
    ColumnNotFound { target: String, column: String },

    #[error("Invalid binding: {0}")]
    InvalidBinding(String),

    #[error("Invalid value for control `{control}`: {reason}")]
    InvalidControlValue { control: String, reason: String },

    #[error("Invalid data frame: {0}")]
    InvalidFrame(String),

    #[error("Failed to load data source `{name}`: {message}")]
    DataLoad { name: String, message: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Action `{action_id}` at position {position} failed: {source}")]
    ActionExecution {
        action_id: String,
        position: usize,
        #[source]
        source: BoxError,
    },

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
