//! Tabular data layer: typed cells, columnar frames, filter masks and the
//! lazily populated data-source cache.

mod frame;
mod manager;
mod predicate;
mod scalar;

pub use frame::{Column, DataFrame, Mask};
pub use manager::{DataManager, Loader};
pub use predicate::Predicate;
pub use scalar::Scalar;
