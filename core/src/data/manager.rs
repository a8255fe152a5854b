use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::frame::DataFrame;
use crate::{BoxError, Result, TrellisError};

/// Idempotent, side-effect free producer of a data source
pub type Loader = Arc<dyn Fn() -> std::result::Result<DataFrame, BoxError> + Send + Sync>;

struct Entry {
    loader: Loader,
    // replaced on reload; in-flight populations finish on the old cell
    cell: Arc<OnceCell<Arc<DataFrame>>>,
    loads: Arc<AtomicUsize>,
}

/// Named data sources, loaded on first use and cached by exact name.
///
/// The first caller of [`DataManager::get`] runs the loader; concurrent callers
/// for the same name block until that population finishes.
#[derive(Default)]
pub struct DataManager {
    sources: DashMap<String, Entry>,
}

impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lazily invoked loader; a later registration under the same
    /// name replaces the previous loader and drops its cached frame
    pub fn register<F>(&self, name: impl Into<String>, loader: F)
    where
        F: Fn() -> std::result::Result<DataFrame, BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        info!(target: "data_manager", source = %name, "Registering data source");
        self.sources.insert(
            name,
            Entry {
                loader: Arc::new(loader),
                cell: Arc::new(OnceCell::new()),
                loads: Arc::new(AtomicUsize::new(0)),
            },
        );
    }

    /// Register an already materialised frame
    pub fn register_frame(&self, name: impl Into<String>, frame: DataFrame) {
        let name = name.into();
        info!(
            target: "data_manager",
            source = %name,
            rows = frame.num_rows(),
            "Registering static data source"
        );
        let frame = Arc::new(frame);
        let for_loader = Arc::clone(&frame);
        self.sources.insert(
            name,
            Entry {
                loader: Arc::new(move || Ok(DataFrame::clone(&for_loader))),
                cell: Arc::new(OnceCell::with_value(frame)),
                loads: Arc::new(AtomicUsize::new(0)),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Fetch a data source, running its loader if nothing is cached yet
    pub fn get(&self, name: &str) -> Result<Arc<DataFrame>> {
        // Clone handles out so no map shard lock is held while loading
        let (loader, cell, loads) = {
            let entry = self
                .sources
                .get(name)
                .ok_or_else(|| TrellisError::UnknownDataSource(name.to_string()))?;
            (
                Arc::clone(&entry.loader),
                Arc::clone(&entry.cell),
                Arc::clone(&entry.loads),
            )
        };

        let frame = cell.get_or_try_init(|| {
            debug!(target: "data_manager", source = %name, "Loading data source");
            loads.fetch_add(1, Ordering::SeqCst);
            loader()
                .map(Arc::new)
                .map_err(|e| TrellisError::DataLoad {
                    name: name.to_string(),
                    message: e.to_string(),
                })
        })?;
        Ok(Arc::clone(frame))
    }

    /// Drop the cached frame; the next `get` runs the loader again
    pub fn reload(&self, name: &str) -> Result<()> {
        let mut entry = self
            .sources
            .get_mut(name)
            .ok_or_else(|| TrellisError::UnknownDataSource(name.to_string()))?;
        entry.cell = Arc::new(OnceCell::new());
        info!(target: "data_manager", source = %name, "Data source cache invalidated");
        Ok(())
    }

    /// Number of times the loader for `name` has run
    pub fn load_count(&self, name: &str) -> usize {
        self.sources
            .get(name)
            .map(|e| e.loads.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("sources", &self.names())
            .finish()
    }
}
