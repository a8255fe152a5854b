// Concurrent dispatch front door
//
// Each event runs on the blocking pool. Events for the same originating
// binding are numbered; a result that completes after a newer event for the
// same binding was submitted is delivered as stale. Nothing is cancelled.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::executor::{Executor, OutputMap, UiEvent};
use crate::model::{Binding, ControlState};
use crate::{Result, TrellisError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Fresh,
    /// A newer event for the same source was submitted while this one ran
    Stale { superseded_by: u64 },
}

/// Result of one dispatch as seen by the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub source: Binding,
    pub generation: u64,
    pub freshness: Freshness,
    pub outputs: OutputMap,
    pub error: Option<String>,
}

impl Delivery {
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

pub struct Dispatcher {
    executor: Arc<Executor>,
    generations: DashMap<Binding, Arc<AtomicU64>>,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(executor: Arc<Executor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            generations: DashMap::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    fn counter(&self, source: &Binding) -> Arc<AtomicU64> {
        Arc::clone(
            self.generations
                .entry(source.clone())
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .value(),
        )
    }

    /// Latest generation handed out for `source`
    pub fn latest_generation(&self, source: &Binding) -> u64 {
        self.generations
            .get(source)
            .map(|g| g.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Run the chain for `event`; failures come back as error payloads in
    /// `outputs` with `error` set
    pub async fn submit(&self, event: UiEvent, state: ControlState) -> Result<Delivery> {
        let source = event.source();
        let counter = self.counter(&source);
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| TrellisError::Dispatch(e.to_string()))?;

        let executor = Arc::clone(&self.executor);
        let (outputs, error) = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match executor.dispatch(&event, &state) {
                Ok(outputs) => (outputs, None),
                Err(err) => (executor.error_payload(&event, &err), Some(err.to_string())),
            }
        })
        .await
        .map_err(|e| TrellisError::Dispatch(e.to_string()))?;

        let latest = counter.load(Ordering::SeqCst);
        let freshness = if latest == generation {
            Freshness::Fresh
        } else {
            debug!(target: "dispatcher", source = %source, generation, latest, "Result superseded");
            Freshness::Stale {
                superseded_by: latest,
            }
        };

        Ok(Delivery {
            source,
            generation,
            freshness,
            outputs,
            error,
        })
    }
}

/// Last rendered value of every output, as the UI layer would hold it.
///
/// Deliveries are applied in completion order: when two chains write the same
/// output, the one applied last wins. Overwrites across sources are logged.
#[derive(Debug, Default)]
pub struct ViewState {
    values: DashMap<String, (Value, Binding)>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fresh delivery; stale ones are dropped. Returns the number of
    /// outputs written.
    pub fn apply(&self, delivery: &Delivery) -> usize {
        if !delivery.is_fresh() {
            debug!(
                target: "view_state",
                source = %delivery.source,
                generation = delivery.generation,
                "Dropping stale delivery"
            );
            return 0;
        }
        for (key, value) in &delivery.outputs {
            let previous = self
                .values
                .insert(key.clone(), (value.clone(), delivery.source.clone()));
            if let Some((_, writer)) = previous {
                if writer != delivery.source {
                    warn!(
                        target: "view_state",
                        output = %key,
                        previous = %writer,
                        current = %delivery.source,
                        "Output overwritten by a different trigger"
                    );
                }
            }
        }
        delivery.outputs.len()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|e| e.value().0.clone())
    }

    /// Source of the delivery that last wrote `key`
    pub fn writer(&self, key: &str) -> Option<Binding> {
        self.values.get(key).map(|e| e.value().1.clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
