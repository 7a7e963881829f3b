//! Per-key gate collapsing concurrent identical analyses
//!
//! The first caller for a key runs the pipeline; later callers wait on the
//! same gate and re-read the cache once it opens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct SingleFlight {
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other caller holds `key`, then holds it until the guard drops
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(|p| p.into_inner());
            gates
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = gate.lock_owned().await;
        FlightGuard {
            flight: self,
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Keys currently held or waited on
    pub fn in_flight(&self) -> usize {
        self.gates.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut gates = self.flight.gates.lock().unwrap_or_else(|p| p.into_inner());
        // the map and this guard hold the only references when nobody waits
        if gates
            .get(&self.key)
            .is_some_and(|gate| Arc::strong_count(gate) <= 2)
        {
            gates.remove(&self.key);
        }
    }
}
