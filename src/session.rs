//! Shared engine handle
//!
//! Serializes tick processing and display reads through one lock so a
//! snapshot never observes a half-applied tick.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::engine::{GridEngine, ProcessOutcome, Snapshot};
use crate::error::GridResult;

#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<GridEngine>>,
}

impl SharedEngine {
    pub fn new(engine: GridEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GridEngine> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Engine lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record and evaluate one tick, returning the fills and the state after it
    pub fn advance(&self, price: f64) -> GridResult<(ProcessOutcome, Snapshot)> {
        let mut engine = self.lock();
        let outcome = engine.tick(price)?;
        Ok((outcome, engine.snapshot()))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut GridEngine) -> R) -> R {
        let mut engine = self.lock();
        f(&mut engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, GridConfig};
    use std::thread;

    fn shared() -> SharedEngine {
        let grid = GridConfig {
            grid_count: 5,
            range_min: 100.0,
            range_max: 140.0,
            leverage: 1,
            qty_per_level: 1.0,
            ..GridConfig::default()
        };
        let engine = EngineConfig {
            initial_price: 125.0,
            ..EngineConfig::default()
        };
        SharedEngine::new(GridEngine::new(grid, engine).unwrap())
    }

    #[test]
    fn test_advance_returns_post_tick_snapshot() {
        let session = shared();
        session.with(|e| e.start()).unwrap();
        let (outcome, snap) = session.advance(115.0).unwrap();
        assert_eq!(outcome.opened.len(), 1);
        assert_eq!(snap.price, 115.0);
        assert_eq!(snap.open_positions.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_consistent_state() {
        let session = shared();
        session.with(|e| e.start()).unwrap();

        let writer = {
            let session = session.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let price = if i % 2 == 0 { 105.0 } else { 135.0 };
                    session.advance(price).unwrap();
                }
            })
        };
        let reader = {
            let session = session.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let snap = session.snapshot();
                    let identity =
                        snap.margin + snap.realized_pnl.to_f64() + snap.unrealized_pnl;
                    assert_eq!(snap.equity, identity);
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert!(session.snapshot().fill_count > 0);
    }
}
