use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::store::ResponseStore;
use crate::strategies::StrategyRegistry;

/// Source of the current time, passed in rather than read globally
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Dependencies shared by the orchestrator and every stage handler
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn ResponseStore>,
    pub clock: Arc<dyn Clock>,
    pub strategies: Arc<StrategyRegistry>,
}

impl PipelineContext {
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            strategies: Arc::new(StrategyRegistry::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
