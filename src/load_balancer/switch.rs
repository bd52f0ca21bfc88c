//! Routing weight and freeze switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::config::RouterConfig;
use crate::health::discovery::EndpointCache;
use crate::observability::metrics;

/// Provider position in the router. Slot B is chosen with probability `weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Process-wide routing state, shared by handle between routers and providers.
#[derive(Debug)]
pub struct RouterState {
    weight: Mutex<f64>,
    frozen: AtomicBool,
    step: f64,
    endpoints: EndpointCache,
}

impl RouterState {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            weight: Mutex::new(config.initial_weight.clamp(0.0, 1.0)),
            frozen: AtomicBool::new(config.frozen),
            step: config.step,
            endpoints: EndpointCache::new(),
        }
    }

    pub fn endpoints(&self) -> &EndpointCache {
        &self.endpoints
    }

    pub fn weight(&self) -> f64 {
        *self.weight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Values outside `[0, 1]` are ignored. Returns whether the weight changed.
    pub fn set_weight(&self, weight: f64) -> bool {
        if !(0.0..=1.0).contains(&weight) {
            tracing::warn!(weight, "Ignoring routing weight outside [0, 1]");
            return false;
        }
        *self.weight.lock().unwrap_or_else(|e| e.into_inner()) = weight;
        metrics::record_router_weight(weight);
        true
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Relaxed)
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::Relaxed);
        tracing::info!(frozen, "Routing weight freeze changed");
    }

    /// Slot for a roll in `[0, 1)`: B when `roll <= weight`.
    pub fn pick(&self, roll: f64) -> Slot {
        if roll <= self.weight() {
            Slot::B
        } else {
            Slot::A
        }
    }

    pub fn choose(&self) -> Slot {
        self.pick(rand::random::<f64>())
    }

    /// Shift the weight one step toward `slot`, clamped, unless frozen.
    pub fn reward(&self, slot: Slot) {
        if self.is_frozen() {
            return;
        }
        let mut weight = self.weight.lock().unwrap_or_else(|e| e.into_inner());
        let next = match slot {
            Slot::A => *weight - self.step,
            Slot::B => *weight + self.step,
        }
        .clamp(0.0, 1.0);
        if next != *weight {
            tracing::debug!(from = *weight, to = next, toward = ?slot, "Routing weight nudged");
            *weight = next;
            metrics::record_router_weight(next);
        }
    }
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}
