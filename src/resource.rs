//! Live-resource accounting.
//!
//! Every generator and timer the engine creates holds a [`ResourceGuard`].
//! Dropping the owner releases the guard, so a torn-down graph can be
//! verified to hold nothing by reading the probe.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What kind of resource a guard accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Noise loops, oscillators, file players and transient voices.
    Generator,
    /// Recurring triggers (transient schedulers).
    Timer,
}

#[derive(Debug, Default)]
struct Counts {
    generators: AtomicUsize,
    timers: AtomicUsize,
}

impl Counts {
    fn slot(&self, kind: ResourceKind) -> &AtomicUsize {
        match kind {
            ResourceKind::Generator => &self.generators,
            ResourceKind::Timer => &self.timers,
        }
    }
}

/// Shared counter of live resources. Cloning shares the same counts.
#[derive(Debug, Clone, Default)]
pub struct ResourceProbe {
    counts: Arc<Counts>,
}

impl ResourceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one live resource; it stays counted until the guard drops.
    pub fn acquire(&self, kind: ResourceKind) -> ResourceGuard {
        self.counts.slot(kind).fetch_add(1, Ordering::AcqRel);
        ResourceGuard {
            probe: self.clone(),
            kind,
        }
    }

    /// Number of live resources of the given kind.
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.counts.slot(kind).load(Ordering::Acquire)
    }

    /// Live generators plus live timers.
    pub fn total(&self) -> usize {
        self.live(ResourceKind::Generator) + self.live(ResourceKind::Timer)
    }
}

/// RAII token for one live resource.
#[derive(Debug)]
pub struct ResourceGuard {
    probe: ResourceProbe,
    kind: ResourceKind,
}

impl ResourceGuard {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.probe.counts.slot(self.kind).fetch_sub(1, Ordering::AcqRel);
    }
}
