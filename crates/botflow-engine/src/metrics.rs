use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Failure counters kept by the engine. Exporting them is left to the host.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    template_failures: AtomicU64,
    security_violations: AtomicU64,
    action_failures: AtomicU64,
    rate_limited: AtomicU64,
    stale_callbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub template_failures: u64,
    pub security_violations: u64,
    pub action_failures: u64,
    pub rate_limited: u64,
    pub stale_callbacks: u64,
}

impl EngineMetrics {
    pub fn template_failure(&self) {
        self.template_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn security_violation(&self) {
        self.security_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn action_failure(&self) {
        self.action_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_callback(&self) {
        self.stale_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            template_failures: self.template_failures.load(Ordering::Relaxed),
            security_violations: self.security_violations.load(Ordering::Relaxed),
            action_failures: self.action_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            stale_callbacks: self.stale_callbacks.load(Ordering::Relaxed),
        }
    }
}
