use std::sync::Arc;
use std::time::Duration;

use botflow_spec::RateLimitScope;
use tracing::{debug, warn};

use crate::context::Caller;
use crate::store::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Blocked { retry_in: u64 },
}

/// Fixed-window limiter over a [`CounterStore`]. Store failures let the call through.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// `rl:{bot_id}:{scope_id}[:{suffix}]`
    pub fn key(caller: &Caller, scope: RateLimitScope, suffix: Option<&str>) -> String {
        let scope_id = match scope {
            RateLimitScope::User => caller.user_id.to_string(),
            RateLimitScope::Chat => caller.chat_id.to_string(),
            RateLimitScope::Bot => "bot".to_string(),
        };
        match suffix.filter(|suffix| !suffix.is_empty()) {
            Some(suffix) => format!("rl:{}:{scope_id}:{suffix}", caller.bot_id),
            None => format!("rl:{}:{scope_id}", caller.bot_id),
        }
    }

    pub async fn check(&self, key: &str, window_s: u64, allowance: u64) -> RateDecision {
        let count = match tokio::time::timeout(self.timeout, self.store.increment(key, window_s)).await {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                warn!(key, error = %err, "rate limit store failed, allowing");
                return RateDecision::Allowed;
            }
            Err(_) => {
                warn!(key, "rate limit store timed out, allowing");
                return RateDecision::Allowed;
            }
        };
        if count <= allowance {
            debug!(key, count, allowance, "rate limit passed");
            return RateDecision::Allowed;
        }
        let retry_in = match tokio::time::timeout(self.timeout, self.store.ttl(key)).await {
            Ok(Ok(Some(ttl))) => ttl.min(window_s),
            _ => window_s,
        };
        debug!(key, count, allowance, retry_in, "rate limit exceeded");
        RateDecision::Blocked { retry_in }
    }
}
