use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::types::TokenUsage;

/// Blended USD price per 1000 tokens used for the cost estimate.
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.0003;

/// Cumulative token counters for the life of the process.
///
/// Counters only grow; there is no reset. Updates use relaxed atomics, so a
/// snapshot taken under heavy concurrency is approximate.
#[derive(Debug)]
pub struct UsageTracker {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    total_tokens: AtomicU64,
    requests: AtomicU64,
    estimated_requests: AtomicU64,
    cost_per_1k_tokens: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_requests: u64,
    /// Requests whose counts were approximated
    pub estimated_requests: u64,
    pub estimated_cost_usd: f64,
    pub average_tokens_per_request: f64,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COST_PER_1K_TOKENS)
    }
}

impl UsageTracker {
    pub fn new(cost_per_1k_tokens: f64) -> Self {
        Self {
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            estimated_requests: AtomicU64::new(0),
            cost_per_1k_tokens,
        }
    }

    pub fn record(&self, input_tokens: u64, output_tokens: u64) {
        self.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
        self.total_tokens
            .fetch_add(input_tokens + output_tokens, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_usage(&self, usage: &TokenUsage) {
        self.record(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        if usage.estimated {
            self.estimated_requests.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            target: "planner::usage",
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            estimated = usage.estimated,
            "recorded token usage"
        );
    }

    pub fn stats(&self) -> UsageStats {
        let total_tokens = self.total_tokens.load(Ordering::Relaxed);
        let total_requests = self.requests.load(Ordering::Relaxed);
        let average_tokens_per_request = if total_requests == 0 {
            0.0
        } else {
            total_tokens as f64 / total_requests as f64
        };

        UsageStats {
            total_tokens,
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            total_requests,
            estimated_requests: self.estimated_requests.load(Ordering::Relaxed),
            estimated_cost_usd: total_tokens as f64 / 1000.0 * self.cost_per_1k_tokens,
            average_tokens_per_request,
        }
    }
}
