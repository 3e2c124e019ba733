//! The budget tracker — cumulative per-model usage against ceilings.

use crate::pricing::PricingTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// Cumulative token usage for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Tracks token and dollar spend across all model calls of one or more
/// agents. Safe to share behind an `Arc` — sibling agents in a team may
/// feed a single tracker.
///
/// Ceilings of 0 mean "no ceiling".
pub struct BudgetTracker {
    usage: Mutex<HashMap<String, TokenUsage>>,
    budget_tokens: u64,
    budget_dollars: f64,
    pricing: PricingTable,
}

impl BudgetTracker {
    /// Create a tracker with the given ceilings and default pricing.
    pub fn new(budget_tokens: u64, budget_dollars: f64) -> Self {
        Self::with_pricing(budget_tokens, budget_dollars, PricingTable::with_defaults())
    }

    /// Create a tracker with a custom pricing table.
    pub fn with_pricing(budget_tokens: u64, budget_dollars: f64, pricing: PricingTable) -> Self {
        Self {
            usage: Mutex::new(HashMap::new()),
            budget_tokens,
            budget_dollars,
            pricing,
        }
    }

    /// An unlimited tracker (both ceilings disabled).
    pub fn unlimited() -> Self {
        Self::new(0, 0.0)
    }

    /// Record usage for a model call. Returns whether this call pushed the
    /// tracker over budget.
    pub fn add_model_usage(&self, model: &str, input_tokens: u64, output_tokens: u64) -> bool {
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = usage.entry(model.to_string()).or_default();
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;

        let over = self.over_budget_locked(&usage);
        if over {
            warn!(
                model,
                total_tokens = Self::total_tokens_locked(&usage),
                "Budget ceiling crossed"
            );
        }
        over
    }

    /// Whether accumulated totals exceed either configured ceiling.
    pub fn over_budget(&self) -> bool {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        self.over_budget_locked(&usage)
    }

    /// Total tokens across all models.
    pub fn total_tokens(&self) -> u64 {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        Self::total_tokens_locked(&usage)
    }

    /// Total cost in USD across all models.
    pub fn total_cost(&self) -> f64 {
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        self.total_cost_locked(&usage)
    }

    /// Cumulative usage for one model (zero if never seen).
    pub fn model_usage(&self, model: &str) -> TokenUsage {
        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .copied()
            .unwrap_or_default()
    }

    /// Cumulative cost for one model, summed across all its calls.
    pub fn model_cost(&self, model: &str) -> f64 {
        let u = self.model_usage(model);
        self.pricing
            .compute_cost(model, u.input_tokens, u.output_tokens)
    }

    /// The pricing table in use.
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    fn over_budget_locked(&self, usage: &HashMap<String, TokenUsage>) -> bool {
        if self.budget_tokens > 0 && Self::total_tokens_locked(usage) > self.budget_tokens {
            return true;
        }
        if self.budget_dollars > 0.0 && self.total_cost_locked(usage) > self.budget_dollars {
            return true;
        }
        false
    }

    fn total_tokens_locked(usage: &HashMap<String, TokenUsage>) -> u64 {
        usage.values().map(TokenUsage::total).sum()
    }

    fn total_cost_locked(&self, usage: &HashMap<String, TokenUsage>) -> f64 {
        usage
            .iter()
            .map(|(model, u)| {
                self.pricing
                    .compute_cost(model, u.input_tokens, u.output_tokens)
            })
            .sum()
    }
}
