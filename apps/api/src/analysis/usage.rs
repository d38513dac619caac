use crate::analysis::schema::TokenUsage;
use crate::llm_client::Usage;

/// USD per token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub per_input_token: f64,
    pub per_output_token: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            per_input_token: 0.00001,
            per_output_token: 0.00003,
        }
    }
}

impl Pricing {
    pub fn cost(&self, usage: &Usage) -> f64 {
        usage.prompt_tokens as f64 * self.per_input_token
            + usage.completion_tokens as f64 * self.per_output_token
    }
}

/// Running totals for one analysis request. Owned by the request, never shared.
#[derive(Debug)]
pub struct UsageAccumulator {
    pricing: Pricing,
    totals: TokenUsage,
    calls: u32,
}

impl UsageAccumulator {
    pub fn new(pricing: Pricing) -> Self {
        Self {
            pricing,
            totals: TokenUsage::default(),
            calls: 0,
        }
    }

    /// Adds the counters of one completed backend call.
    pub fn record(&mut self, usage: &Usage) {
        self.totals.prompt_tokens += usage.prompt_tokens;
        self.totals.completion_tokens += usage.completion_tokens;
        self.totals.total_tokens += usage.total_tokens;
        self.totals.total_cost += self.pricing.cost(usage);
        self.calls += 1;
    }

    pub fn totals(&self) -> TokenUsage {
        self.totals
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }
}
