use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token counts and estimated cost of one backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub label: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_micros: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_estimated_cost_micros: i64,
    pub record_count: u64,
}

impl UsageSummary {
    pub(super) fn add(&mut self, record: &UsageRecord) {
        self.total_input_tokens = self.total_input_tokens.saturating_add(record.input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(record.output_tokens);
        self.total_estimated_cost_micros = self
            .total_estimated_cost_micros
            .saturating_add(record.estimated_cost_micros.unwrap_or(0));
        self.record_count += 1;
    }

    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens
            .saturating_add(self.total_output_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_pattern: String,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    #[must_use]
    pub fn estimate_cost_micros(&self, input_tokens: u64, output_tokens: u64) -> i64 {
        let input_micros_per_million = micros_per_million(self.input_cost_per_million);
        let output_micros_per_million = micros_per_million(self.output_cost_per_million);

        let input_cost = i128::from(input_tokens) * i128::from(input_micros_per_million)
            / i128::from(1_000_000_i64);
        let output_cost = i128::from(output_tokens) * i128::from(output_micros_per_million)
            / i128::from(1_000_000_i64);
        let total = input_cost + output_cost;

        i64::try_from(total).unwrap_or(i64::MAX)
    }
}

fn micros_per_million(cost_per_million: f64) -> i64 {
    let scaled = (cost_per_million * 1_000_000.0).round();
    let text = format!("{scaled:.0}");
    text.parse::<i64>().unwrap_or_default()
}

#[must_use]
pub fn default_pricing() -> Vec<ModelPricing> {
    vec![
        ModelPricing {
            model_pattern: "gpt-4o-mini".into(),
            input_cost_per_million: 0.15,
            output_cost_per_million: 0.6,
        },
        ModelPricing {
            model_pattern: "gpt-4o".into(),
            input_cost_per_million: 2.5,
            output_cost_per_million: 10.0,
        },
        ModelPricing {
            model_pattern: "claude-sonnet-4".into(),
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
        },
        ModelPricing {
            model_pattern: "claude-3-5-haiku".into(),
            input_cost_per_million: 0.8,
            output_cost_per_million: 4.0,
        },
        ModelPricing {
            model_pattern: "gemini-2.0-flash".into(),
            input_cost_per_million: 0.1,
            output_cost_per_million: 0.4,
        },
        ModelPricing {
            model_pattern: "gemini-1.5-pro".into(),
            input_cost_per_million: 1.25,
            output_cost_per_million: 5.0,
        },
        ModelPricing {
            model_pattern: "echo".into(),
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
        },
    ]
}

/// First entry whose pattern occurs in `model`. More specific patterns must
/// come first in the table (`gpt-4o-mini` before `gpt-4o`).
#[must_use]
pub fn lookup_pricing<'a>(
    model: &str,
    pricing_table: &'a [ModelPricing],
) -> Option<&'a ModelPricing> {
    pricing_table
        .iter()
        .find(|pricing| model.contains(&pricing.model_pattern))
}
