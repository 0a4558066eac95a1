use super::types::{ModelPricing, UsageRecord, UsageSummary, lookup_pricing};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct MeterState {
    total: UsageSummary,
    by_model: BTreeMap<String, UsageSummary>,
    records: Vec<UsageRecord>,
}

/// In-memory token and cost counters, aggregated per call.
pub struct UsageMeter {
    pricing: Vec<ModelPricing>,
    state: Mutex<MeterState>,
}

impl UsageMeter {
    pub fn new(pricing: Vec<ModelPricing>) -> Self {
        Self {
            pricing,
            state: Mutex::new(MeterState::default()),
        }
    }

    /// Records one call. Unknown models are counted with no cost estimate.
    pub fn record(
        &self,
        label: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> UsageRecord {
        let record = UsageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            estimated_cost_micros: lookup_pricing(model, &self.pricing)
                .map(|pricing| pricing.estimate_cost_micros(input_tokens, output_tokens)),
            created_at: Utc::now(),
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.total.add(&record);
        state
            .by_model
            .entry(record.model.clone())
            .or_default()
            .add(&record);
        state.records.push(record.clone());
        record
    }

    pub fn summary(&self) -> UsageSummary {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
            .clone()
    }

    pub fn by_model(&self) -> BTreeMap<String, UsageSummary> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_model
            .clone()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }
}
