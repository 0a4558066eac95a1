pub mod meter;
pub mod types;

pub use meter::UsageMeter;
pub use types::{ModelPricing, UsageRecord, UsageSummary, default_pricing, lookup_pricing};
