use crate::agents::AgentRole;
use crate::config::Config;
use crate::usage::UsageMeter;
use strum::IntoEnumIterator;

pub fn render_status(config: &Config) -> String {
    let mut lines = vec![
        "◆ StoryForge".to_string(),
        String::new(),
        format!("  Version     {}", env!("CARGO_PKG_VERSION")),
        format!("  Config      {}", config.config_path.display()),
        String::new(),
        format!("  Backend     {}", config.backend.kind),
        format!(
            "  Base URL    {}",
            config.backend.base_url.as_deref().unwrap_or("(none)")
        ),
        format!(
            "  API key     {}",
            if config.backend.api_key.is_some() {
                "set"
            } else {
                "not set"
            }
        ),
        format!("  Model       {}", config.default_model),
        format!("  Temperature {}", config.default_temperature),
        String::new(),
        format!(
            "  Review      {}{}",
            if config.review.enabled { "on" } else { "off" },
            if config.review.head_only {
                " (head only)"
            } else {
                ""
            }
        ),
        format!("  Scenes      {} at a time", config.agents.max_concurrent_scenes),
        format!("  Observer    {}", config.observability.backend),
    ];
    lines.push(String::new());
    lines.join("\n")
}

pub fn render_roles(config: &Config) -> String {
    let mut lines = Vec::new();
    for role in AgentRole::iter() {
        lines.push(format!("{role:<13} {}", config.model_for(role)));
        lines.push(format!("              {}", config.agents.instruction_for(role)));
    }
    lines.join("\n")
}

pub fn render_usage(meter: &UsageMeter) -> String {
    let summary = meter.summary();
    let mut lines = vec![format!(
        "usage: {} calls, {} in / {} out tokens, ~${:.6}",
        summary.record_count,
        summary.total_input_tokens,
        summary.total_output_tokens,
        micros_to_dollars(summary.total_estimated_cost_micros),
    )];
    for (model, by_model) in meter.by_model() {
        lines.push(format!(
            "  {model}: {} calls, {} tokens",
            by_model.record_count,
            by_model.total_tokens()
        ));
    }
    lines.join("\n")
}

#[allow(clippy::cast_precision_loss)]
fn micros_to_dollars(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}
