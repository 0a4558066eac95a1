use super::{BackendKind, Config};

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("STORYFORGE_API_KEY")
            && !key.is_empty()
        {
            self.backend.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("STORYFORGE_BASE_URL")
            && !url.is_empty()
        {
            self.backend.base_url = Some(url);
        }

        if let Ok(kind) = std::env::var("STORYFORGE_BACKEND") {
            match kind.trim().to_ascii_lowercase().as_str() {
                "echo" => self.backend.kind = BackendKind::Echo,
                "compatible" => self.backend.kind = BackendKind::Compatible,
                "" => {}
                other => tracing::warn!(value = other, "ignoring unknown STORYFORGE_BACKEND"),
            }
        }

        if let Ok(model) = std::env::var("STORYFORGE_MODEL")
            && !model.is_empty()
        {
            self.default_model = model;
        }

        if let Ok(review) = std::env::var("STORYFORGE_REVIEW")
            && let Some(enabled) = parse_flag(&review)
        {
            self.review.enabled = enabled;
        }

        if let Ok(temp_str) = std::env::var("STORYFORGE_TEMPERATURE")
            && let Ok(temp) = temp_str.parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.default_temperature = temp;
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
