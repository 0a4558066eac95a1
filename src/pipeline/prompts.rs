use anyhow::{Context as _, Result};
use tera::{Context, Tera};

pub const OUTLINE: &str = "outline";
pub const SCENE: &str = "scene";

pub(super) const OUTLINE_TEMPLATE: &str = "Write an outline for the following brief in {{ scenes }} scenes.\n\
{% raw %}Reply with JSON only: {\"scenes\": [{\"index\": 1, \"summary\": \"...\"}]}{% endraw %}\n\
Brief: {{ brief }}";

pub(super) const SCENE_TEMPLATE: &str = "Write scene {{ index }} of {{ total }}.\n\
Scene summary: {{ summary }}";

/// Tera-backed prompt templates for the script pipeline.
pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    /// Engine with the built-in `outline` and `scene` templates.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates([(OUTLINE, OUTLINE_TEMPLATE), (SCENE, SCENE_TEMPLATE)])
            .context("failed to register prompt templates")?;
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(name, context)
            .with_context(|| format!("failed to render prompt template '{name}'"))
    }
}
