use super::outline::{Outline, SceneBeat};
use super::prompts::{self, OUTLINE_TEMPLATE, PromptTemplates, SCENE_TEMPLATE};
use crate::agents::{
    AgentMessage, AgentRole, AgentSession, AgentSessionRegistry, MessageRole, PromptMetadata,
};
use crate::config::Config;
use crate::error::ReviewError;
use crate::review::ReviewGate;
use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use std::sync::Arc;
use tera::Context as TemplateContext;
use tracing::{info, warn};

/// Result of one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneOutcome {
    Written {
        index: usize,
        title: String,
        text: String,
    },
    /// The reviewer rejected the scene prompt. Not retried.
    Cancelled { index: usize, title: String },
}

impl SceneOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Written { index, .. } | Self::Cancelled { index, .. } => *index,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptRun {
    pub outline: Outline,
    pub scenes: Vec<SceneOutcome>,
}

/// Director outline followed by Screenwriter scenes. Every payload goes
/// through the review gate before it reaches the backend.
pub struct ScriptPipeline {
    gate: Arc<ReviewGate>,
    registry: Arc<AgentSessionRegistry>,
    config: Arc<Config>,
    templates: PromptTemplates,
}

impl ScriptPipeline {
    pub fn new(
        gate: Arc<ReviewGate>,
        registry: Arc<AgentSessionRegistry>,
        config: Arc<Config>,
    ) -> Result<Self> {
        Ok(Self {
            gate,
            registry,
            config,
            templates: PromptTemplates::new()?,
        })
    }

    /// Outline then scenes. A rejected outline ends the run with the
    /// cancellation error.
    pub async fn run(&self, brief: &str, scenes: usize) -> Result<ScriptRun> {
        let outline = self.outline(brief, scenes).await?;
        let scenes = self.write_scenes(&outline).await?;
        Ok(ScriptRun { outline, scenes })
    }

    pub async fn outline(&self, brief: &str, scenes: usize) -> Result<Outline> {
        let role = AgentRole::Director;
        let model = self.config.model_for(role);
        let mut vars = TemplateContext::new();
        vars.insert("brief", brief);
        vars.insert("scenes", &scenes);
        let filled = self.templates.render(prompts::OUTLINE, &vars)?;

        let prompt = self.gate.submit_for_review(filled, "Outline").await?;
        let session = self.agent(role);
        let metadata = PromptMetadata::for_model(model)
            .with_template(OUTLINE_TEMPLATE)
            .with_final_prompt(prompt.clone());
        let reply = self
            .registry
            .send_message(role, &session, &prompt, Some(metadata))
            .await
            .context("director failed to outline")?;

        let outline = Outline::from_reply(&reply);
        if outline.is_empty() {
            bail!("director returned an empty outline");
        }
        info!(scenes = outline.len(), "outline ready");
        Ok(outline)
    }

    /// Writes every beat, at most `max_concurrent_scenes` in flight. Results
    /// keep outline order.
    pub async fn write_scenes(&self, outline: &Outline) -> Result<Vec<SceneOutcome>> {
        let role = AgentRole::Screenwriter;
        let _session = self.agent(role);
        let memory = AgentMessage::new(
            role,
            MessageRole::User,
            format!("Approved outline for this project:\n{}", outline.to_text()),
        )
        .with_data(serde_json::to_value(outline).ok());
        self.registry.inject_message(role, memory).await;

        let total = outline.len();
        let limit = self.config.agents.max_concurrent_scenes.max(1);
        let results: Vec<Result<SceneOutcome>> = stream::iter(outline.scenes.iter())
            .map(|beat| self.write_scene(beat, total))
            .buffered(limit)
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn write_scene(&self, beat: &SceneBeat, total: usize) -> Result<SceneOutcome> {
        let role = AgentRole::Screenwriter;
        let title = format!("Scene {}", beat.index);
        let mut vars = TemplateContext::new();
        vars.insert("index", &beat.index);
        vars.insert("total", &total);
        vars.insert("summary", &beat.summary);
        let filled = self.templates.render(prompts::SCENE, &vars)?;

        let prompt = match self.gate.submit_for_review(filled, title.clone()).await {
            Ok(prompt) => prompt,
            Err(err @ ReviewError::Cancelled { .. }) => {
                warn!(scene = beat.index, "{err}");
                return Ok(SceneOutcome::Cancelled {
                    index: beat.index,
                    title,
                });
            }
            Err(err) => return Err(err.into()),
        };

        // Looked up per scene so a reset between scenes starts a fresh session.
        let session = self.agent(role);
        let metadata = PromptMetadata::for_model(session.model())
            .with_template(SCENE_TEMPLATE)
            .with_final_prompt(prompt.clone());
        let text = self
            .registry
            .send_message(role, &session, &prompt, Some(metadata))
            .await
            .with_context(|| format!("screenwriter failed on {title}"))?;

        Ok(SceneOutcome::Written {
            index: beat.index,
            title,
            text,
        })
    }

    fn agent(&self, role: AgentRole) -> Arc<AgentSession> {
        let model = self.config.model_for(role);
        let instruction = self.config.agents.instruction_for(role);
        self.registry.get_agent(
            role,
            model,
            Some(instruction.as_str()),
            Some(PromptMetadata::for_model(model)),
        )
    }
}
