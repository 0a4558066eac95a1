pub mod outline;
pub mod prompts;
pub mod script;

pub use outline::{Outline, SceneBeat};
pub use prompts::PromptTemplates;
pub use script::{SceneOutcome, ScriptPipeline, ScriptRun};
