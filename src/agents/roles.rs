use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Production roles. Each role owns exactly one conversation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AgentRole {
    Director,
    Screenwriter,
    Reviewer,
    Designer,
    Analyst,
    Videographer,
}

impl AgentRole {
    /// Built-in priming instruction used when neither the caller nor the
    /// config supplies one.
    #[must_use]
    pub fn default_instruction(self) -> &'static str {
        match self {
            Self::Director => {
                "You are the director. Turn a brief into a numbered scene outline and keep the project's vision consistent."
            }
            Self::Screenwriter => {
                "You are the screenwriter. Write each scene you are given, staying consistent with every scene already written."
            }
            Self::Reviewer => {
                "You are the script reviewer. Point out continuity errors and weak beats, briefly."
            }
            Self::Designer => {
                "You are the production designer. Describe characters, locations and props as reusable visual assets."
            }
            Self::Analyst => {
                "You are the shot analyst. Break scenes into shots with framing, movement and duration."
            }
            Self::Videographer => {
                "You are the videographer. Write motion prompts for image-to-video generation."
            }
        }
    }

    /// Acknowledgement the model turn carries after priming.
    #[must_use]
    pub fn acknowledgement(self) -> String {
        format!("Understood. I will act as the {self} for this project.")
    }
}
