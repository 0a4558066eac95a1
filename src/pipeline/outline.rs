use crate::agents::try_parse_structured;
use serde::{Deserialize, Serialize};

/// One numbered beat of the Director's outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBeat {
    pub index: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub scenes: Vec<SceneBeat>,
}

impl Outline {
    /// Reads an outline from a Director reply. JSON (`{"scenes": [...]}` or a
    /// bare array) is preferred; otherwise every non-empty line is a beat.
    pub fn from_reply(reply: &str) -> Self {
        if let Some(value) = try_parse_structured(reply) {
            if let Ok(outline) = serde_json::from_value::<Outline>(value.clone())
                && !outline.scenes.is_empty()
            {
                return outline;
            }
            if let Ok(scenes) = serde_json::from_value::<Vec<SceneBeat>>(value)
                && !scenes.is_empty()
            {
                return Self { scenes };
            }
        }

        let scenes = reply
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| SceneBeat {
                index: i + 1,
                summary: line.to_string(),
            })
            .collect();
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Numbered plain-text rendering, one beat per line.
    pub fn to_text(&self) -> String {
        self.scenes
            .iter()
            .map(|beat| format!("{}. {}", beat.index, beat.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
