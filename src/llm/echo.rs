//! Offline backend with deterministic replies.
//!
//! Prompts whose first line asks for an outline get a JSON outline back;
//! everything else is answered with a short prose line that quotes the
//! prompt. Token counts
//! are whitespace word counts.

use super::traits::{BackendFuture, BackendReply, ChatBackend, ChatTurn};

const DEFAULT_SCENE_COUNT: usize = 3;
const MAX_SCENE_COUNT: usize = 24;

pub struct EchoBackend;

impl EchoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ChatBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn send<'a>(
        &'a self,
        model: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
        _temperature: f64,
    ) -> BackendFuture<'a, BackendReply> {
        Box::pin(async move {
            let text = if first_line(message).to_ascii_lowercase().contains("outline") {
                outline_reply(message)
            } else {
                prose_reply(model, history, message)
            };

            let input = history
                .iter()
                .map(|turn| word_count(&turn.text))
                .sum::<u64>()
                + word_count(message);
            let output = word_count(&text);
            Ok(BackendReply::with_usage(text, input, output))
        })
    }
}

fn outline_reply(message: &str) -> String {
    let count = requested_scene_count(message).unwrap_or(DEFAULT_SCENE_COUNT);
    let scenes: Vec<serde_json::Value> = (1..=count)
        .map(|index| {
            serde_json::json!({
                "index": index,
                "summary": format!("Part {index} of {count}: {}", subject(message)),
            })
        })
        .collect();
    serde_json::json!({ "scenes": scenes }).to_string()
}

fn prose_reply(model: &str, history: &[ChatTurn], message: &str) -> String {
    format!(
        "[{model} turn {}] {}",
        history.len() / 2 + 1,
        first_line(message)
    )
}

/// Finds `<n> scene(s)` in the prompt.
fn requested_scene_count(message: &str) -> Option<usize> {
    let words: Vec<&str> = message.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let noun = pair[1].trim_matches(|c: char| !c.is_ascii_alphabetic());
        if noun.eq_ignore_ascii_case("scenes") || noun.eq_ignore_ascii_case("scene") {
            pair[0]
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_SCENE_COUNT).contains(n))
        } else {
            None
        }
    })
}

/// Text after a `Brief:` line, else the first line.
fn subject(message: &str) -> &str {
    message
        .lines()
        .find_map(|line| line.trim().strip_prefix("Brief:"))
        .map(str::trim)
        .unwrap_or_else(|| first_line(message))
}

fn first_line(message: &str) -> &str {
    message.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
}

fn word_count(text: &str) -> u64 {
    u64::try_from(text.split_whitespace().count()).unwrap_or(u64::MAX)
}
