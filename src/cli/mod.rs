use clap::{Parser, Subcommand};

/// `StoryForge` - review-gated, memory-backed script generation.
#[derive(Parser, Debug)]
#[command(name = "storyforge")]
#[command(version)]
#[command(about = "Drive a screenplay pipeline through a human review gate.", long_about = None)]
pub struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Outline a brief and write its scenes
    Run {
        /// Story brief handed to the director
        #[arg(short, long)]
        brief: String,

        /// Number of scenes to outline
        #[arg(short, long, default_value_t = 3)]
        scenes: usize,

        /// Hold every prompt for approval on the terminal
        #[arg(long)]
        review: bool,

        /// Model for every role (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Print every role's message history as JSON at the end
        #[arg(long)]
        show_history: bool,
    },

    /// List agent roles with their models and instructions
    Roles,

    /// Show the effective configuration
    Status,
}
