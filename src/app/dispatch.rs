use crate::agents::AgentSessionRegistry;
use crate::app::status::{render_roles, render_status, render_usage};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::is_cancellation;
use crate::llm::create_backend;
use crate::observability::create_observer;
use crate::pipeline::{SceneOutcome, ScriptPipeline, ScriptRun};
use crate::review::{ConsoleReviewer, ReviewGate};
use crate::usage::UsageMeter;
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, info};

struct RunOptions {
    brief: String,
    scenes: usize,
    review: bool,
    model: Option<String>,
    show_history: bool,
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            brief,
            scenes,
            review,
            model,
            show_history,
        } => {
            run_script(
                config,
                RunOptions {
                    brief,
                    scenes,
                    review,
                    model,
                    show_history,
                },
            )
            .await
        }
        Commands::Roles => {
            println!("{}", render_roles(&config));
            Ok(())
        }
        Commands::Status => {
            print!("{}", render_status(&config));
            Ok(())
        }
    }
}

async fn run_script(mut config: Config, options: RunOptions) -> Result<()> {
    if options.scenes == 0 {
        bail!("--scenes must be at least 1");
    }
    if options.brief.trim().is_empty() {
        bail!("--brief must not be empty");
    }
    if let Some(model) = options.model {
        config.default_model = model;
        for role in config.agents.roles.values_mut() {
            role.model = None;
        }
    }
    if options.review {
        config.review.enabled = true;
    }
    let config = Arc::new(config);

    let observer = create_observer(&config.observability);
    let backend = create_backend(&config.backend)?;
    let usage = Arc::new(UsageMeter::new(config.usage.pricing.clone()));
    let gate = Arc::new(ReviewGate::from_config(
        &config.review,
        Arc::clone(&observer),
    ));
    let registry = Arc::new(
        AgentSessionRegistry::new(backend, config.default_temperature)
            .with_usage(Arc::clone(&usage))
            .with_observer(observer),
    );

    let _progress = registry.subscribe(|event| {
        debug!(role = %event.role, kind = %event.message.role, "message recorded");
    });
    let reviewer = gate
        .review_mode()
        .then(|| ConsoleReviewer::new(Arc::clone(&gate)).spawn());

    info!(
        backend = registry.backend_name(),
        review = gate.review_mode(),
        scenes = options.scenes,
        "starting script run"
    );
    let pipeline = ScriptPipeline::new(
        Arc::clone(&gate),
        Arc::clone(&registry),
        Arc::clone(&config),
    )?;
    let result = pipeline.run(&options.brief, options.scenes).await;

    if let Some(reviewer) = reviewer {
        reviewer.stop().await;
    }

    let outcome = match result {
        Ok(run) => {
            print_run(&run);
            Ok(())
        }
        Err(e) if is_cancellation(&e) => {
            println!("Outline rejected by reviewer; no scenes written.");
            Ok(())
        }
        Err(e) => Err(e),
    };

    if options.show_history {
        for role in registry.active_roles() {
            let entry = serde_json::json!({
                "role": role,
                "messages": registry.get_history(role),
            });
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }
    println!("{}", render_usage(&usage));
    outcome
}

fn print_run(run: &ScriptRun) {
    println!("Outline");
    println!("{}", run.outline.to_text());
    for scene in &run.scenes {
        println!();
        match scene {
            SceneOutcome::Written { title, text, .. } => {
                println!("── {title}");
                println!("{text}");
            }
            SceneOutcome::Cancelled { title, .. } => {
                println!("── {title} (rejected by reviewer)");
            }
        }
    }
    println!();
}
