use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use council::{Council, CouncilConfig, CouncilRegistry, CouncilRunOutput, OllamaClient};

#[derive(Parser)]
#[command(
    name = "council-cli",
    about = "Run a council of LLMs: parallel answers, anonymized peer ranking, chairman synthesis"
)]
struct Cli {
    /// Path to a TOML council configuration. Uses the built-in default
    /// council when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full three-stage deliberation for a question.
    Ask {
        question: String,

        /// Print the run bundle as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also generate a short conversation title.
        #[arg(long)]
        title: bool,
    },
    /// Probe every participant endpoint and report model availability.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CouncilConfig::load(path)
            .with_context(|| format!("loading council config from {}", path.display()))?,
        None => CouncilConfig::default(),
    };
    let registry = config.registry().context("building council registry")?;
    let client = Arc::new(OllamaClient::new());

    info!(
        participants = registry.len(),
        chairman = %registry.chairman().display_name(),
        timeout_secs = config.request_timeout_secs,
        "council ready"
    );

    match cli.command {
        Command::Ask {
            question,
            json,
            title,
        } => {
            provision(&client, &registry).await;

            let council = Council::new(registry, client, config.request_timeout());

            if title {
                let title = council.generate_title(&question).await;
                println!("Title: {title}\n");
            }

            let output = council.run(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_bundle(&output);
            }
        }
        Command::Health => {
            let mut unhealthy = 0usize;
            for participant in registry.participants() {
                let ok = client.has_model(participant).await;
                if !ok {
                    unhealthy += 1;
                }
                println!(
                    "{:9} {:24} {:20} {}",
                    participant.role.to_string(),
                    participant.served_model(),
                    participant.endpoint.to_string(),
                    if ok { "ok" } else { "unavailable" }
                );
            }
            if unhealthy > 0 {
                anyhow::bail!("{unhealthy} participant(s) unavailable");
            }
        }
    }

    Ok(())
}

/// Pull every base model and create customized derivatives. Failures are
/// logged and tolerated: the dispatcher already isolates unusable
/// participants per call.
async fn provision(client: &OllamaClient, registry: &CouncilRegistry) {
    for participant in registry.participants() {
        if let Err(err) = client.pull(participant).await {
            warn!(model = %participant.model, error = %err, "model pull failed");
        }
        if let Err(err) = client.create_custom(participant).await {
            warn!(model = %participant.served_model(), error = %err, "model create failed");
        }
    }
}

fn print_bundle(output: &CouncilRunOutput) {
    println!("=== Stage 1: individual responses ===\n");
    for result in &output.stage1 {
        println!("--- {} ---\n{}\n", result.model, result.response);
    }

    println!("=== Stage 2: peer rankings ===\n");
    for result in &output.stage2 {
        println!("--- {} ---\n{}\n", result.model, result.ranking);
    }

    println!("=== Aggregate ranking ===\n");
    for (label, model) in &output.metadata.label_to_model {
        println!("{label} = {model}");
    }
    println!();
    for entry in &output.metadata.aggregate_rankings {
        println!(
            "{:>6.2}  {} ({} judges)",
            entry.average_rank, entry.model, entry.rankings_count
        );
    }

    println!("\n=== Final synthesis ({}) ===\n", output.synthesis.model);
    println!("{}", output.synthesis.response);
}
