use anyhow::{Context, Result};
use browser_agent::browser::ChromeBrowser;
use browser_agent::{BrowserAgent, BrowserSession, BrowserToolset, Config, OpenAiClient};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "browser-agent")]
#[command(version)]
#[command(about = "Let a language model drive a browser to complete a task")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task to completion and print the answer
    Run {
        /// Natural-language task for the agent
        task: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Launch the browser without a window
        #[arg(long)]
        headless: bool,

        /// Override the model request budget
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Override the model id
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("browser_agent={}", log_level))),
        )
        .init();

    match cli.command {
        Commands::Run {
            task,
            config,
            headless,
            max_iterations,
            model,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?,
                None => Config::default(),
            };

            if headless {
                config.agent.headless = true;
            }
            if let Some(max_iterations) = max_iterations {
                config.agent.max_iterations = max_iterations;
            }
            if let Some(model) = model {
                config.provider.model = model;
            }
            config.validate()?;

            run_task(config, &task).await
        }
    }
}

async fn run_task(config: Config, task: &str) -> Result<()> {
    let model = Arc::new(OpenAiClient::from_env(&config.provider)?);
    let session = Arc::new(BrowserSession::new(ChromeBrowser::new(), config.browser.clone()));
    let toolset = Arc::new(BrowserToolset::new(session.clone(), config.agent.headless));
    let agent = BrowserAgent::with_toolset(config.agent, model, toolset);

    info!(session_id = %session.session_id(), "Running task");
    let result = agent.run(task).await;

    let closed = session.close_browser().await;
    if closed.is_error() {
        warn!(result = %closed, "Browser cleanup reported a problem");
    }

    let report = result?;
    info!(iterations = report.iterations, "Task finished");
    println!("{}", report.answer);
    Ok(())
}
