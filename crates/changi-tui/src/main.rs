use std::fs::{self, File};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use changi_core::{
    render, ChatSession, Config, CycleOutcome, HttpAnswerer, LocalClock, Role,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

const DEFAULT_LOG_FILTER: &str = "changi_core=info,changi=info";

#[derive(Parser)]
#[command(name = "changi")]
#[command(about = "Chat with the Changi Airport assistant from the terminal")]
struct Cli {
    /// Answering service endpoint (overrides the config file)
    #[arg(long, global = true, env = "CHANGI_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
        /// Print the answer as HTML markup
        #[arg(long)]
        html: bool,
    },
    /// Check that the answering service is up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Could not read config file")?;
    let endpoint = cli
        .endpoint
        .clone()
        .unwrap_or_else(|| config.endpoint().to_string());

    match cli.command {
        None => {
            init_file_logging()?;
            run_tui(&config, endpoint).await
        }
        Some(Commands::Ask { question, html }) => {
            init_stderr_logging();
            ask_once(&config, &endpoint, &question, html).await
        }
        Some(Commands::Health) => {
            init_stderr_logging();
            check_health(&endpoint).await
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The TUI owns the terminal, so logs go to a file instead.
fn init_file_logging() -> Result<()> {
    let log_dir = dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join("changi");
    fs::create_dir_all(&log_dir)?;
    let file = File::create(log_dir.join("changi.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn build_session(config: &Config, endpoint: &str) -> ChatSession {
    ChatSession::new(
        Arc::new(HttpAnswerer::new(endpoint)),
        Arc::new(LocalClock::new(config.hour_format)),
        config.rollback,
    )
}

async fn run_tui(config: &Config, endpoint: String) -> Result<()> {
    info!(%endpoint, "starting chat");
    let session = build_session(config, &endpoint);
    let mut app = App::new(session, endpoint);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            app.poll_pending();
            app.sync_transcript();
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask_once(config: &Config, endpoint: &str, question: &str, html: bool) -> Result<()> {
    let session = build_session(config, endpoint);

    let Some(outcome) = session.ask(question).await else {
        anyhow::bail!("Question is empty");
    };

    let transcript = session.transcript();
    let reply = transcript
        .last()
        .filter(|msg| msg.role() == Role::Assistant)
        .context("No reply recorded")?;

    if html {
        println!("{}", render(reply.content()));
    } else {
        println!("{}", reply.content());
    }

    if let CycleOutcome::RolledBack(err) = outcome {
        info!(error = ?err, "question was not answered");
    }
    Ok(())
}

async fn check_health(endpoint: &str) -> Result<()> {
    let client = HttpAnswerer::new(endpoint);
    match client.health().await {
        Ok(()) => println!("Answering service at {} is up", endpoint),
        Err(e) => println!("Answering service at {} is not healthy: {}", endpoint, e),
    }
    Ok(())
}
