//! Duet TUI Entry Point
//!
//! Launches the split-screen terminal UI.
//!
//! Usage:
//!   duet [OPTIONS]
//!
//! Options:
//!   --topic <TOPIC>        Conversation topic; the dialogue starts on launch
//!   --first <1|2>          Who speaks first
//!   --config <FILE>        Configuration file
//!   --backend-url <URL>    Gateway base URL
//!   --model-a <MODEL>      Model of participant 1
//!   --model-b <MODEL>      Model of participant 2
//!   --auto-advance         Keep the dialogue going without key presses
//!
//! Set `DUET_LOG` to write logs to `$XDG_CACHE_HOME/duet/duet.log`; the
//! filter comes from `RUST_LOG`.

use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duet_conductor::{default_config_path, load_config_from_path, ConfigOverrides, ParticipantId};
use duet_tui::App;

/// Duet - two models in conversation
#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation topic; the dialogue starts on launch
    #[arg(short, long)]
    topic: Option<String>,

    /// Who speaks first (1 or 2)
    #[arg(short, long, value_name = "1|2", value_parser = parse_participant)]
    first: Option<ParticipantId>,

    /// Configuration file path
    #[arg(short, long, env = "DUET_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gateway base URL
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Model of participant 1
    #[arg(long, value_name = "MODEL")]
    model_a: Option<String>,

    /// Model of participant 2
    #[arg(long, value_name = "MODEL")]
    model_b: Option<String>,

    /// Schedule the peer's turn after every reply
    #[arg(long)]
    auto_advance: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.backend_url {
            overrides = overrides.with_backend_url(url.clone());
        }
        if let Some(ref topic) = self.topic {
            overrides = overrides.with_topic(topic.clone());
        }
        if let Some(first) = self.first {
            overrides = overrides.with_first(first);
        }
        if let Some(ref model) = self.model_a {
            overrides = overrides.with_model_a(model.clone());
        }
        if let Some(ref model) = self.model_b {
            overrides = overrides.with_model_b(model.clone());
        }
        if self.auto_advance {
            overrides = overrides.with_auto_advance(true);
        }
        overrides
    }
}

fn parse_participant(value: &str) -> Result<ParticipantId, String> {
    ParticipantId::from_number(value).ok_or_else(|| format!("expected 1 or 2, got '{value}'"))
}

/// Log to a file when `DUET_LOG` is set; the terminal belongs to the UI
fn init_logging() -> anyhow::Result<()> {
    if std::env::var_os("DUET_LOG").is_none() {
        return Ok(());
    }

    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("duet");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {dir:?}"))?;
    let path = dir.join("duet.log");
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create log file: {path:?}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("duet_conductor=info".parse()?)
                .add_directive("duet_tui=info".parse()?),
        )
        .init();

    tracing::info!(path = ?path, "Logging started");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging()?;

    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;
    let overrides = args.overrides();
    if !overrides.is_empty() {
        overrides.apply(&mut config);
    }
    tracing::info!(
        source = ?config.source(),
        base_url = %config.backend.base_url,
        "Configuration loaded"
    );

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: duet requires a terminal (TTY)");
        eprintln!("Run it interactively, or with `ssh -t` over SSH.");
        std::process::exit(1);
    }

    // Restore the terminal before printing a panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(&config);
    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(goodbye) = app.goodbye() {
        println!("{goodbye}");
    }

    result
}
