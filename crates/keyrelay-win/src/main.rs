//! `keyrelay-replay`: runs a recorded keyboard trace through the pipeline.
//!
//! The binary builds a [`KeyboardPipeline`](keyrelay_win::KeyboardPipeline)
//! around scripted host adapters and a simulated framework, feeds it the
//! trace's messages, and prints what the framework received and which
//! messages the pipeline re-injected into the host queue.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- pipeline + logging settings
//!  └─ load_trace()             -- messages, key states, framework policy
//!  └─ run_trace()
//!       ├─ ScriptedMessageSource   (host queue + translation)
//!       ├─ ScriptedKeyboard        (GetKeyState / MapVirtualKey)
//!       └─ SimulatedFramework      (answers on tokio tasks)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keyrelay_win::infrastructure::framework::simulator::TranscriptEntry;
use keyrelay_win::infrastructure::replay::{load_trace, run_trace, ReplayReport};
use keyrelay_win::infrastructure::storage::config::{load_config, load_config_from, AppConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Replays a keyboard trace through the KeyRelay pipeline.
#[derive(Debug, Parser)]
#[command(
    name = "keyrelay-replay",
    about = "Replay a recorded keyboard trace through the KeyRelay pipeline",
    version
)]
struct Cli {
    /// Trace file (TOML) to replay.
    #[arg(long, short)]
    trace: PathBuf,

    /// Configuration file. Defaults to the platform config directory.
    #[arg(long, env = "KEYRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Print the transcript as JSON instead of one line per entry.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => load_config().context("loading config")?,
        };
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let trace = load_trace(&cli.trace)
        .with_context(|| format!("loading trace {}", cli.trace.display()))?;
    info!(trace = %cli.trace.display(), "KeyRelay replay starting");

    let report = run_trace(&trace, &config.pipeline).await?;

    if cli.json {
        print_json(&report)?;
    } else {
        print_text(&report);
    }
    Ok(())
}

fn print_json(report: &ReplayReport) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "transcript": report.transcript,
        "injected": report.injected,
        "host_default": report.host_default_count,
        "unanswered": report.unanswered,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(report: &ReplayReport) {
    for entry in &report.transcript {
        match entry {
            TranscriptEntry::KeyEvent(event) => println!(
                "event   {:?} physical={:#x} logical={:#x} character={:?}{}",
                event.event_type,
                event.physical,
                event.logical,
                event.character.as_deref().unwrap_or(""),
                if event.synthesized { " (synthesized)" } else { "" },
            ),
            TranscriptEntry::ChannelMessage { channel, message } => println!(
                "channel {channel} {:?} key_code={:#04x} scan_code={:#04x} modifiers={:#x}",
                message.event_type, message.key_code, message.scan_code, message.modifiers,
            ),
            TranscriptEntry::Text { text } => println!("text    {text:?}"),
        }
    }
    for message in &report.injected {
        println!(
            "inject  {:?} {:?} vk={:#04x} scan={:#04x}",
            message.origin, message.class, message.code, message.scan_code,
        );
    }
    println!(
        "{} host-default message(s), {} unanswered occurrence(s)",
        report.host_default_count, report.unanswered
    );
}
