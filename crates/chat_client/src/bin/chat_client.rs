//! chat-client: terminal front end for a streaming `/chat` server.
//! One-shot with a message argument, interactive otherwise. Streamed replies
//! go to stdout; logs go to stderr.

use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::Context;
use chat_client::config::{self, Config};
use chat_client::{ChatSession, Client, SystemClipboard, TerminalView};
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chat-client", version, about, args_conflicts_with_subcommands = true)]
struct Args {
    /// Config file (default: ~/.chat-client/config.yaml).
    #[arg(long, env = "CHAT_CLIENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Server base URL, overriding the config file.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Model name sent with each message.
    #[arg(long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Send this message and exit instead of starting an interactive chat.
    message: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the document chunks the server has ingested.
    Documents,
    /// Upload a PDF for the server to ingest.
    Upload { file: PathBuf },
}

fn resolve_config_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    // --config flag or CHAT_CLIENT_CONFIG (clap reads both), then the default.
    if let Some(path) = flag {
        return Ok(path);
    }
    config::default_config_path()
        .context("unable to determine config path (set --config or CHAT_CLIENT_CONFIG)")
}

fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .filter(|&w| w > 0)
        .unwrap_or(80)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    match rt.block_on(run(args)) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether the run succeeded.
async fn run(args: Args) -> anyhow::Result<bool> {
    let config_path = resolve_config_path(args.config)?;
    let cfg: Config = config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let base_url = args.server.as_deref().unwrap_or(cfg.base_url());
    let client = Client::new(base_url)?.with_chat_path(cfg.chat_path());

    match args.command {
        Some(Command::Documents) => {
            let list = client.documents().await?;
            println!("{} chunks", list.total_chunks);
            for (i, doc) in list.documents.iter().enumerate() {
                println!("--- [{}]\n{}", i + 1, doc);
            }
            Ok(true)
        }
        Some(Command::Upload { file }) => {
            let receipt = client.upload_pdf(&file).await?;
            println!("{} ({} chunks)", receipt.message, receipt.chunks);
            Ok(true)
        }
        None => {
            let view = TerminalView::new(io::stdout(), terminal_width(), cfg.copy_feedback());
            let mut session = ChatSession::new(client, view);
            if let Some(model) = args.model.or_else(|| cfg.chat.model.clone()) {
                session = session.with_model(model);
            }

            if args.message.is_empty() {
                interactive(&mut session).await?;
                Ok(true)
            } else {
                let outcome = session.submit(&args.message.join(" ")).await;
                Ok(outcome.is_success())
            }
        }
    }
}

async fn interactive(session: &mut ChatSession<TerminalView<io::Stdout>>) -> anyhow::Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if let Some(rest) = line.strip_prefix("/copy") {
            copy_message(session.view_mut(), rest.trim());
            continue;
        }
        session.view_mut().transcript_mut().set_input(line);
        session.submit(line).await;
    }
    Ok(())
}

fn copy_message(view: &mut TerminalView<io::Stdout>, arg: &str) {
    let n = if arg.is_empty() { Some(1) } else { arg.parse().ok() };
    let id = n.and_then(|n| view.transcript().nth_from_end(n)).map(|m| m.id);
    let Some(id) = id else {
        view.notice("no such message");
        return;
    };
    let now = Instant::now();
    view.transcript_mut().copy(id, &SystemClipboard, now);
    let glyph = view
        .transcript()
        .get(id)
        .map(|m| m.copy_icon(now).glyph())
        .unwrap_or_default();
    view.notice(glyph);
}
