//! # ai-assistant CLI (`ai`)
//!
//! Terminal front end for the assistant.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ai init` | Create the chat log file |
//! | `ai chat` | Interactive session |
//! | `ai ask "<message>"` | Single exchange, prints the reply |
//! | `ai history` | Print persisted exchanges |
//! | `ai context "<query>"` | Show which past exchanges would be recalled |
//! | `ai folder <path>` | Set the markdown folder used by file mode |
//!
//! ## Examples
//!
//! ```bash
//! ai init --config ./config/ai.toml
//! ai ask "what did we say about the weather?"
//! ai chat --verbose
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ai_assistant::chat_log::ChatLog;
use ai_assistant::config::{self, Config};
use ai_assistant::embedding::{create_provider, embed_or_empty, EmbeddingProvider};
use ai_assistant::files::FileHandler;
use ai_assistant::models::Role;
use ai_assistant::orchestrator::ChatOrchestrator;
use ai_assistant::retriever::ContextRetriever;

/// A local chat client that recalls its own history.
#[derive(Parser)]
#[command(name = "ai", version, about = "A local chat client that recalls its own history")]
struct Cli {
    /// Path to configuration file (TOML). Defaults to `./config/ai.toml`;
    /// built-in defaults are used when that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline events at debug level to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the chat log file if it does not exist.
    Init,

    /// Start an interactive chat.
    ///
    /// In-chat commands: `/files on|off`, `/web on|off`, `/folder <path>`, `/quit`.
    Chat {
        /// Start with file mode enabled.
        #[arg(long)]
        files: bool,

        /// Start with web search enabled.
        #[arg(long)]
        web: bool,
    },

    /// Send a single message and print the reply.
    Ask {
        message: String,

        #[arg(long)]
        files: bool,

        #[arg(long)]
        web: bool,
    },

    /// Print persisted exchanges, oldest first.
    History {
        /// Only show the most recent N entries.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the past exchanges that would be recalled for a query.
    Context { query: String },

    /// Set and remember the markdown folder for file mode.
    Folder { path: PathBuf },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let cfg = config::load_config_or_default(&config_path, explicit)?;

    match cli.command {
        Commands::Init => {
            let log = ChatLog::from_config(&cfg.log);
            log.ensure_exists()?;
            println!("Chat log ready: {}", log.path().display());
        }
        Commands::Chat { files, web } => run_chat(&cfg, files, web).await?,
        Commands::Ask {
            message,
            files,
            web,
        } => {
            let mut orch = ChatOrchestrator::from_config(&cfg)?;
            enable_features(&mut orch, files, web);
            if let Some(reply) = orch.send_message(&message).await {
                println!("{}", reply);
            }
            orch.finalize();
        }
        Commands::History { limit } => run_history(&cfg, limit)?,
        Commands::Context { query } => run_context(&cfg, &query).await?,
        Commands::Folder { path } => {
            let mut handler = FileHandler::new(&cfg.files);
            handler
                .save_local_folder(&path)
                .with_context(|| format!("Failed to set local folder: {}", path.display()))?;
            println!("Local folder set to: {}", path.display());
        }
    }

    Ok(())
}

fn enable_features(orch: &mut ChatOrchestrator, files: bool, web: bool) {
    if files {
        if let Some(warning) = orch.toggle_file_mode(true) {
            eprintln!("Warning: {}", warning);
        }
    }
    if web {
        orch.toggle_web_search(true);
    }
}

async fn run_chat(cfg: &Config, files: bool, web: bool) -> Result<()> {
    let mut orch = ChatOrchestrator::from_config(cfg)?;
    enable_features(&mut orch, files, web);

    println!("Chat with Ai. Type /quit to exit.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        if let Some(command) = input.strip_prefix('/') {
            if !handle_command(&mut orch, command) {
                break;
            }
            continue;
        }

        if let Some(reply) = orch.send_message(&line).await {
            println!("Ai: {}\n", reply);
        }
    }

    orch.finalize();
    Ok(())
}

/// Apply an in-chat command. Returns `false` when the chat should end.
fn handle_command(orch: &mut ChatOrchestrator, command: &str) -> bool {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));

    match (name, arg) {
        ("quit" | "exit", _) => return false,
        ("files", "on") => match orch.toggle_file_mode(true) {
            Some(warning) => println!("Warning: {}", warning),
            None => println!("File mode enabled."),
        },
        ("files", "off") => {
            orch.toggle_file_mode(false);
            println!("File mode disabled.");
        }
        ("web", "on") => {
            orch.toggle_web_search(true);
            println!("Web search enabled.");
        }
        ("web", "off") => {
            orch.toggle_web_search(false);
            println!("Web search disabled.");
        }
        ("folder", path) if !path.is_empty() => {
            match orch.set_local_folder(std::path::Path::new(path)) {
                Ok(()) => println!("Local folder set to: {}", path),
                Err(e) => println!("Warning: {}", e),
            }
        }
        _ => println!("Commands: /files on|off, /web on|off, /folder <path>, /quit"),
    }
    true
}

fn run_history(cfg: &Config, limit: Option<usize>) -> Result<()> {
    let log = ChatLog::from_config(&cfg.log);
    let entries = log.try_load_all()?;

    if entries.is_empty() {
        println!("No history.");
        return Ok(());
    }

    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in entries.iter().skip(skip) {
        println!("[{}]", entry.timestamp);
        for turn in &entry.conversation {
            let speaker = match turn.role {
                Role::User => "You",
                Role::Assistant => "Ai",
                Role::System => "System",
            };
            println!("  {}: {}", speaker, turn.content);
        }
    }

    Ok(())
}

async fn run_context(cfg: &Config, query: &str) -> Result<()> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&cfg.embedding)?);
    let log = ChatLog::from_config(&cfg.log);
    let retriever = ContextRetriever::new(embedder.clone(), log.clone(), &cfg.retrieval);

    let query_embedding = embed_or_empty(embedder.as_ref(), query).await;
    if query_embedding.is_empty() {
        println!("Embeddings unavailable; no history can be recalled.");
        return Ok(());
    }

    let matches = retriever
        .rank_matches(&query_embedding, &log.load_all())
        .await;
    if matches.is_empty() {
        println!("No relevant history.");
        return Ok(());
    }

    for m in &matches {
        println!("{:.3}  {}", m.similarity, ai_assistant::retriever::format_match(m));
    }

    Ok(())
}
