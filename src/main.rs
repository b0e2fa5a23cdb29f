//! SteveAI: terminal chat with rolling conversation memory

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::io::Write;
use steveai_agent::{ChatController, ChatEvent, ChatReply, ConversationId, ConversationRegistry, LlmSummarizer};
use steveai_core::{Error, Mode, SteveConfig};
use steveai_llm::A4fProvider;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "steveai", about = "SteveAI: chat with rolling conversation memory")]
struct Cli {
    /// Config file (default: ~/.steveai/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Where conversations are persisted (default: ~/.steveai/conversations)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Also write daily log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal
    Chat {
        /// Conversation to open or resume
        #[arg(long, default_value = "default")]
        conversation: String,
        /// Start a fresh conversation with a generated id
        #[arg(long, conflicts_with = "conversation")]
        new: bool,
        /// fast, chat, reasoning or general
        #[arg(short, long, default_value = "chat")]
        mode: Mode,
        /// Route replies through the router + specialists writer pipeline
        #[arg(long)]
        orchestrate: bool,
    },
    /// Write a persisted conversation as an export document
    Export {
        #[arg(long, default_value = "default")]
        conversation: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML (keys redacted)
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let home = steveai_home();
    let config_path = cli.config.unwrap_or_else(|| home.join("config.toml"));
    let data_dir = cli.data_dir.unwrap_or_else(|| home.join("conversations"));

    match cli.command {
        Some(Commands::Chat { conversation, new, mode, orchestrate }) => {
            let id = if new { ConversationId::generate() } else { ConversationId::new(conversation) };
            let mut config = SteveConfig::load(&config_path);
            config.orchestrator.enabled |= orchestrate;
            run_chat(config, data_dir, id, mode).await?;
        }
        Some(Commands::Export { conversation, output }) => {
            let config = SteveConfig::load(&config_path);
            export(config, data_dir, ConversationId::new(conversation), output).await?;
        }
        Some(Commands::Config) => {
            print!("{}", SteveConfig::load(&config_path).to_toml());
        }
        Some(Commands::Version) => {
            println!("steveai v{}", env!("CARGO_PKG_VERSION"));
        }
        // No subcommand = chat
        None => {
            run_chat(SteveConfig::load(&config_path), data_dir, ConversationId::new("default"), Mode::default())
                .await?;
        }
    }

    Ok(())
}

/// Stderr gets warnings unless `RUST_LOG` says otherwise; the optional log
/// directory gets a daily file at info level.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "steveai=warn".into()));

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "steveai.log"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("steveai=info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();
    Ok(guard)
}

fn steveai_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".steveai")
}

fn build_registry(config: &SteveConfig, data_dir: PathBuf) -> anyhow::Result<(Arc<A4fProvider>, Arc<ConversationRegistry>)> {
    let provider = Arc::new(A4fProvider::from_config(&config.api).context("building HTTP client")?);
    if provider.key_count() == 0 {
        warn!("No API keys configured; set STEVEAI_API_KEYS or api.api_keys");
    }
    let summarizer = Arc::new(LlmSummarizer::from_config(provider.clone(), config));
    let registry = ConversationRegistry::new(config.memory.clone(), summarizer).with_data_dir(data_dir);
    Ok((provider, Arc::new(registry)))
}

async fn run_chat(config: SteveConfig, data_dir: PathBuf, id: ConversationId, mode: Mode) -> anyhow::Result<()> {
    let (provider, registry) = build_registry(&config, data_dir)?;
    let opened = registry.get_or_load(&id)?;
    let held = opened.lock().await.turn_counter();
    drop(opened);

    let mut chat = ChatController::new(provider, registry, config).with_mode(mode);
    info!("Chat started for {} in {} mode", id, mode);

    let mut stdout = tokio::io::stdout();
    let banner = if held > 0 {
        format!("SteveAI ({} mode), resuming {} after {} turns. /help for commands, /quit to leave.\n", mode, id, held)
    } else {
        format!("SteveAI ({} mode), conversation {}. /help for commands, /quit to leave.\n", mode, id)
    };
    stdout.write_all(banner.as_bytes()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        let mut streamed = String::new();
        let result = chat
            .send_with(&id, line, |event| match event {
                ChatEvent::Delta(text) => {
                    if streamed.is_empty() {
                        print!("steve> {}", text.trim_start());
                    } else {
                        print!("{}", text);
                    }
                    streamed.push_str(text);
                    let _ = std::io::stdout().flush();
                }
                ChatEvent::Stage(stage) => println!("{}", stage.describe()),
            })
            .await;

        let output = match result {
            Ok(reply) => finish_output(&streamed, &reply),
            Err(Error::InvalidTurnInput(_)) => continue,
            Err(e) => format!("error: {}", e),
        };
        stdout.write_all(format!("{}\n", output).as_bytes()).await?;
    }

    stdout.write_all(b"\n").await?;
    Ok(())
}

fn render_reply(reply: &ChatReply) -> String {
    match reply {
        ChatReply::Text(text) => format!("steve> {}", text),
        ChatReply::Image { prompt, url: Some(url) } => format!("steve> 🖼️ {}\n{}", prompt, url),
        ChatReply::Image { prompt, url: None } => format!("steve> ⚠️ Image generation failed for \"{}\"", prompt),
        ChatReply::Notice(notice) => notice.clone(),
    }
}

/// What is left to print once a reply completes, given the text already
/// streamed to the terminal.
fn finish_output(streamed: &str, reply: &ChatReply) -> String {
    match reply {
        ChatReply::Text(text) if !streamed.is_empty() && text == streamed.trim() => String::new(),
        _ if streamed.is_empty() => render_reply(reply),
        _ => format!("\n{}", render_reply(reply)),
    }
}

async fn export(config: SteveConfig, data_dir: PathBuf, id: ConversationId, output: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, registry) = build_registry(&config, data_dir)?;
    let conversation = registry.get_or_load(&id)?;
    match output {
        Some(path) => {
            registry.export_to(&id, &path).await?;
            eprintln!("Wrote: {}", path.display());
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&conversation.export().await)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_chat() {
        let cli = Cli::try_parse_from(["steveai"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_chat_mode() {
        let cli = Cli::try_parse_from(["steveai", "chat", "--mode", "Reasoning", "--conversation", "work"]).unwrap();
        match cli.command {
            Some(Commands::Chat { conversation, new, mode, orchestrate }) => {
                assert_eq!(conversation, "work");
                assert!(!new);
                assert_eq!(mode, Mode::Reasoning);
                assert!(!orchestrate);
            }
            _ => panic!("Expected chat"),
        }
        assert!(Cli::try_parse_from(["steveai", "chat", "--mode", "turbo"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["steveai", "export", "--data-dir", "/tmp/convs", "-o", "out.json"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/convs")));
        assert!(matches!(cli.command, Some(Commands::Export { output: Some(_), .. })));
    }

    #[test]
    fn test_render_reply() {
        assert_eq!(render_reply(&ChatReply::Text("hi".into())), "steve> hi");
        assert_eq!(render_reply(&ChatReply::Notice("🧹 Chat cleared.".into())), "🧹 Chat cleared.");
        let image = ChatReply::Image { prompt: "fox".into(), url: Some("https://img.test/fox.png".into()) };
        assert!(render_reply(&image).ends_with("https://img.test/fox.png"));
        let failed = ChatReply::Image { prompt: "fox".into(), url: None };
        assert!(render_reply(&failed).contains("failed"));
    }

    #[test]
    fn test_finish_output_after_streaming() {
        let reply = ChatReply::Text("Hello there".into());
        assert_eq!(finish_output(" Hello there\n", &reply), "");
        assert_eq!(finish_output("", &reply), "steve> Hello there");

        let lost = ChatReply::Text("⚠️ Signal lost: stream error".into());
        assert_eq!(finish_output("partial", &lost), "\nsteve> ⚠️ Signal lost: stream error");

        let image = ChatReply::Image { prompt: "fox".into(), url: None };
        assert!(finish_output("Image Generated: fox", &image).starts_with("\nsteve> ⚠️"));
    }

    #[test]
    fn test_cli_chat_orchestrate_flag() {
        let cli = Cli::try_parse_from(["steveai", "chat", "--orchestrate"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Chat { orchestrate: true, .. })));
    }
}
