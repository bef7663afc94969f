//! # Greyline — agent-side notification and task service
//!
//! Standalone terminal tool around the agent core: loads the credential
//! file and settings, starts the background task server, and drives the
//! grey-zone pipeline interactively.
//!
//! Usage:
//!   greyline                                  # interactive session
//!   greyline --config ./agent.conf            # explicit credential file
//!   greyline send "message" --platform wechat # one-shot notification

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use greyline_channels::Dispatcher;
use greyline_core::{AgentSettings, ChannelKind, MessageStyle, NotifyStore, PipelineDetail};
use greyline_server::{ActionRegistry, AgentContext, PipelineRunner};

#[derive(Parser)]
#[command(name = "greyline", version, about = "Greyline agent — notifications and background tasks")]
struct Cli {
    /// Credential file (flat KEY=VALUE)
    #[arg(short, long, default_value_t = default_config_path())]
    config: String,

    /// Settings file (TOML)
    #[arg(long, default_value_t = default_settings_path())]
    settings: String,

    /// Pipeline endpoint the grey-zone action posts to
    #[arg(long)]
    pipeline_url: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send a one-shot notification and exit
    Send {
        /// Message text
        message: String,
        /// Preferred channel (telegram or wechat)
        #[arg(long)]
        platform: Option<String>,
        /// Send as markdown where the channel supports it
        #[arg(long)]
        markdown: bool,
    },
}

fn default_config_path() -> String {
    NotifyStore::default_path().to_string_lossy().into_owned()
}

fn default_settings_path() -> String {
    AgentSettings::default_path().to_string_lossy().into_owned()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "greyline=debug,greyline_core=debug,greyline_channels=debug,greyline_server=debug"
    } else {
        "greyline=info,greyline_core=info,greyline_channels=info,greyline_server=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = shellexpand::tilde(&cli.config).into_owned();
    let settings_path = shellexpand::tilde(&cli.settings).into_owned();

    let store = Arc::new(NotifyStore::new());
    if !store.load(std::path::Path::new(&config_path)) {
        tracing::warn!("no notification channel configured; dispatch will fail until one is set");
    }
    let settings = AgentSettings::load_from(std::path::Path::new(&settings_path))?;

    if let Some(Command::Send { message, platform, markdown }) = cli.command {
        return send_once(store, &message, platform.as_deref(), markdown).await;
    }

    let mut ctx = AgentContext::new(store, settings.server);
    if let Some(url) = cli.pipeline_url {
        ctx = ctx.with_pipeline(http_pipeline_runner(url));
    }
    let registry = ActionRegistry::with_builtins();

    ctx.server.start();
    run_repl(&ctx, &registry).await;
    ctx.server.stop().await;
    Ok(())
}

/// One-shot notification through the fallback dispatcher.
async fn send_once(
    store: Arc<NotifyStore>,
    message: &str,
    platform: Option<&str>,
    markdown: bool,
) -> Result<()> {
    let preferred = match platform {
        Some(name) => Some(
            ChannelKind::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown platform '{name}'"))?,
        ),
        None => store.default_channel(),
    };
    let style = if markdown { MessageStyle::Markdown } else { MessageStyle::Text };
    let dispatcher = Dispatcher::new(store);
    let report = dispatcher.dispatch(message, style, preferred).await;
    match report.delivered {
        Some(kind) => {
            println!("delivered via {kind}");
            Ok(())
        }
        None => anyhow::bail!("delivery failed ({} channel(s) tried)", report.attempted.len()),
    }
}

/// Pipeline runner over HTTP: POSTs the entry + override map to the
/// collaborator endpoint and decodes the reported detail.
fn http_pipeline_runner(url: String) -> PipelineRunner {
    let client = reqwest::Client::new();
    Arc::new(move |entry, pipeline_override| {
        let client = client.clone();
        let url = url.clone();
        Box::pin(async move {
            let resp = client
                .post(&url)
                .json(&serde_json::json!({
                    "entry": entry,
                    "pipeline_override": pipeline_override,
                }))
                .timeout(std::time::Duration::from_secs(30))
                .send()
                .await
                .map_err(|e| {
                    greyline_core::AgentError::Task(format!("pipeline endpoint unreachable: {e}"))
                })?;
            if !resp.status().is_success() {
                return Err(greyline_core::AgentError::Task(format!(
                    "pipeline endpoint returned {}",
                    resp.status()
                )));
            }
            resp.json::<PipelineDetail>().await.map_err(|e| {
                greyline_core::AgentError::Task(format!("invalid pipeline detail: {e}"))
            })
        })
    })
}

async fn run_repl(ctx: &AgentContext, registry: &ActionRegistry) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    println!("greyline interactive session — type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::warn!("stdin error: {e}");
                break;
            }
        };
        let line = line.trim();
        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "help" => {
                println!("commands:");
                println!("  start [json]   run the grey-zone pipeline (optional override map)");
                println!("  status         show server status and recent outcomes");
                println!("  hello          submit a liveness task");
                println!("  notify <msg>   dispatch a notification");
                println!("  stop           stop the background server");
                println!("  quit           stop and exit");
            }
            "start" => {
                let raw = if rest.is_empty() {
                    None
                } else {
                    match serde_json::from_str::<serde_json::Value>(rest) {
                        Ok(v) => Some(serde_json::json!({ "parameters": v })),
                        Err(e) => {
                            println!("override is not valid JSON: {e}");
                            continue;
                        }
                    }
                };
                let ok = registry.invoke(ctx, "grey_zone.run", raw.as_ref()).await;
                println!("grey zone run: {}", if ok { "ok" } else { "failed" });
            }
            "status" => {
                let ok = registry.invoke(ctx, "server.status", None).await;
                if !ok {
                    println!("status query failed");
                }
            }
            "hello" => {
                let ok = registry.invoke(ctx, "server.hello", None).await;
                println!("hello: {}", if ok { "queued" } else { "failed" });
            }
            "notify" => {
                if rest.is_empty() {
                    println!("usage: notify <message>");
                    continue;
                }
                let ok = registry
                    .invoke(ctx, "ext_notify", Some(&serde_json::json!(rest)))
                    .await;
                println!("notify: {}", if ok { "delivered" } else { "failed" });
            }
            "stop" => {
                ctx.server.stop().await;
                println!("server stopped");
            }
            "quit" | "exit" => break,
            other => println!("unknown command '{other}', try 'help'"),
        }
    }
}
