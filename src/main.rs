use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use genchat_core::config::constants::env as env_vars;
use genchat_core::{ChatConfig, Conversation, GeminiClient, Participant, SharedConfig};

#[derive(Parser, Debug)]
#[command(name = "genchat", version, about = "Chat with Gemini from the terminal")]
struct Cli {
    /// Override the configured model, e.g. gemini-2.5-pro
    #[arg(long)]
    model: Option<String>,

    /// Path to a genchat.toml config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wait for complete responses instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// API key env var to read (checks this, then GOOGLE_API_KEY)
    #[arg(long, default_value = env_vars::GEMINI_API_KEY)]
    api_key_env: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Cli::parse();

    let api_key = std::env::var(&args.api_key_env)
        .or_else(|_| std::env::var(env_vars::GOOGLE_API_KEY))
        .context("Set GEMINI_API_KEY or GOOGLE_API_KEY in your environment")?;

    let mut config = ChatConfig::load_or_default(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model = model;
    }
    debug!(model = config.model.as_str(), "configuration loaded");
    let config = SharedConfig::new(config);
    let client = Arc::new(GeminiClient::new(api_key));
    let conversation = Conversation::new(client, config);

    println!(
        "{}\n{}\n",
        style("Chat with Gemini").cyan().bold(),
        style("/new starts over, /quit exits, ctrl-c stops a streaming response").dim()
    );

    let stdin = io::stdin();
    loop {
        print!("{} ", style("You:").blue().bold());
        io::stdout().flush().ok();

        let mut buf = String::new();
        if stdin.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" => break,
            "/new" => {
                conversation.start_new_chat();
                println!("{}\n", style("Started a new chat.").dim());
                continue;
            }
            _ => {}
        }

        conversation.send_message(line, !args.no_stream);
        render_response(&conversation).await;
    }

    Ok(())
}

/// Print the system response as it lands in the log, until the conversation
/// goes idle. Ctrl-c stops the in-flight response without exiting.
async fn render_response(conversation: &Conversation) {
    let mut updates = conversation.subscribe();
    let mut printed = 0usize;

    print!("{} ", style("Gemini:").yellow().bold());
    io::stdout().flush().ok();

    loop {
        let snapshot = updates.borrow_and_update().clone();

        if let Some(last) = snapshot.messages.last() {
            if last.participant == Participant::System && last.content.len() > printed {
                print!("{}", &last.content[printed..]);
                io::stdout().flush().ok();
                printed = last.content.len();
            }
        }

        if !snapshot.busy {
            match &snapshot.error {
                Some(err) => println!("{} {err}\n", style("error:").red().bold()),
                None => println!("\n"),
            }
            return;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                conversation.stop();
                println!(" {}\n", style("(stopped)").dim());
                return;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}
