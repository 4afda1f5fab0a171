//! cosmos-chat: interactive CosmosRP chat client
//!
//! Usage:
//!   cosmos-chat                   - Start an interactive chat session
//!   cosmos-chat --config <path>   - Use a specific config file
//!   cosmos-chat --help            - Show help

mod cli;
mod setup;

use cosmos_core::{ChatClient, Config, CustomizationLoader, SessionStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Interactive chat, optionally with an explicit config file
    Chat { config_path: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match parse_args(&args)? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("cosmos-chat {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Chat { config_path } => config_path,
    };

    // Logs go to stderr so they stay out of the transcript
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Model: {}", config.llm.model);

    let store = SessionStore::new(&config.session.data_dir);
    store.bootstrap()?;

    let customization = CustomizationLoader::new(&config.session.customization_dir);
    if customization.bootstrap()? {
        println!(
            "Created '{}' folder. See {}/README.txt to customize the bot.",
            customization.dir().display(),
            customization.dir().display()
        );
    }

    let client = ChatClient::new(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to create chat client: {}", e))?;

    println!("The Bot is Ready to use!");

    let mut console = setup::ReedlineConsole::new();
    let Some(session) = setup::open_session(
        &mut console,
        &store,
        &customization,
        config.session.max_history,
    )?
    else {
        println!("\nGoodbye!\n");
        return Ok(());
    };

    cli::run_chat(client, session, &config.chat).await
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> anyhow::Result<RunMode> {
    let mut config_path = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{} requires a path", arg))?;
                config_path = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Chat { config_path })
}

/// Print help message
fn print_help() {
    println!("cosmos-chat - CosmosRP chat client");
    println!();
    println!("Usage:");
    println!("  cosmos-chat                  Start an interactive chat session");
    println!("  cosmos-chat --config <path>  Read settings from <path>");
    println!("  cosmos-chat --help           Show this help message");
    println!("  cosmos-chat --version        Show version");
    println!();
    println!("Settings are read from ./cosmos-chat.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  COSMOS_API_KEY            API key (required)");
    println!("  COSMOS_MODEL              Model name (default: cosmosrp)");
    println!("  COSMOS_BASE_URL           API base URL (default: https://api.pawan.krd/cosmosrp-it/v1)");
    println!("  COSMOS_TIMEOUT_SECS       Request timeout, 0 disables (default: 120)");
    println!("  COSMOS_DATA_DIR           Session directory (default: data)");
    println!("  COSMOS_CUSTOMIZATION_DIR  Customization directory (default: customization)");
    println!("  COSMOS_MAX_HISTORY        Messages sent per request (default: 20)");
    println!("  COSMOS_SHOW_PAYLOAD       Print each request payload (default: false)");
    println!("  RUST_LOG                  Log filter (default: warn)");
}
