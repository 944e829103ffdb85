use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tutorbot_core::config::{self, Config};
use tutorbot_core::service::http::{serve, AppState};
use tutorbot_core::util::http::build_client;

#[derive(Parser)]
#[command(
    name = "tutorbot",
    about = "LINE tutoring bot: webhook server and tools",
    version = tutorbot_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Path to a JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Emit logs as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show which settings are configured
    Status {
        /// Path to a JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            config,
            json,
        } => {
            init_tracing(json)?;
            cmd_serve(host, port, config.as_deref()).await?
        }
        Commands::Status { config } => cmd_status(config.as_deref())?,
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("tutorbot=info".parse()?)
        .add_directive("tutorbot_core=info".parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

// ====== Commands ======

async fn cmd_serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut cfg = config::load_config_from_env(config_path)?;
    if let Some(host) = host {
        cfg.server.host = host;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    cfg.validate()?;

    let http = build_client()?;
    let state = Arc::new(AppState::from_config(&cfg, http));
    let addr = cfg.bind_addr();

    tracing::info!(
        "tutorbot v{} starting (model: {})",
        tutorbot_core::VERSION,
        cfg.ai.model
    );
    serve(&addr, state).await
}

fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::get_config_path);
    let cfg = config::load_config_from_env(config_path)?;

    println!("tutorbot Status\n");
    println!(
        "Config: {} {}",
        path.display(),
        if path.exists() { "✓" } else { "✗" }
    );
    println!("Listen: {}", cfg.bind_addr());
    println!("Model: {}", cfg.ai.model);
    println!();

    for (name, value) in settings(&cfg) {
        println!("{}: {}", name, if value.is_empty() { "not set" } else { "✓" });
    }

    match cfg.validate() {
        Ok(()) => println!("\nReady to serve."),
        Err(e) => println!("\n{e}"),
    }
    Ok(())
}

fn settings(cfg: &Config) -> [(&'static str, &str); 8] {
    [
        ("LINE channel secret", &cfg.line.channel_secret),
        ("LINE access token", &cfg.line.channel_access_token),
        ("Sheet endpoint", &cfg.store.endpoint),
        ("OpenAI API key", &cfg.ai.api_key),
        ("Stripe secret key", &cfg.stripe.secret_key),
        ("Stripe price", &cfg.stripe.price_id),
        ("Stripe webhook secret", &cfg.stripe.webhook_secret),
        ("Checkout success URL", &cfg.stripe.success_url),
    ]
}
