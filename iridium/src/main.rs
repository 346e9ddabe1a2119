//! Command-line event listener.
//!
//! Connects to the Gateway with the configured intents and logs every
//! dispatched event until interrupted. Ctrl-C closes the connection
//! gracefully; a fatal protocol error exits non-zero.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use iridium_gateway::{Client, ClientConfig, ShardId};
use iridium_model::Intents;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "iridium", version, about = "Listen to the Discord Gateway and log events")]
struct Args {
    /// Read the bot token from this environment variable instead of
    /// prompting for it.
    #[arg(long, value_name = "NAME")]
    env_token: Option<String>,

    #[command(flatten)]
    intents: IntentsArgs,

    /// Enable zlib-stream transport compression.
    #[arg(long)]
    zlib_stream: bool,

    /// Shard assignment.
    #[arg(long, value_name = "ID:TOTAL")]
    shard: Option<ShardId>,

    /// Gateway URL override, skipping the HTTP bootstrap.
    #[arg(long, value_name = "URL")]
    gateway_url: Option<String>,
}

#[derive(Debug, clap::Args)]
#[group(multiple = false)]
struct IntentsArgs {
    /// Request no intents.
    #[arg(long)]
    no_intents: bool,

    /// Request all non-privileged intents (the default).
    #[arg(long)]
    standard_intents: bool,

    /// Request all intents, privileged ones included.
    #[arg(long)]
    all_intents: bool,

    /// Request a raw intents bitfield.
    #[arg(long, value_name = "BITS")]
    intents: Option<u64>,
}

impl IntentsArgs {
    fn resolve(&self) -> Intents {
        if self.no_intents {
            Intents::empty()
        } else if self.all_intents {
            Intents::ALL
        } else if let Some(bits) = self.intents {
            Intents::from_bits_truncate(bits)
        } else {
            Intents::STANDARD
        }
    }
}

fn read_token(args: &Args) -> Result<String, String> {
    if let Some(name) = args.env_token.as_deref() {
        return std::env::var(name)
            .map_err(|_| format!("environment variable {name} is not set"));
    }

    eprint!("Bot token: ");
    let _ = io::stderr().flush();

    let mut token = String::new();
    io::stdin()
        .lock()
        .read_line(&mut token)
        .map_err(|e| format!("could not read token: {e}"))?;

    let token = token.trim().to_string();
    if token.is_empty() {
        return Err("no token provided".to_string());
    }
    Ok(token)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let token = match read_token(&args) {
        Ok(token) => token,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut config =
        ClientConfig::new(token, args.intents.resolve()).with_compress(args.zlib_stream);
    if let Some(shard) = args.shard {
        config = config.with_shard(shard);
    }
    if let Some(url) = args.gateway_url {
        config = config.with_gateway_url(url);
    }

    let client = Arc::new(Client::new(config));
    let (event_tx, event_rx) = flume::unbounded::<iridium_gateway::Dispatch>();

    let printer = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv_async().await {
            info!(event = %event.event, seq = event.sequence, "dispatch");
        }
    });

    {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, going offline");
                client.close();
            }
        });
    }

    let result = client.run(event_tx).await;
    let _ = printer.await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "gateway client failed");
            ExitCode::FAILURE
        }
    }
}
