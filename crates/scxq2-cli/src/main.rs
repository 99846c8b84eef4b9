//! SCXQ2 CLI - canonical hashing, stream codec, replay verification, and gateway dispatch.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod errors;
mod output;

use commands::{canonicalize, decode, dispatch, encode, hash, inspect, verify};

#[derive(Parser)]
#[command(name = "scxq2")]
#[command(about = "SCXQ2 capture stream, proof hash, and sealed-compute gateway CLI")]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the canonical text of input JSON
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
    },
    /// Hash input JSON as a proof hash
    Hash {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
        /// Project the input onto the pack proof payload first
        #[arg(long, conflicts_with = "infer")]
        pack: bool,
        /// Project the input onto the infer proof payload first
        #[arg(long)]
        infer: bool,
    },
    /// Replay-verify an exported stream (JSON frames or GGL1 binary)
    Verify {
        /// Stream file
        stream: String,
        /// Also recompute every chain link
        #[arg(long)]
        chain: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Encode JSON frames as a GGL1 binary stream
    Encode {
        /// Input JSON frames (array or {frames})
        input: String,
        /// Output file
        #[arg(short, long)]
        output: String,
    },
    /// Decode a GGL1 binary stream to JSON frames
    Decode {
        /// Binary stream file
        input: String,
        /// Stop at a truncated record instead of failing
        #[arg(long)]
        permissive: bool,
    },
    /// Summarize the lanes, dictionary, and records of a GGL1 stream
    Inspect {
        /// Binary stream file
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one call through a manifest-configured gateway
    Dispatch {
        /// Manifest JSON with a kuhul_server block
        #[arg(long)]
        manifest: String,
        /// Gateway config JSON
        #[arg(long)]
        config: Option<String>,
        /// Override the session id
        #[arg(long)]
        session_id: Option<String>,
        /// Broadcast captures to every open stream
        #[arg(long)]
        broadcast: bool,
        /// Request method
        #[arg(long, default_value = "POST")]
        method: String,
        /// Route path
        path: String,
        /// Request body JSON file (or empty body if not provided)
        #[arg(long)]
        body: Option<String>,
        /// Also print the captured frames
        #[arg(long)]
        frames: bool,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Canonicalize { input } => canonicalize::run(input),
        Commands::Hash { input, pack, infer } => hash::run(input, pack, infer),
        Commands::Verify {
            stream,
            chain,
            json,
        } => verify::run(stream, chain, json),
        Commands::Encode { input, output } => encode::run(input, output),
        Commands::Decode { input, permissive } => decode::run(input, permissive),
        Commands::Inspect { input, json } => inspect::run(input, json),
        Commands::Dispatch {
            manifest,
            config,
            session_id,
            broadcast,
            method,
            path,
            body,
            frames,
        } => dispatch::run(dispatch::DispatchArgs {
            manifest,
            config,
            session_id,
            broadcast,
            method,
            path,
            body,
            frames,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
