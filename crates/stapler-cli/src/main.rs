use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod der;
mod input;
mod text;
mod verify;

/// Inspect, convert and verify OCSP responses.
#[derive(Parser)]
#[command(name = "stapler")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log verification steps (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an OCSP response in human-readable form.
    Text {
        /// Response file (DER or PEM).
        input: String,
    },
    /// Re-encode an OCSP response as canonical DER.
    Der {
        /// Response file (DER or PEM).
        input: String,
        /// Output file.
        #[arg(short, long)]
        output: String,
        /// Write PEM ("OCSP RESPONSE") instead of DER.
        #[arg(long)]
        pem: bool,
    },
    /// Verify an OCSP response signature against trusted CAs.
    Verify {
        /// Response file (DER or PEM).
        input: String,
        /// Trusted CA bundle (PEM, or a single DER certificate).
        #[arg(long = "CAfile")]
        ca_file: String,
        /// Peer certificate chain (PEM) offered as extra signer candidates.
        #[arg(long)]
        chain: Option<String>,
        /// Check certificate validity at this UNIX time instead of now.
        #[arg(long)]
        attime: Option<i64>,
        /// Maximum certificate chain depth.
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Text { input } => text::run(input),
        Commands::Der { input, output, pem } => der::run(input, output, *pem),
        Commands::Verify {
            input,
            ca_file,
            chain,
            attime,
            max_depth,
        } => verify::run(
            input,
            ca_file,
            &verify::Options {
                chain: chain.as_deref(),
                attime: *attime,
                max_depth: *max_depth,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
