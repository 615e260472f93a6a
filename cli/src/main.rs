//! Proofline command-line verifier.
//!
//! Verifies capture proof documents (one file or a directory of them) and
//! walks event ledgers for chain integrity.
//!
//! Usage:
//!   proofline verify proof.json --media photo.jpg
//!   proofline verify proofs/ --policy strict --json
//!   proofline chain ledger.json --pin-key <BASE64>
//!   proofline canonicalize event.json
//!
//! Exit status is 0 when everything verified, 2 when something did not, and
//! 1 when the command itself could not run.

mod commands;
mod error;

use std::{io, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use proofline_contracts::policy::PolicyPreset;

use crate::commands::{ChainArgs, VerifyArgs, EXIT_ERROR};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Proofline: verify signed capture proofs and event ledgers.
#[derive(Parser)]
#[command(
    name = "proofline",
    about = "Verify capture proofs and event ledgers",
    long_about = "Verifies capture proof documents (event digest, signature, media digest,\n\
                  Merkle inclusion, time-stamp token, invalidation) and walks event\n\
                  ledgers for hash-chain integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify one proof file, or every *.json file in a directory.
    Verify {
        path: PathBuf,
        /// Media file the proof's asset digest refers to.
        #[arg(long)]
        media: Option<PathBuf>,
        /// Policy preset for the time-stamp anchor.
        #[arg(long, value_enum)]
        policy: Option<PresetArg>,
        /// TOML verifier configuration.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Walk a ledger file for chain integrity.
    Chain {
        ledger: PathBuf,
        /// Base64 public key every record must be signed with.
        #[arg(long)]
        pin_key: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print the canonical bytes of a JSON file and their digest.
    Canonicalize { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Default,
    Strict,
    Permissive,
}

impl From<PresetArg> for PolicyPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Default => PolicyPreset::Default,
            PresetArg::Strict => PolicyPreset::Strict,
            PresetArg::Permissive => PolicyPreset::Permissive,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();

    let result = match cli.command {
        Command::Verify {
            path,
            media,
            policy,
            config,
            json,
        } => commands::verify(
            &VerifyArgs {
                path,
                media,
                preset: policy.map(PolicyPreset::from),
                config,
                json,
            },
            &mut stdout,
        ),
        Command::Chain {
            ledger,
            pin_key,
            json,
        } => commands::chain(
            &ChainArgs {
                ledger,
                pin_key,
                json,
            },
            &mut stdout,
        ),
        Command::Canonicalize { file } => commands::canonicalize(&file, &mut stdout),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("proofline: {e}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}
