//! Subcommand bodies.  Each returns the process exit code; output goes to the
//! writer it is handed so the commands can be exercised without a terminal.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use proofline_chain::verify_ledgers;
use proofline_contracts::{
    chain::{ChainIntegrityReport, Ledger},
    error::ProoflineError,
    policy::PolicyPreset,
    result::VerificationResult,
};
use proofline_core::{canonicalize_value, sha256, signature::decode_base64};
use proofline_policy::VerifierPolicy;
use proofline_verify::{MediaSource, ProofJob, ProofOutcome, ProofVerifier};

use crate::error::{CliError, CliResult};

/// Every proof verified or anchor-verified, every chain free of errors.
pub const EXIT_OK: i32 = 0;
/// The command could not run.
pub const EXIT_ERROR: i32 = 1;
/// The command ran and at least one subject did not verify.
pub const EXIT_NOT_VERIFIED: i32 = 2;

// ── verify ────────────────────────────────────────────────────────────────────

pub struct VerifyArgs {
    pub path: PathBuf,
    pub media: Option<PathBuf>,
    pub preset: Option<PolicyPreset>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

pub fn verify(args: &VerifyArgs, out: &mut dyn Write) -> CliResult<i32> {
    let mut policy = match &args.config {
        Some(path) => VerifierPolicy::from_file(path)?,
        None => VerifierPolicy::default(),
    };
    if let Some(preset) = args.preset {
        policy = policy.with_preset(preset);
    }
    let verifier = ProofVerifier::new(policy)?;

    let jobs = if args.path.is_dir() {
        if args.media.is_some() {
            return Err(CliError::MediaWithDirectory {
                path: args.path.clone(),
            });
        }
        directory_jobs(&args.path)?
    } else {
        vec![single_job(&args.path, args.media.as_deref())?]
    };
    info!(proofs = jobs.len(), "verifying");

    let outcomes = verifier.verify_many(&jobs, None);
    if args.json {
        let rendered: Vec<Value> = outcomes.iter().map(outcome_json).collect();
        serde_json::to_writer_pretty(&mut *out, &rendered).map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        for outcome in &outcomes {
            write_outcome(out, outcome)?;
        }
    }

    let all_positive = outcomes
        .iter()
        .all(|o| matches!(&o.result, Ok(result) if result.status.is_positive()));
    Ok(if all_positive { EXIT_OK } else { EXIT_NOT_VERIFIED })
}

/// The job for one proof file.  Media is streamed from disk when the job
/// runs; only its presence is checked here.
fn single_job(path: &Path, media: Option<&Path>) -> CliResult<ProofJob> {
    let media = match media {
        Some(media) => {
            let metadata = fs::metadata(media).map_err(|source| CliError::Read {
                path: media.to_path_buf(),
                source,
            })?;
            debug!(media = %media.display(), bytes = metadata.len(), "media file found");
            Some(MediaSource::File(media.to_path_buf()))
        }
        None => None,
    };
    Ok(ProofJob {
        name: path.display().to_string(),
        text: read_text(path)?,
        media,
    })
}

/// One job per `*.json` file directly inside `dir`, in file-name order.
fn directory_jobs(dir: &Path) -> CliResult<Vec<ProofJob>> {
    let entries = fs::read_dir(dir).map_err(|source| CliError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| CliError::Read {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(CliError::EmptyDirectory {
            path: dir.to_path_buf(),
        });
    }
    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "proof files found");

    paths
        .iter()
        .map(|path| {
            Ok(ProofJob {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                text: read_text(path)?,
                media: None,
            })
        })
        .collect()
}

fn write_outcome(out: &mut dyn Write, outcome: &ProofOutcome) -> std::io::Result<()> {
    match &outcome.result {
        Ok(result) => write_result(out, &outcome.name, result),
        Err(e) => writeln!(out, "{}: failed to verify: {e}", outcome.name),
    }
}

fn write_result(out: &mut dyn Write, name: &str, result: &VerificationResult) -> std::io::Result<()> {
    writeln!(out, "{name}: {}", result.status)?;
    for check in &result.checks {
        writeln!(
            out,
            "  {:<22} {:<8} {}",
            check.id.label(),
            check.status.to_string(),
            check.detail
        )?;
    }
    let display = &result.display;
    let fields = [
        ("captured", &display.capture_time),
        ("device", &display.device_model),
        ("signer", &display.signer_name),
        ("tsa", &display.tsa_service),
        ("tsa time", &display.tsa_time),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            writeln!(out, "  {label:<10} {value}")?;
        }
    }
    if display.human_attested {
        writeln!(out, "  {:<10} yes", "attested")?;
    }
    Ok(())
}

fn outcome_json(outcome: &ProofOutcome) -> Value {
    match &outcome.result {
        Ok(result) => json!({ "name": outcome.name, "result": result }),
        Err(e) => json!({ "name": outcome.name, "error": e.to_string() }),
    }
}

// ── chain ─────────────────────────────────────────────────────────────────────

/// A ledger file: one exported `Ledger`, or any mix of records from several
/// chains.  Records stay raw JSON until partitioned so their digests cover
/// exactly what was stored.
#[derive(Deserialize)]
struct LedgerFile {
    events: Vec<Value>,
    #[serde(default)]
    tombstones: Vec<Value>,
}

pub struct ChainArgs {
    pub ledger: PathBuf,
    pub pin_key: Option<String>,
    pub json: bool,
}

pub fn chain(args: &ChainArgs, out: &mut dyn Write) -> CliResult<i32> {
    let text = read_text(&args.ledger)?;
    let file: LedgerFile = serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: args.ledger.clone(),
        source,
    })?;
    let pinned = args
        .pin_key
        .as_deref()
        .map(|key| {
            decode_base64(key).map_err(|e| ProoflineError::InvalidPublicKey {
                reason: format!("--pin-key is not base64: {e}"),
            })
        })
        .transpose()?;

    let ledgers = Ledger::partition_stored(file.events, file.tombstones)?;
    let reports = verify_ledgers(&ledgers, pinned.as_deref());

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &reports).map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        for report in &reports {
            write_report(out, report)?;
        }
    }

    Ok(if reports.iter().all(|r| r.valid_ignoring_warnings) {
        EXIT_OK
    } else {
        EXIT_NOT_VERIFIED
    })
}

fn write_report(out: &mut dyn Write, report: &ChainIntegrityReport) -> std::io::Result<()> {
    let verdict = if report.valid {
        "intact"
    } else if report.valid_ignoring_warnings {
        "intact with warnings"
    } else {
        "broken"
    };
    writeln!(
        out,
        "{}: {verdict} ({} events, {} tombstones, {} invalidated)",
        report.chain_id, report.events_checked, report.tombstones_checked, report.invalidated_events
    )?;
    for issue in &report.issues {
        writeln!(
            out,
            "  {:?} {:?} #{} {}: {}",
            issue.severity, issue.record, issue.index, issue.record_id, issue.message
        )?;
    }
    Ok(())
}

// ── canonicalize ──────────────────────────────────────────────────────────────

pub fn canonicalize(file: &Path, out: &mut dyn Write) -> CliResult<i32> {
    let text = read_text(file)?;
    let value: Value = serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: file.to_path_buf(),
        source,
    })?;
    let bytes = canonicalize_value(&value);
    out.write_all(&bytes)?;
    writeln!(out)?;
    writeln!(out, "{}", sha256(&bytes))?;
    Ok(EXIT_OK)
}

// ── Files ─────────────────────────────────────────────────────────────────────

fn read_text(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
