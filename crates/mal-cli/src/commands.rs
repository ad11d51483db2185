use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use mal_commit::{CommitBatcher, CommitError, CommitReceipt};
use mal_store::RecordStore;
use mal_types::{Commit, Label, LeafId, LeafRecord};
use mal_verify::{AuditReport, SampledAudit, VerifyReport};
use serde::Serialize;

use crate::cli::*;
use crate::config::MalConfig;
use crate::state::{PendingAnchor, Workspace};

const SEED_CHUNK: usize = 1_000;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        format,
        state,
        ..
    } = cli;
    match command {
        Command::Seed(args) => cmd_seed(&state, args, &format),
        Command::Commit(args) => cmd_commit(&state, args, &format).await,
        Command::Verify(args) => cmd_verify(&state, args, &format).await,
        Command::Audit(args) => cmd_audit(&state, args, &format).await,
        Command::SampleIds(args) => cmd_sample_ids(&state, args, &format),
        Command::Show(args) => cmd_show(&state, args, &format),
        Command::Repair(args) => cmd_repair(&state, args, &format).await,
        Command::Simulate(args) => cmd_simulate(&state, args, &format).await,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn latest_label(store: &dyn RecordStore) -> anyhow::Result<Label> {
    match store.latest_commit()? {
        Some(commit) => Ok(commit.label),
        None => bail!("no commits yet; run `mal commit` first"),
    }
}

fn seed_records(
    store: &dyn RecordStore,
    count: usize,
    created_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut inserted = 0;
    while inserted < count {
        let n = SEED_CHUNK.min(count - inserted);
        let records: Vec<LeafRecord> = (0..n)
            .map(|_| LeafRecord::new(LeafId::random(), created_at))
            .collect();
        store.insert_records(&records)?;
        inserted += n;
        tracing::debug!(inserted, total = count, "seeded records");
    }
    Ok(())
}

fn cmd_seed(state: &Path, args: SeedArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    seed_records(ws.store.as_ref(), args.count, Utc::now())?;
    ws.save()?;

    match format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({ "ok": true, "inserted": args.count }))
        }
        OutputFormat::Text => {
            println!("{} Inserted {} records", "✓".green().bold(), args.count.to_string().bold());
            Ok(())
        }
    }
}

fn print_commit(commit: &Commit) {
    println!("  Period:  {}", commit.period.to_string().dimmed());
    println!("  Root:    {}", commit.root.to_hex().cyan());
    println!("  Anchor:  {}", commit.anchor_ref.as_str().yellow());
    println!("  Leaves:  {}", commit.leaf_count);
}

fn print_receipt(receipt: &CommitReceipt) {
    println!(
        "{} Commit {} anchored",
        "✓".green().bold(),
        receipt.commit.label.to_string().bold()
    );
    print_commit(&receipt.commit);
    println!("  Proofs:  {} rows in {} chunks", receipt.proof_rows, receipt.proof_chunks);
}

async fn cmd_commit(state: &Path, args: CommitArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let mut ws = Workspace::open(state)?;
    if let Some(days) = args.offset_days {
        ws.config.batcher.period_offset_days = Some(days);
    }
    let batcher = ws.batcher();

    let result = match (args.reference, ws.pending.clone()) {
        (Some(reference), Some(pending)) => {
            if reference != pending.reference.as_str() {
                bail!(
                    "commit {} is pending under reference {}, not {reference}",
                    pending.plan.label,
                    pending.reference
                );
            }
            batcher
                .adopt_anchor(&pending.plan, &pending.candidates, &pending.reference)
                .await
        }
        (Some(reference), None) => {
            bail!("no timed-out commit is pending under reference {reference}")
        }
        (None, Some(pending)) => bail!(
            "commit {} is still pending; finish it with `mal commit --reference {}`",
            pending.plan.label,
            pending.reference
        ),
        (None, None) => {
            let plan = batcher.plan(Utc::now())?;
            let candidates = ws.store.find_unlinked(&plan.period)?;
            let result = batcher.commit(&plan, &candidates).await;
            if let Err(CommitError::AnchorTimeout { reference, .. }) = &result {
                ws.pending = Some(PendingAnchor {
                    plan,
                    candidates,
                    reference: reference.clone(),
                });
            }
            result
        }
    };
    match &result {
        // The commit row exists; missing proofs are a `repair` away.
        Ok(_) | Err(CommitError::ProofPersistence { .. }) => ws.pending = None,
        Err(CommitError::AnchorTimeout { reference, .. }) => {
            tracing::warn!(
                reference = %reference,
                "rerun `mal commit --reference {reference}` once it confirms"
            );
        }
        Err(_) => {}
    }
    // The ledger may hold a transaction even when the commit failed.
    ws.save()?;
    let receipt = result.context("commit failed")?;

    match format {
        OutputFormat::Json => print_json(&receipt),
        OutputFormat::Text => {
            print_receipt(&receipt);
            Ok(())
        }
    }
}

fn print_verify_report(report: &VerifyReport) {
    for result in &report.results {
        let mark = if result.outcome.is_included() {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!("{} {}", mark, result.id.yellow());
        println!("  {}", result.outcome);
    }
}

async fn cmd_verify(state: &Path, args: VerifyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    let report = ws.verify_service().verify_many(&args.ids).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_verify_report(&report),
    }

    let failed = report.results.iter().filter(|r| !r.outcome.is_included()).count();
    if failed > 0 {
        bail!("{failed} of {} identifiers failed verification", report.results.len());
    }
    Ok(())
}

fn print_audit(report: &AuditReport) {
    let mark = if report.passed() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "{} k={:>6}  real {}/{} included ({} ms)  synthetic {}/{} accepted ({} ms)",
        mark,
        report.sample_size,
        report.real.included,
        report.real.sampled,
        report.real.elapsed.as_millis(),
        report.synthetic.included,
        report.synthetic.sampled,
        report.synthetic.elapsed.as_millis(),
    );
    let failures =
        report.real.mismatch + report.real.corrupt_proof + report.real.anchor_unavailable;
    if failures > 0 {
        println!(
            "    {} mismatch, {} corrupt, {} anchor unavailable",
            report.real.mismatch.to_string().red(),
            report.real.corrupt_proof.to_string().red(),
            report.real.anchor_unavailable.to_string().red()
        );
    }
}

async fn run_audit_series(
    ws: &Workspace,
    label: Label,
    sizes: &[usize],
    seed: Option<u64>,
) -> anyhow::Result<Vec<AuditReport>> {
    let mut audit = SampledAudit::new(Arc::new(ws.verify_service()));
    if let Some(seed) = seed {
        audit = audit.with_seed(seed);
    }
    Ok(audit.run_series(label, sizes).await?)
}

async fn cmd_audit(state: &Path, args: AuditArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    let label = match args.label {
        Some(label) => label,
        None => latest_label(ws.store.as_ref())?,
    };
    let sizes = if args.samples.is_empty() {
        ws.config.audit.sample_sizes.clone()
    } else {
        args.samples
    };

    let reports = run_audit_series(&ws, label, &sizes, args.seed).await?;
    match format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Text => {
            println!("Audit of commit {}", label.to_string().bold());
            reports.iter().for_each(print_audit);
        }
    }

    if reports.iter().any(|r| !r.passed()) {
        bail!("audit of commit {label} found failures");
    }
    Ok(())
}

fn cmd_sample_ids(state: &Path, args: SampleIdsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    let label = latest_label(ws.store.as_ref())?;
    let audit = SampledAudit::new(Arc::new(ws.verify_service()));
    let ids: Vec<String> = audit
        .sample_leaf_ids(label, args.count)?
        .iter()
        .map(LeafId::to_hex)
        .collect();
    let command = format!("mal --state {} verify {}", state.display(), ids.join(" "));

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "ok": true,
            "label": label,
            "ids": ids,
            "command": command,
        })),
        OutputFormat::Text => {
            for id in &ids {
                println!("{id}");
            }
            println!("{}", command.dimmed());
            Ok(())
        }
    }
}

fn cmd_show(state: &Path, args: ShowArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    let label = match args.label {
        Some(label) => label,
        None => latest_label(ws.store.as_ref())?,
    };
    let commit = ws
        .store
        .find_commit(label)?
        .with_context(|| format!("commit {label} not found"))?;
    let linked = ws.store.records_for_commit(label)?.len();
    let proof_rows = ws.store.proof_entry_count(label)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "commit": commit,
            "linked_records": linked,
            "proof_rows": proof_rows,
        })),
        OutputFormat::Text => {
            println!("Commit {}", label.to_string().yellow().bold());
            print_commit(&commit);
            println!("  Linked:  {linked} records");
            println!("  Proofs:  {proof_rows} rows");
            println!("  At:      {}", commit.committed_at.to_rfc3339().dimmed());
            Ok(())
        }
    }
}

async fn cmd_repair(state: &Path, args: RepairArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let ws = Workspace::open(state)?;
    let report = ws.batcher().repair_proofs(args.label).await?;
    ws.save()?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            println!(
                "{} Commit {}: {} leaves, {} proof rows, {} restored",
                "✓".green().bold(),
                report.label.to_string().bold(),
                report.leaves,
                report.proof_rows,
                report.inserted.to_string().yellow()
            );
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct SimulationRun {
    run: usize,
    receipt: CommitReceipt,
    audits: Vec<AuditReport>,
}

/// One simulated round: seed, commit, audit. Records of round `run` are
/// created one minute after the previous round and committed 30 s later.
async fn simulate_round(
    ws: &Workspace,
    batcher: &CommitBatcher,
    clock: DateTime<Utc>,
    run: usize,
    leaves: usize,
    sizes: &[usize],
) -> anyhow::Result<SimulationRun> {
    let created_at = clock + Duration::minutes(run as i64);
    seed_records(ws.store.as_ref(), leaves, created_at)?;
    let receipt = batcher.commit_pending(created_at + Duration::seconds(30)).await?;
    let audits = run_audit_series(ws, receipt.commit.label, sizes, None).await?;
    Ok(SimulationRun { run, receipt, audits })
}

async fn cmd_simulate(
    state: &Path,
    args: SimulateArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let mut config = MalConfig::load(state)?;
    // Simulated rounds are minutes apart; a fixed offset would overlap them.
    config.batcher.period_offset_days = None;
    let sizes = if args.samples.is_empty() {
        config.audit.sample_sizes.clone()
    } else {
        args.samples
    };
    let ws = Workspace::ephemeral(config);
    let batcher = ws.batcher();
    let clock = Utc::now();

    let mut runs = Vec::with_capacity(args.runs);
    for run in 1..=args.runs {
        let result = simulate_round(&ws, &batcher, clock, run, args.leaves, &sizes).await?;
        if matches!(format, OutputFormat::Text) {
            println!("{} Run {}", "▶".cyan().bold(), run);
            print_receipt(&result.receipt);
            result.audits.iter().for_each(print_audit);
        }
        runs.push(result);
    }

    if matches!(format, OutputFormat::Json) {
        print_json(&runs)?;
    }
    if runs.iter().flat_map(|r| &r.audits).any(|a| !a.passed()) {
        bail!("simulation found verification failures");
    }
    Ok(())
}
