use std::fs;
use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use guard_core::{Config, SubjectRecord};
use guard_rules::Violation;

use crate::cli::CheckArgs;
use crate::engine::{Engine, Store};
use crate::output::Output;

fn read_record(args: &CheckArgs) -> Result<SubjectRecord> {
    let raw = if args.record.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read record from stdin")?;
        buf
    } else {
        fs::read_to_string(&args.record)
            .with_context(|| format!("failed to read record {}", args.record.display()))?
    };
    let value: Value = serde_json::from_str(&raw).context("record is not valid JSON")?;
    SubjectRecord::from_value(value).context("record is not a subject object")
}

/// Evaluate one record. Exits non-zero when any rule is violated.
pub async fn run(args: CheckArgs, config: &Config, out: &Output) -> Result<ExitCode> {
    let record = read_record(&args)?;
    let engine = Engine::load(config)?;
    let checker = engine.checker(config)?;

    let mut report = checker.check_subject(&record, args.category.as_deref());

    if args.record_evidence && !report.violations.is_empty() {
        let store = Store::open(config)?;
        let violations = std::mem::take(&mut report.violations);
        let source = args.source.clone();
        let linked = store
            .call("record violation evidence", move |s| {
                violations
                    .into_iter()
                    .map(|v| -> guard_evidence::Result<Violation> {
                        let evidence = s.record_violation(&v, &source)?;
                        Ok(v.with_evidence_refs(vec![evidence.id]))
                    })
                    .collect::<guard_evidence::Result<Vec<_>>>()
            })
            .await?;
        info!(count = linked.len(), "recorded violation evidence");
        report.violations = linked;
    }

    out.print_report(&report)?;
    Ok(if report.is_compliant() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
