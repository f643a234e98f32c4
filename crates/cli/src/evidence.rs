use std::convert::Infallible;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use guard_core::Config;
use guard_evidence::NewEvidence;

use crate::cli::EvidenceCommand;
use crate::engine::Store;
use crate::output::Output;

/// `@path` reads the file; anything else is parsed inline.
fn read_content(arg: &str) -> Result<Value> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&raw).context("evidence content is not valid JSON")
}

/// Values that parse as JSON keep their type, everything else is a string.
fn loose_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn to_map(pairs: Vec<(String, String)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k, loose_value(&v))).collect()
}

pub async fn run(cmd: EvidenceCommand, config: &Config, out: &Output) -> Result<ExitCode> {
    let store = Store::open(config)?;
    match cmd {
        EvidenceCommand::Create {
            evidence_type,
            source,
            content,
            rule,
            metadata,
        } => {
            let mut new = NewEvidence::new(evidence_type, source, read_content(&content)?);
            new.related_rule = rule;
            new.metadata = to_map(metadata);
            let evidence = store.call("create evidence", move |s| s.create(new)).await?;
            out.print_evidence(&evidence)?;
        }
        EvidenceCommand::Show { id } => {
            let evidence = store.call("show evidence", move |s| s.get(&id)).await?;
            out.print_evidence(&evidence)?;
        }
        EvidenceCommand::Search { criteria } => {
            let criteria = to_map(criteria);
            let found = store.call("search evidence", move |s| s.search(&criteria)).await?;
            if out.is_json() {
                out.json(&found)?;
            } else {
                for e in &found {
                    out.print_info(&format!("{}  {}  {}  {}", e.id, e.evidence_type, e.source, e.hash))?;
                }
                out.print_info(&format!("{} match(es)", found.len()))?;
            }
        }
        EvidenceCommand::Chain {
            ids,
            conclusion,
            risk_level,
            reviewer,
        } => {
            let chain = store
                .call("create chain", move |s| s.create_chain(&ids, &conclusion, &risk_level, &reviewer))
                .await?;
            out.json(&chain)?;
        }
        EvidenceCommand::ShowChain { id, dot } => {
            let chain = store.call("show chain", move |s| s.get_chain(&id)).await?;
            out.print_chain(&chain, dot)?;
        }
        EvidenceCommand::Verify { id } => {
            let lookup = id.clone();
            let intact = store
                .call("verify evidence", move |s| Ok::<_, Infallible>(s.verify(&lookup)))
                .await?;
            out.print_verification(&id, intact)?;
            if !intact {
                return Ok(ExitCode::FAILURE);
            }
        }
        EvidenceCommand::VerifyChain { id } => {
            let report = store.call("verify chain", move |s| s.verify_chain(&id)).await?;
            out.print_chain_integrity(&report)?;
            if !report.is_trusted() {
                return Ok(ExitCode::FAILURE);
            }
        }
        EvidenceCommand::VerifyAll => {
            let reports = store.call("verify all evidence", |s| s.verify_all()).await?;
            out.print_integrity(&reports)?;
            if reports.iter().any(|r| !r.integrity.is_intact()) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
