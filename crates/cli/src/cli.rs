use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Compliance rule checks with a verifiable evidence trail.
///
/// Defaults come from the environment (`.env` is honoured); flags override them.
#[derive(Parser, Debug)]
#[command(name = "guard", version, about = "Compliance rule checks with a verifiable evidence trail")]
pub struct CliArgs {
    /// Configuration profile: env keys are looked up as {PROFILE}_{KEY} first
    #[arg(long, env = "GUARD_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Rule declaration directory (overrides RULES_DIR)
    #[arg(long, global = true)]
    pub rules_dir: Option<PathBuf>,

    /// Evidence store root (overrides EVIDENCE_DIR)
    #[arg(long, global = true)]
    pub evidence_dir: Option<PathBuf>,

    /// Budget for each evidence store call, in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a subject record against the loaded rules
    Check(CheckArgs),

    /// Inspect rule declarations
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Create, inspect and verify evidence
    #[command(subcommand)]
    Evidence(EvidenceCommand),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// JSON object describing the subject; `-` reads stdin
    pub record: PathBuf,

    /// Only evaluate rules of this category
    #[arg(long)]
    pub category: Option<String>,

    /// Store every violation as evidence and link it from the report
    #[arg(long)]
    pub record_evidence: bool,

    /// Source recorded on violation evidence
    #[arg(long, default_value = "guard-check")]
    pub source: String,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List registered rules
    List {
        #[arg(long)]
        category: Option<String>,
        /// high, medium or low
        #[arg(long)]
        severity: Option<String>,
    },

    /// Validate every declaration file without registering anything
    Validate,

    /// Keep the registry in sync with the rules directory until Ctrl+C
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum EvidenceCommand {
    /// Store a new piece of evidence
    Create {
        #[arg(long = "type")]
        evidence_type: String,
        #[arg(long)]
        source: String,
        /// JSON content, or `@path` to read it from a file
        #[arg(long)]
        content: String,
        /// Rule this evidence supports
        #[arg(long)]
        rule: Option<String>,
        /// Metadata entries, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },

    /// Print one evidence record
    Show { id: String },

    /// Find evidence whose top-level fields equal every criterion
    Search {
        /// Repeatable; values parse as JSON when possible (`related_rule=R1`, `type=transaction`)
        #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
        criteria: Vec<(String, String)>,
    },

    /// Link existing evidence, in order, into a chain
    Chain {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        conclusion: String,
        #[arg(long)]
        risk_level: String,
        #[arg(long)]
        reviewer: String,
    },

    /// Print a chain with its evidence
    ShowChain {
        id: String,
        /// Emit Graphviz DOT instead
        #[arg(long)]
        dot: bool,
    },

    /// Recompute the content hash of one record
    Verify { id: String },

    /// Verify every member of a chain
    VerifyChain { id: String },

    /// Verify every stored record
    VerifyAll,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if k.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((k.to_string(), v.to_string()))
}
