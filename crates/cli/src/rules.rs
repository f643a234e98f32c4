use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use guard_core::Config;
use guard_rules::validation::validate_declarations;
use guard_rules::{RuleLoader, Severity};

use crate::cli::RulesCommand;
use crate::engine::Engine;
use crate::output::Output;

pub async fn run(cmd: RulesCommand, config: &Config, out: &Output) -> Result<ExitCode> {
    match cmd {
        RulesCommand::List { category, severity } => {
            let engine = Engine::load(config)?;
            let rules: Vec<_> = match severity {
                Some(s) => {
                    let severity: Severity = s.parse().map_err(|e: String| anyhow!(e))?;
                    engine
                        .registry
                        .list_by_severity(severity)
                        .into_iter()
                        .filter(|r| category.as_deref().map_or(true, |c| r.rule.category == c))
                        .collect()
                }
                None => engine.registry.list(category.as_deref()),
            };
            out.print_rules(&rules)?;
            Ok(ExitCode::SUCCESS)
        }
        RulesCommand::Validate => {
            let loader = RuleLoader::new(config.rules.rules_dir.clone());
            let scan = loader.scan().context("failed to scan rules directory")?;
            if !out.is_json() {
                for file in &scan.files {
                    out.print_info(&format!("{} {:?}", file.path.display(), file.status))?;
                }
            }
            let result = validate_declarations(&scan.declarations);
            out.print_validation(&result)?;
            Ok(if result.valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        RulesCommand::Watch => {
            let mut config = config.clone();
            config.rules.watch = true;
            let engine = Engine::load(&config)?;
            out.print_info(&format!(
                "watching {} ({} rules); Ctrl+C to stop",
                config.rules.rules_dir.display(),
                engine.registry.len()
            ))?;
            tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
            info!(rules = engine.registry.len(), "stopped watching");
            Ok(ExitCode::SUCCESS)
        }
    }
}
