use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use guard_core::Config;
use guard_evidence::EvidenceStore;
use guard_rules::loader::RuleWatcher;
use guard_rules::{ComplianceChecker, DiagnosticsLog, RiskScorer, RuleEvaluator, RuleLoader, RuleRegistry};

use crate::cli::CliArgs;

/// Environment config with command-line overrides applied.
pub fn resolve_config(args: &CliArgs) -> Config {
    let mut config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    if let Some(dir) = &args.rules_dir {
        config.rules.rules_dir = dir.clone();
    }
    if let Some(dir) = &args.evidence_dir {
        config.evidence.evidence_dir = dir.clone();
    }
    if let Some(ms) = args.timeout_ms {
        config.evidence.io_timeout_ms = ms;
    }
    config
}

/// Registry fed from the configured rules directory. With `rules.watch` set
/// it follows file changes for as long as the engine lives.
pub struct Engine {
    pub registry: Arc<RuleRegistry>,
    pub diagnostics: Arc<DiagnosticsLog>,
    _watcher: Option<RuleWatcher>,
}

impl Engine {
    pub fn load(config: &Config) -> Result<Self> {
        let diagnostics = Arc::new(DiagnosticsLog::with_max_entries(config.evaluation.diagnostics_capacity));
        let loader = RuleLoader::new(config.rules.rules_dir.clone());
        let registry = Arc::new(
            RuleRegistry::new()
                .with_diagnostics(Arc::clone(&diagnostics))
                .with_source(Arc::new(loader.clone())),
        );
        let count = registry
            .reload()
            .with_context(|| format!("failed to load rules from {}", config.rules.rules_dir.display()))?;
        info!(count, "rules ready");

        let watcher = if config.rules.watch {
            Some(loader.watch(Arc::clone(&registry)).context("failed to watch rules directory")?)
        } else {
            None
        };
        Ok(Self {
            registry,
            diagnostics,
            _watcher: watcher,
        })
    }

    pub fn checker(&self, config: &Config) -> Result<ComplianceChecker> {
        let evaluator = RuleEvaluator::new(Arc::clone(&self.registry), &config.evaluation)
            .context("failed to build rule evaluator")?
            .with_diagnostics(Arc::clone(&self.diagnostics));
        Ok(ComplianceChecker::new(
            Arc::new(evaluator),
            RiskScorer::from_config(&config.evaluation),
        ))
    }
}

/// Evidence store plus the time budget for each call into it.
#[derive(Clone)]
pub struct Store {
    inner: EvidenceStore,
    timeout: Duration,
}

impl Store {
    pub fn open(config: &Config) -> Result<Self> {
        let inner = EvidenceStore::open(&config.evidence.evidence_dir)
            .with_context(|| format!("failed to open evidence store at {}", config.evidence.evidence_dir.display()))?;
        Ok(Self {
            inner,
            timeout: Duration::from_millis(config.evidence.io_timeout_ms),
        })
    }

    /// Run a blocking store call off the async runtime, bounded by the
    /// configured timeout.
    pub async fn call<T, E, F>(&self, what: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce(&EvidenceStore) -> std::result::Result<T, E> + Send + 'static,
    {
        let store = self.inner.clone();
        bounded(self.timeout, what, tokio::task::spawn_blocking(move || f(&store))).await
    }
}

async fn bounded<T, E>(
    timeout: Duration,
    what: &str,
    task: impl Future<Output = std::result::Result<std::result::Result<T, E>, tokio::task::JoinError>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let joined = tokio::time::timeout(timeout, task)
        .await
        .with_context(|| format!("{} timed out after {}ms", what, timeout.as_millis()))?;
    joined
        .with_context(|| format!("{} task failed", what))?
        .with_context(|| format!("{} failed", what))
}
