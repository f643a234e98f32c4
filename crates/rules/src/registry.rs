//! In-memory rule registry with atomic snapshot replacement.
//!
//! Readers take an `Arc` to the current immutable [`RuleSet`] and evaluate
//! against it for as long as they like. Writers build a complete new set and
//! swap the pointer, so a reader never observes a half-applied reload.

use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::diagnostics::{DiagnosticsLog, ExecutionPhase, LogLevel, REGISTRY_SCOPE};
use crate::loader::{Result, RuleError};
use crate::schema::{DeclarationSet, Rule, Severity};
use crate::strategies::{Check, CheckError};
use crate::validation::build_rules;

/// Where [`RuleRegistry::reload`] gets its declarations from.
pub trait RuleSource: Send + Sync {
    fn declarations(&self) -> Result<DeclarationSet>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

impl RuleSource for DeclarationSet {
    fn declarations(&self) -> Result<DeclarationSet> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory declaration(s)", self.len())
    }
}

/// A rule together with its compiled check.
///
/// The check is resolved once at registration. A rule registered directly
/// with an unknown method is kept, and reports the problem when evaluated.
#[derive(Debug, Clone)]
pub struct RegisteredRule {
    pub rule: Rule,
    pub check: std::result::Result<Check, CheckError>,
}

impl RegisteredRule {
    pub fn new(rule: Rule) -> Self {
        let check = Check::resolve(&rule.check_method, &rule.parameters);
        Self { rule, check }
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }
}

/// Immutable snapshot of all registered rules, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: IndexMap<String, Arc<RegisteredRule>>,
}

impl RuleSet {
    pub fn get(&self, id: &str) -> Option<&Arc<RegisteredRule>> {
        self.rules.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredRule>> {
        self.rules.values()
    }

    /// Rules of one category, or all rules when `category` is `None`.
    pub fn list(&self, category: Option<&str>) -> Vec<Arc<RegisteredRule>> {
        self.rules
            .values()
            .filter(|r| category.map_or(true, |c| r.rule.category == c))
            .cloned()
            .collect()
    }

    pub fn list_by_severity(&self, severity: Severity) -> Vec<Arc<RegisteredRule>> {
        self.rules
            .values()
            .filter(|r| r.rule.severity == severity)
            .cloned()
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in self.rules.values() {
            if !out.contains(&r.rule.category.as_str()) {
                out.push(&r.rule.category);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Insert or overwrite; returns the replaced rule.
    fn upsert(&mut self, rule: Rule) -> Option<Arc<RegisteredRule>> {
        let registered = RegisteredRule::new(rule);
        if let Err(e) = &registered.check {
            warn!(rule_id = %registered.rule.id, error = %e, "registered rule has an unusable check");
        }
        let replaced = self
            .rules
            .insert(registered.rule.id.clone(), Arc::new(registered));
        if let Some(old) = &replaced {
            warn!(rule_id = %old.rule.id, "rule id already registered, overwriting");
        }
        replaced
    }
}

/// Shared rule registry. Construct once and pass around as `Arc<RuleRegistry>`.
pub struct RuleRegistry {
    current: RwLock<Arc<RuleSet>>,
    /// Serializes writers so concurrent updates are not lost.
    writer: Mutex<()>,
    source: RwLock<Option<Arc<dyn RuleSource>>>,
    diagnostics: Option<Arc<DiagnosticsLog>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSet::default())),
            writer: Mutex::new(()),
            source: RwLock::new(None),
            diagnostics: None,
        }
    }

    /// Record reload outcomes in `log` as well as in tracing output.
    pub fn with_diagnostics(mut self, log: Arc<DiagnosticsLog>) -> Self {
        self.diagnostics = Some(log);
        self
    }

    pub fn with_source(self, source: Arc<dyn RuleSource>) -> Self {
        self.set_source(source);
        self
    }

    pub fn set_source(&self, source: Arc<dyn RuleSource>) {
        *self.source.write().unwrap_or_else(|e| e.into_inner()) = Some(source);
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Copy-on-write update: clone the snapshot, apply `f`, swap.
    fn update<R>(&self, f: impl FnOnce(&mut RuleSet) -> R) -> R {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = RuleSet::clone(&self.snapshot());
        let out = f(&mut next);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
        out
    }

    fn install(&self, next: RuleSet) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
    }

    /// Register one rule. An existing rule with the same id is overwritten.
    pub fn register(&self, rule: Rule) {
        self.update(|set| {
            set.upsert(rule);
        });
    }

    /// Register several rules in one swap.
    pub fn register_batch(&self, rules: impl IntoIterator<Item = Rule>) -> usize {
        self.update(|set| rules.into_iter().map(|r| set.upsert(r)).count())
    }

    pub fn get(&self, id: &str) -> Option<Arc<RegisteredRule>> {
        self.snapshot().get(id).cloned()
    }

    pub fn list(&self, category: Option<&str>) -> Vec<Arc<RegisteredRule>> {
        self.snapshot().list(category)
    }

    pub fn list_by_severity(&self, severity: Severity) -> Vec<Arc<RegisteredRule>> {
        self.snapshot().list_by_severity(severity)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.update(|set| {
            let current = set.rules.get_mut(id).ok_or_else(|| RuleError::NotFound(id.to_string()))?;
            let mut next = RegisteredRule::clone(current);
            next.rule.enabled = enabled;
            *current = Arc::new(next);
            info!(rule_id = %id, enabled, "rule toggled");
            Ok(())
        })
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RegisteredRule>> {
        self.update(|set| set.rules.shift_remove(id))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Validate `declarations` and upsert them in a single swap.
    ///
    /// Any malformed declaration fails the whole load with an aggregated
    /// error; the registry is left untouched.
    pub fn load_from_source(&self, declarations: &DeclarationSet) -> Result<usize> {
        let rules = build_rules(declarations)?;
        let count = self.register_batch(rules);
        info!(count, "loaded rule declarations");
        Ok(count)
    }

    /// Re-read the configured source and replace the registry with exactly
    /// its rules. On failure the previous snapshot stays in place.
    pub fn reload(&self) -> Result<usize> {
        let source = self
            .source
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(RuleError::NoSource)?;

        let outcome = source
            .declarations()
            .and_then(|set| build_rules(&set).map_err(RuleError::from));

        match outcome {
            Ok(rules) => {
                let mut next = RuleSet::default();
                for rule in rules {
                    next.upsert(rule);
                }
                let count = next.len();
                self.install(next);
                info!(source = %source.describe(), count, "rule registry reloaded");
                self.note_reload(LogLevel::Info, format!("reloaded {} rule(s) from {}", count, source.describe()));
                Ok(count)
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "reload failed, keeping previous rule set");
                self.note_reload(LogLevel::Error, format!("reload from {} failed: {}", source.describe(), e));
                Err(e)
            }
        }
    }

    fn note_reload(&self, level: LogLevel, message: String) {
        if let Some(log) = &self.diagnostics {
            log.log(REGISTRY_SCOPE, level, ExecutionPhase::Reload, message);
        }
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::LogQueryParams;
    use std::thread;

    fn threshold_rule(id: &str, category: &str, min: i64) -> Rule {
        Rule::new(id, format!("rule {id}"), category, "threshold", Severity::High)
            .with_param("min_registered_capital", min)
    }

    fn declarations(ids: &[&str], marker: i64) -> DeclarationSet {
        let mut yaml = String::from("financial:\n");
        for id in ids {
            yaml.push_str(&format!(
                "  {id}:\n    name: {id}\n    description: d\n    check_method: threshold\n    severity: low\n    action: a\n    parameters: {{min_registered_capital: {marker}}}\n"
            ));
        }
        DeclarationSet::from_yaml(&yaml, "mem.yml")
    }

    #[test]
    fn register_overwrites_last_writer_wins() {
        let registry = RuleRegistry::new();
        registry.register(threshold_rule("R1", "financial", 10));
        registry.register(threshold_rule("R1", "financial", 20));

        assert_eq!(registry.len(), 1);
        let r = registry.get("R1").unwrap();
        assert_eq!(r.rule.parameters["min_registered_capital"], 20);
        assert!(r.check.is_ok());
    }

    #[test]
    fn unknown_method_is_kept_with_its_error() {
        let registry = RuleRegistry::new();
        registry.register(Rule::new("X", "x", "misc", "astrology", Severity::Low));
        let r = registry.get("X").unwrap();
        assert_eq!(r.check.as_ref().unwrap_err(), &CheckError::Unsupported("astrology".into()));
    }

    #[test]
    fn list_filters_by_category_and_severity() {
        let registry = RuleRegistry::new();
        registry.register_batch(vec![
            threshold_rule("R1", "financial", 1),
            threshold_rule("Q1", "qualification", 1),
            Rule::new("R2", "n", "financial", "checklist", Severity::Low)
                .with_param("required_items", serde_json::json!(["a"])),
        ]);

        let ids = |v: Vec<Arc<RegisteredRule>>| v.iter().map(|r| r.rule.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(registry.list(Some("financial"))), vec!["R1", "R2"]);
        assert_eq!(ids(registry.list(None)).len(), 3);
        assert_eq!(ids(registry.list_by_severity(Severity::Low)), vec!["R2"]);
        assert_eq!(registry.snapshot().categories(), vec!["financial", "qualification"]);
    }

    #[test]
    fn set_enabled_and_remove() {
        let registry = RuleRegistry::new();
        registry.register(threshold_rule("R1", "financial", 1));
        registry.set_enabled("R1", false).unwrap();
        assert!(!registry.get("R1").unwrap().rule.enabled);
        assert!(matches!(registry.set_enabled("nope", true), Err(RuleError::NotFound(_))));
        assert!(registry.remove("R1").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn failed_load_changes_nothing() {
        let registry = RuleRegistry::new();
        registry.register(threshold_rule("R0", "financial", 1));

        let mut set = declarations(&["R1"], 5);
        set.extend_yaml("risk:\n  BAD:\n    name: no severity\n", "bad.yml");
        let err = registry.load_from_source(&set).unwrap_err();
        match err {
            RuleError::Validation(v) => assert_eq!(v.offending_rules(), vec!["BAD"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
        assert!(registry.get("R1").is_none());
    }

    #[test]
    fn load_upserts_and_reload_replaces() {
        let registry = RuleRegistry::new().with_source(Arc::new(declarations(&["R1", "R2"], 5)));
        registry.register(threshold_rule("R0", "financial", 1));

        assert_eq!(registry.load_from_source(&declarations(&["R3"], 5)).unwrap(), 1);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.reload().unwrap(), 2);
        let ids: Vec<String> = registry.list(None).iter().map(|r| r.rule.id.clone()).collect();
        assert_eq!(ids, vec!["R1", "R2"]);
    }

    #[test]
    fn reload_without_source_fails() {
        assert!(matches!(RuleRegistry::new().reload(), Err(RuleError::NoSource)));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot_and_is_diagnosed() {
        let log = Arc::new(DiagnosticsLog::new());
        let registry = RuleRegistry::new()
            .with_diagnostics(Arc::clone(&log))
            .with_source(Arc::new(DeclarationSet::from_yaml("risk: [", "broken.yml")));
        registry.register(threshold_rule("R1", "financial", 1));

        assert!(registry.reload().is_err());
        assert!(registry.get("R1").is_some());
        let entries = log.query(REGISTRY_SCOPE, &LogQueryParams::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phase, ExecutionPhase::Reload);
        assert_eq!(entries[0].level, LogLevel::Error);
    }

    #[test]
    fn held_snapshot_is_unaffected_by_reload() {
        let registry = RuleRegistry::new().with_source(Arc::new(declarations(&["N1"], 7)));
        registry.register_batch(vec![threshold_rule("O1", "financial", 1), threshold_rule("O2", "financial", 1)]);

        let before = registry.snapshot();
        registry.reload().unwrap();

        assert_eq!(before.len(), 2);
        assert!(before.get("O1").is_some());
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn readers_never_see_a_partial_set() {
        let a: Vec<String> = (0..20).map(|i| format!("A{i}")).collect();
        let b: Vec<String> = (0..5).map(|i| format!("B{i}")).collect();
        let a_refs: Vec<&str> = a.iter().map(String::as_str).collect();
        let b_refs: Vec<&str> = b.iter().map(String::as_str).collect();
        let set_a = declarations(&a_refs, 1);
        let set_b = declarations(&b_refs, 2);

        let registry = Arc::new(RuleRegistry::new());
        registry.load_from_source(&set_a).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = registry.snapshot();
                        let all_a = snap.iter().all(|r| r.rule.id.starts_with('A'));
                        let all_b = snap.iter().all(|r| r.rule.id.starts_with('B'));
                        assert!((all_a && snap.len() == 20) || (all_b && snap.len() == 5));
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let source: Arc<dyn RuleSource> = if i % 2 == 0 {
                Arc::new(set_b.clone())
            } else {
                Arc::new(set_a.clone())
            };
            registry.set_source(source);
            registry.reload().unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
