use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use serde::Serialize;
use std::io::{self, Write};

use guard_evidence::{ChainIntegrity, Evidence, Integrity, IntegrityReport, ResolvedChain};
use guard_rules::validation::ValidationResult;
use guard_rules::{CheckReport, RegisteredRule, RiskStatus, Severity};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const OK: Color = Color::Green;
    const WARN: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::High => Colors::ERROR,
        Severity::Medium => Colors::WARN,
        Severity::Low => Colors::DIM,
    }
}

/// Human-readable or JSON rendering of command results on stdout.
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn colored(&self, color: Color, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(color), Print(text), ResetColor)?;
        Ok(())
    }

    fn line(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", text)?;
        Ok(())
    }

    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        self.line(&serde_json::to_string_pretty(value)?)
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn print_info(&self, text: &str) -> Result<()> {
        self.colored(Colors::DIM, text)?;
        self.line("")
    }

    pub fn print_report(&self, report: &CheckReport) -> Result<()> {
        if self.json {
            return self.json(report);
        }
        let status_color = match report.status {
            RiskStatus::HighRisk => Colors::ERROR,
            RiskStatus::MediumRisk => Colors::WARN,
            RiskStatus::LowRisk => Colors::OK,
        };
        self.colored(Colors::HEADER, &format!("subject {}", report.subject_id))?;
        self.line(&format!("  (report {})", report.report_id))?;
        self.colored(status_color, &format!("  {} ", report.status))?;
        self.line(&format!("risk score {:.2}", report.risk_score))?;

        for v in &report.violations {
            self.colored(severity_color(v.severity), &format!("  [{}] ", v.severity))?;
            self.line(&format!("{}: {}", v.rule_id, v.description))?;
            for id in &v.evidence_refs {
                self.print_info(&format!("      evidence {}", id))?;
            }
        }
        for s in &report.skipped {
            self.colored(Colors::WARN, "  [skipped] ")?;
            self.line(&format!("{}: {}", s.rule_id, s.reason))?;
        }
        if !report.recommendations.is_empty() {
            self.line("  recommendations:")?;
            for r in &report.recommendations {
                self.line(&format!("    - {}", r))?;
            }
        }
        self.print_info(&format!("  {}", report.summary))
    }

    pub fn print_rules(&self, rules: &[std::sync::Arc<RegisteredRule>]) -> Result<()> {
        if self.json {
            let plain: Vec<_> = rules.iter().map(|r| &r.rule).collect();
            return self.json(&plain);
        }
        for registered in rules {
            let rule = &registered.rule;
            self.colored(severity_color(rule.severity), &format!("{:<7}", rule.severity.as_str()))?;
            let state = if rule.enabled { "" } else { " (disabled)" };
            self.line(&format!("  {}.{}  {} [{}]{}", rule.category, rule.id, rule.name, rule.check_method, state))?;
            if let Err(e) = &registered.check {
                self.colored(Colors::ERROR, &format!("         unusable: {}", e))?;
                self.line("")?;
            }
        }
        self.print_info(&format!("{} rule(s)", rules.len()))
    }

    pub fn print_validation(&self, result: &ValidationResult) -> Result<()> {
        if self.json {
            return self.json(result);
        }
        for e in &result.errors {
            self.colored(Colors::ERROR, "error: ")?;
            self.line(&e.to_string())?;
        }
        for w in &result.warnings {
            self.colored(Colors::WARN, "warning: ")?;
            self.line(&format!("{}: {}", w.path, w.message))?;
        }
        if result.valid {
            self.colored(Colors::OK, "all declarations are valid")?;
            self.line("")
        } else {
            self.line(&format!("{} error(s)", result.errors.len()))
        }
    }

    pub fn print_evidence(&self, evidence: &Evidence) -> Result<()> {
        // Evidence is structured data; the pretty form is the readable one too.
        self.json(evidence)
    }

    pub fn print_chain(&self, chain: &ResolvedChain, dot: bool) -> Result<()> {
        if dot {
            let mut stdout = io::stdout();
            write!(stdout, "{}", chain.to_dot())?;
            return Ok(());
        }
        if self.json {
            return self.json(chain);
        }
        let c = &chain.chain;
        self.colored(Colors::HEADER, &c.id)?;
        self.line(&format!("  risk {}  reviewer {}", c.risk_level, c.reviewer))?;
        self.line(&format!("  {}", c.conclusion))?;
        for (i, e) in chain.evidence.iter().enumerate() {
            self.line(&format!("  {}. {} [{}] from {}", i + 1, e.id, e.evidence_type, e.source))?;
        }
        Ok(())
    }

    pub fn print_verification(&self, id: &str, intact: bool) -> Result<()> {
        if self.json {
            return self.json(&serde_json::json!({ "evidence_id": id, "verified": intact }));
        }
        self.print_integrity_line(id, intact)
    }

    fn print_integrity_line(&self, id: &str, intact: bool) -> Result<()> {
        if intact {
            self.colored(Colors::OK, "ok       ")?;
        } else {
            self.colored(Colors::ERROR, "FAILED   ")?;
        }
        self.line(id)
    }

    pub fn print_integrity(&self, reports: &[IntegrityReport]) -> Result<()> {
        if self.json {
            return self.json(&reports);
        }
        for r in reports {
            self.print_integrity_line(&r.evidence_id, r.integrity.is_intact())?;
            match &r.integrity {
                Integrity::Mismatch { stored, computed } => {
                    self.print_info(&format!("         stored {} != computed {}", stored, computed))?
                }
                Integrity::Unreadable { reason } => self.print_info(&format!("         {}", reason))?,
                Integrity::Missing => self.print_info("         missing")?,
                Integrity::Intact => {}
            }
        }
        Ok(())
    }

    pub fn print_chain_integrity(&self, report: &ChainIntegrity) -> Result<()> {
        if self.json {
            return self.json(report);
        }
        self.print_integrity(&report.members)?;
        if report.is_trusted() {
            self.colored(Colors::OK, &format!("chain {} is trusted", report.chain_id))?;
        } else {
            self.colored(Colors::ERROR, &format!("chain {} is NOT trusted", report.chain_id))?;
        }
        self.line("")
    }
}
