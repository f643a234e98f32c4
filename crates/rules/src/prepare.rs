//! Caller-side data preparation.
//!
//! Rules only compare fields; derived figures such as cost growth or cost
//! concentration are computed here and written into the subject record
//! before evaluation. [`cost_alert_rules`] holds the matching threshold rules.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use guard_core::SubjectRecord;

use crate::schema::{Rule, Severity};

/// One cost line (e.g. one month of one category).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEntry {
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub is_fixed: bool,
}

/// Derived cost metrics. A metric is `None` when the input cannot support it
/// (fewer than two entries, no revenue, zero totals).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostMetrics {
    /// (last − first) / first, entries ordered by date.
    pub cost_increase_rate: Option<f64>,
    pub cost_revenue_ratio: Option<f64>,
    /// Largest single category's share of total cost.
    pub max_category_ratio: Option<f64>,
    pub fixed_cost_ratio: Option<f64>,
    pub gross_margin: Option<f64>,
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    (den != 0.0 && den.is_finite()).then(|| num / den)
}

pub fn cost_metrics(entries: &[CostEntry]) -> CostMetrics {
    let mut metrics = CostMetrics::default();
    if entries.is_empty() {
        return metrics;
    }

    let mut ordered: Vec<&CostEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.date);
    if let (true, Some(first), Some(last)) = (ordered.len() >= 2, ordered.first(), ordered.last()) {
        metrics.cost_increase_rate = ratio(last.amount - first.amount, first.amount);
    }

    let total_cost: f64 = entries.iter().map(|e| e.amount).sum();

    let mut by_category: IndexMap<&str, f64> = IndexMap::new();
    for e in entries {
        *by_category.entry(e.category.as_str()).or_default() += e.amount;
    }
    let max_category = by_category.values().copied().fold(f64::MIN, f64::max);
    metrics.max_category_ratio = ratio(max_category, total_cost);

    if entries.iter().any(|e| e.is_fixed) {
        let fixed: f64 = entries.iter().filter(|e| e.is_fixed).map(|e| e.amount).sum();
        metrics.fixed_cost_ratio = ratio(fixed, total_cost);
    }

    if entries.iter().any(|e| e.revenue.is_some()) {
        let revenue: f64 = entries.iter().filter_map(|e| e.revenue).sum();
        metrics.cost_revenue_ratio = ratio(total_cost, revenue);
        metrics.gross_margin = ratio(revenue - total_cost, revenue);
    }

    metrics
}

impl CostMetrics {
    /// Copy every available metric into `record` under its field name.
    pub fn apply_to(&self, mut record: SubjectRecord) -> SubjectRecord {
        let pairs = [
            ("cost_increase_rate", self.cost_increase_rate),
            ("cost_revenue_ratio", self.cost_revenue_ratio),
            ("max_category_ratio", self.max_category_ratio),
            ("fixed_cost_ratio", self.fixed_cost_ratio),
            ("gross_margin", self.gross_margin),
        ];
        for (field, value) in pairs {
            if let Some(v) = value {
                record = record.with(field, v);
            }
        }
        record
    }
}

/// The cost alert rules, expressed as threshold checks over [`CostMetrics`] fields.
pub fn cost_alert_rules() -> Vec<Rule> {
    let rule = |id: &str, name: &str, description: &str, bound: &str, limit: f64, severity: Severity, action: &str| {
        Rule::new(id, name, "cost", "threshold", severity)
            .with_description(description)
            .with_param(bound, limit)
            .with_actions(vec![action.to_string()])
    };
    vec![
        rule(
            "COST_INCREASE_RATE",
            "Cost growth alert",
            "Period-over-period cost growth above 20%",
            "max_cost_increase_rate",
            0.2,
            Severity::Medium,
            "Analyse the main drivers of cost growth and draw up a cost control plan",
        ),
        rule(
            "HIGH_COST_RATIO",
            "High cost ratio alert",
            "Cost to revenue ratio above 80%",
            "max_cost_revenue_ratio",
            0.8,
            Severity::High,
            "Optimise the cost structure and improve operating efficiency",
        ),
        rule(
            "COST_CONCENTRATION",
            "Cost concentration alert",
            "A single cost category above 50% of total cost",
            "max_max_category_ratio",
            0.5,
            Severity::Medium,
            "Spread the cost structure to reduce reliance on a single category",
        ),
        rule(
            "FIXED_COST_RATIO",
            "Fixed cost ratio alert",
            "Fixed costs above 70% of total cost",
            "max_fixed_cost_ratio",
            0.7,
            Severity::Medium,
            "Evaluate turning part of the fixed costs into variable costs",
        ),
        rule(
            "NEGATIVE_MARGIN",
            "Negative margin alert",
            "Gross margin below zero",
            "min_gross_margin",
            0.0,
            Severity::High,
            "Review pricing and cost structure immediately to stop the losses",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::RuleEvaluator;
    use crate::registry::RuleRegistry;
    use guard_core::config::EvaluationConfig;
    use std::sync::Arc;

    fn entry(date: &str, category: &str, amount: f64, revenue: Option<f64>, is_fixed: bool) -> CostEntry {
        CostEntry {
            date: date.parse().unwrap(),
            category: category.to_string(),
            amount,
            revenue,
            is_fixed,
        }
    }

    #[test]
    fn metrics_from_entries() {
        let entries = vec![
            entry("2024-02-01", "labour", 150.0, Some(200.0), true),
            entry("2024-01-01", "materials", 100.0, Some(200.0), false),
        ];
        let m = cost_metrics(&entries);
        assert_eq!(m.cost_increase_rate, Some(0.5));
        assert_eq!(m.cost_revenue_ratio, Some(250.0 / 400.0));
        assert_eq!(m.max_category_ratio, Some(150.0 / 250.0));
        assert_eq!(m.fixed_cost_ratio, Some(150.0 / 250.0));
        assert_eq!(m.gross_margin, Some(150.0 / 400.0));
    }

    #[test]
    fn unsupported_metrics_are_absent() {
        let m = cost_metrics(&[entry("2024-01-01", "rent", 0.0, None, false)]);
        assert_eq!(m.cost_increase_rate, None);
        assert_eq!(m.max_category_ratio, None);
        assert_eq!(m.gross_margin, None);
        assert_eq!(cost_metrics(&[]), CostMetrics::default());
    }

    #[test]
    fn cost_rules_fire_on_prepared_record() {
        let registry = Arc::new(RuleRegistry::new());
        registry.register_batch(cost_alert_rules());
        let eval = RuleEvaluator::new(registry, &EvaluationConfig::default()).unwrap();

        let entries = vec![
            entry("2024-01-01", "materials", 100.0, Some(90.0), false),
            entry("2024-02-01", "materials", 130.0, Some(90.0), false),
        ];
        let record = cost_metrics(&entries).apply_to(SubjectRecord::new("cost-centre-7"));
        let outcome = eval.evaluate_batch(&record, Some("cost"));

        let ids: Vec<&str> = outcome.violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["COST_INCREASE_RATE", "HIGH_COST_RATIO", "COST_CONCENTRATION", "NEGATIVE_MARGIN"]);
        assert!(outcome.skipped.is_empty());
    }
}
