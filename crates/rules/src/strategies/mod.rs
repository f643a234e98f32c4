//! Built-in check strategies.
//!
//! Strategies: threshold, pattern, time_window, checklist.
//! Each strategy is compiled once from a rule's parameters (when the rule is
//! registered) and then evaluated as a pure function of the subject record.
//! A failed check yields a [`Finding`]; the evaluator turns it into a violation.

mod checklist;
mod pattern;
mod threshold;
mod time_window;
mod types;

pub use checklist::ChecklistCheck;
pub use pattern::{PatternCheck, PatternSpec};
pub use threshold::{Bound, BoundKind, ThresholdCheck};
pub use time_window::{DayClass, TimeRange, TimeWindowCheck};
pub use types::*;

use guard_core::SubjectRecord;

use crate::schema::{CheckMethod, Parameters};

/// Common interface of all check strategies.
pub trait CheckStrategy {
    /// Evaluate against one subject. `Ok(None)` means the subject passes.
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError>;
}

/// A compiled check, dispatched by variant.
#[derive(Debug, Clone)]
pub enum Check {
    Threshold(ThresholdCheck),
    Pattern(PatternCheck),
    TimeWindow(TimeWindowCheck),
    Checklist(ChecklistCheck),
}

impl Check {
    /// Resolve a declared check method tag and compile its parameters.
    pub fn resolve(method: &str, params: &Parameters) -> Result<Self, CheckError> {
        let method: CheckMethod = method
            .parse()
            .map_err(|_| CheckError::Unsupported(method.to_string()))?;
        Self::compile(method, params)
    }

    /// Compile parameters for a known check method.
    pub fn compile(method: CheckMethod, params: &Parameters) -> Result<Self, CheckError> {
        match method {
            CheckMethod::Threshold => ThresholdCheck::compile(params).map(Check::Threshold),
            CheckMethod::Pattern => PatternCheck::compile(params).map(Check::Pattern),
            CheckMethod::TimeWindow => TimeWindowCheck::compile(params).map(Check::TimeWindow),
            CheckMethod::Checklist => ChecklistCheck::compile(params).map(Check::Checklist),
        }
    }

    pub fn method(&self) -> CheckMethod {
        match self {
            Check::Threshold(_) => CheckMethod::Threshold,
            Check::Pattern(_) => CheckMethod::Pattern,
            Check::TimeWindow(_) => CheckMethod::TimeWindow,
            Check::Checklist(_) => CheckMethod::Checklist,
        }
    }
}

impl CheckStrategy for Check {
    fn evaluate(&self, data: &SubjectRecord, deadline: &Deadline) -> Result<Option<Finding>, CheckError> {
        deadline.check()?;
        match self {
            Check::Threshold(c) => c.evaluate(data, deadline),
            Check::Pattern(c) => c.evaluate(data, deadline),
            Check::TimeWindow(c) => c.evaluate(data, deadline),
            Check::Checklist(c) => c.evaluate(data, deadline),
        }
    }
}
