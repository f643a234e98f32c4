//! Rule schema types with serde deserialization.
//!
//! Defines the type hierarchy shared by the registry, the evaluator and callers:
//! - `RuleDeclaration`: one raw entry of a declaration file (category → id → declaration)
//! - `Rule`: a validated, registered rule
//! - `Severity` / `CheckMethod`: closed enums resolved from declaration strings
//! - `Violation`: output of a failed check

mod check_method;
mod declaration;
mod rule;
mod severity;
mod violation;

pub use check_method::*;
pub use declaration::*;
pub use rule::*;
pub use severity::*;
pub use violation::*;
