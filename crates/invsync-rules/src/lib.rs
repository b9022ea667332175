//! Rule evaluation for inventory-sync
//!
//! This crate turns a record's attributes into outcomes:
//!
//! - **Condition evaluation**: a pure predicate over `(value, needle, operator, negate)`
//! - **Rule engine**: an ordered fold over rules combined by [`RuleMode`]
//! - **Outcome builders**: [`FilterBuilder`], [`RewriteBuilder`] and [`ActionBuilder`]
//!   share the engine loop and differ only in how matched outcomes are merged
//!
//! # Architecture
//!
//! ```text
//!   Record ──► Filter ──► Rewrite ──► Action ──► ActionOutcome
//!                 │           │           │
//!                 └───── evaluate(rules, builder, ctx) ─────┘
//!                                 │
//!                          Condition::evaluate
//! ```
//!
//! Folder pool seats are not owned here. The [`SeatAllocator`] trait is the
//! seam the action builder calls through.

pub mod condition;
pub mod engine;
pub mod error;
pub mod folder;
pub mod outcome;
pub mod record;
pub mod rule;
pub mod source;
pub mod template;

pub use condition::{Condition, MatchError, Matcher, Operator, match_str, match_value};
pub use engine::{EngineOptions, EvalContext, Evaluation, OutcomeBuilder, RuleTrace, evaluate};
pub use error::{Error, Result};
pub use folder::format_folder_path;
pub use outcome::{
    Action, ActionBuilder, ActionOutcome, AttributeChange, FilterAction, FilterBuilder,
    FilterOutcome, RewriteAction, RewriteBuilder, RewriteOutcome, SeatAllocator,
};
pub use record::{Record, SourceAttribution};
pub use rule::{Rule, RuleMode};
pub use source::{RuleSet, RuleSource, TomlRuleSource};
