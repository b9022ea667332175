//! Rule engine
//!
//! Evaluation is a fold over the enabled rules in `sort_order`. Each hit
//! hands the rule's outcomes to an [`OutcomeBuilder`], which merges them into
//! an accumulator. A hit on a `last_match` rule ends the fold.

use serde::Serialize;
use tracing::{debug, warn};

use crate::Result;
use crate::condition::MatchError;
use crate::record::Record;
use crate::rule::{Rule, RuleMode};

/// Engine behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Whether an `ALL` rule without conditions hits
    pub empty_all_hits: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            empty_all_hits: true,
        }
    }
}

/// Per-call evaluation context
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub record: &'a Record,
    pub debug: bool,
    pub options: EngineOptions,
}

impl<'a> EvalContext<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self {
            record,
            debug: false,
            options: EngineOptions::default(),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }
}

/// What happened to one rule during a debug evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTrace {
    pub id: String,
    pub name: String,
    pub mode: RuleMode,
    pub hit: bool,
    pub last_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of evaluating a rule list
#[derive(Debug, Clone)]
pub struct Evaluation<T> {
    pub outcome: T,
    /// Populated only when the context has `debug` set
    pub trace: Vec<RuleTrace>,
    /// Number of rules whose conditions were checked
    pub rules_evaluated: usize,
}

/// Merges matched outcomes into an accumulator
pub trait OutcomeBuilder {
    /// Outcome type carried by rules of this kind
    type Raw;
    /// Accumulator produced by evaluation
    type Output: Default;

    /// Merge the outcomes of one matched rule
    fn merge(
        &mut self,
        ctx: &EvalContext<'_>,
        outcomes: &[Self::Raw],
        acc: &mut Self::Output,
    ) -> Result<()>;

    /// Final pass over the accumulator after the last rule
    fn finish(&mut self, _ctx: &EvalContext<'_>, _acc: &mut Self::Output) -> Result<()> {
        Ok(())
    }
}

/// Evaluate `rules` against the context's record
///
/// A condition that fails to evaluate cancels only its own rule. Errors from
/// the builder abort the evaluation.
pub fn evaluate<B: OutcomeBuilder>(
    rules: &[Rule<B::Raw>],
    builder: &mut B,
    ctx: &EvalContext<'_>,
) -> Result<Evaluation<B::Output>> {
    let mut ordered: Vec<&Rule<B::Raw>> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by_key(|r| r.sort_order);

    let mut acc = B::Output::default();
    let mut trace = Vec::new();
    let mut rules_evaluated = 0;

    for rule in ordered {
        rules_evaluated += 1;
        let (hit, error) = match rule_hits(rule, ctx.record, ctx.options) {
            Ok(hit) => (hit, None),
            Err(e) => {
                warn!(
                    record = %ctx.record.key,
                    rule = %rule.name,
                    "Skipping rule: {}",
                    e
                );
                (false, Some(e.to_string()))
            }
        };

        if ctx.debug {
            trace.push(RuleTrace {
                id: rule.display_id().to_string(),
                name: rule.name.clone(),
                mode: rule.mode,
                hit,
                last_match: rule.last_match,
                error,
            });
        }

        if !hit {
            continue;
        }

        debug!(record = %ctx.record.key, rule = %rule.name, "Rule hit");
        builder.merge(ctx, &rule.outcomes, &mut acc)?;

        if rule.last_match {
            debug!(record = %ctx.record.key, rule = %rule.name, "Last match, stopping");
            break;
        }
    }

    builder.finish(ctx, &mut acc)?;

    Ok(Evaluation {
        outcome: acc,
        trace,
        rules_evaluated,
    })
}

fn rule_hits<O>(
    rule: &Rule<O>,
    record: &Record,
    options: EngineOptions,
) -> std::result::Result<bool, MatchError> {
    match rule.mode {
        RuleMode::Always => Ok(true),
        RuleMode::Any => {
            let mut hit = false;
            for condition in &rule.conditions {
                if condition.evaluate(record)? {
                    hit = true;
                }
            }
            Ok(hit)
        }
        RuleMode::All => {
            if rule.conditions.is_empty() {
                return Ok(options.empty_all_hits);
            }
            let mut negative_seen = false;
            for condition in &rule.conditions {
                if !condition.evaluate(record)? {
                    negative_seen = true;
                }
            }
            Ok(!negative_seen)
        }
    }
}
