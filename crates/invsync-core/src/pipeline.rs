//! Per-record rule pipeline
//!
//! Filter and rewrite rules shape the attributes a record exports. Action
//! rules then run against a view of the record that only carries those
//! attributes. The filter+rewrite result is cached on the record under
//! `<account>_attributes`, keyed by a fingerprint of the rules that shaped it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use invsync_rules::outcome::filter_attributes;
use invsync_rules::{
    ActionBuilder, ActionOutcome, EngineOptions, EvalContext, Record, RewriteBuilder, RuleSet,
    RuleTrace, SeatAllocator, evaluate,
};

use crate::Result;

/// How a record's pool pin changes after evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinChange {
    Keep,
    Set(String),
    /// The seat was released and the pin must be dropped
    Cleared,
}

/// Cached filter+rewrite result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedAttributes {
    fingerprint: String,
    ignore: bool,
    attributes: BTreeMap<String, String>,
}

/// Everything the reconciler needs from one record
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub key: String,
    pub ignore: bool,
    /// Filtered and rewritten attributes
    pub attributes: BTreeMap<String, String>,
    pub actions: ActionOutcome,
    pub pin: PinChange,
    /// New cache entry to store under [`Pipeline::cache_key`]
    pub cache_update: Option<serde_json::Value>,
}

/// Full trace of one record through all three rule kinds
#[derive(Debug, Clone, Serialize)]
pub struct RecordDebug {
    pub key: String,
    pub ignore: bool,
    pub original_attributes: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
    pub filter: Vec<RuleTrace>,
    pub rewrite: Vec<RuleTrace>,
    pub action: Vec<RuleTrace>,
    pub outcome: ActionOutcome,
}

/// Allocator view that never changes seat counts
struct Preview<'a>(Option<&'a dyn SeatAllocator>);

impl SeatAllocator for Preview<'_> {
    fn allocate(&self, candidates: &[String]) -> invsync_rules::Result<Option<String>> {
        Ok(self.0.and_then(|a| a.peek(candidates)))
    }

    fn peek(&self, candidates: &[String]) -> Option<String> {
        self.0.and_then(|a| a.peek(candidates))
    }

    fn release(&self, _folder: &str) -> invsync_rules::Result<()> {
        Ok(())
    }

    fn is_pool(&self, folder: &str) -> bool {
        self.0.is_some_and(|a| a.is_pool(folder))
    }
}

/// Runs the rule kinds of one account over records
pub struct Pipeline<'a> {
    account: &'a str,
    rules: &'a RuleSet,
    fingerprint: String,
    allocator: Option<&'a dyn SeatAllocator>,
    options: EngineOptions,
    debug: bool,
}

impl<'a> Pipeline<'a> {
    /// `rules` should already be [prepared](RuleSet::prepared)
    pub fn new(account: &'a str, rules: &'a RuleSet) -> Result<Self> {
        Ok(Self {
            account,
            rules,
            fingerprint: rules.fingerprint()?,
            allocator: None,
            options: EngineOptions::default(),
            debug: false,
        })
    }

    pub fn with_allocator(mut self, allocator: &'a dyn SeatAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cache_key(&self) -> String {
        format!("{}_attributes", self.account)
    }

    fn context<'r>(&self, record: &'r Record) -> EvalContext<'r> {
        EvalContext::new(record)
            .with_debug(self.debug)
            .with_options(self.options)
    }

    fn cached(&self, record: &Record) -> Option<CachedAttributes> {
        let value = record.cache.get(&self.cache_key())?;
        let cached: CachedAttributes = serde_json::from_value(value.clone()).ok()?;
        (cached.fingerprint == self.fingerprint).then_some(cached)
    }

    /// Filter then rewrite, returning the traces of both
    fn shape(
        &self,
        record: &Record,
    ) -> Result<(CachedAttributes, Vec<RuleTrace>, Vec<RuleTrace>)> {
        let ctx = self.context(record);
        let filtered = filter_attributes(&self.rules.filter, &ctx)?;
        let mut attributes = filtered.outcome.attributes.clone();

        let mut rewrite = RewriteBuilder::new(&filtered.outcome.attributes);
        let rewritten = evaluate(&self.rules.rewrite, &mut rewrite, &ctx)?;
        rewritten.outcome.apply(&mut attributes);

        Ok((
            CachedAttributes {
                fingerprint: self.fingerprint.clone(),
                ignore: filtered.outcome.ignore,
                attributes,
            },
            filtered.trace,
            rewritten.trace,
        ))
    }

    /// Evaluate one record
    ///
    /// Pool seats are taken and released as a side effect. A record that no
    /// longer matches a pool action gives its seat back here.
    pub fn process(&self, record: &Record) -> Result<RecordOutcome> {
        let (shaped, cache_update) = match self.cached(record) {
            Some(cached) => {
                debug!(record = %record.key, "Using cached attributes");
                (cached, None)
            }
            None => {
                let (shaped, _, _) = self.shape(record)?;
                let value = serde_json::to_value(&shaped)?;
                (shaped, Some(value))
            }
        };

        let actions = if shaped.ignore {
            ActionOutcome::default()
        } else {
            let view = record.with_attributes(shaped.attributes.clone());
            let mut builder = ActionBuilder::new(self.allocator);
            let result = evaluate(&self.rules.action, &mut builder, &self.context(&view))?;
            for trace in &result.trace {
                debug!(record = %record.key, rule = %trace.name, hit = trace.hit, "Action rule");
            }
            result.outcome
        };

        let pin = match (&record.pinned_folder, &actions.pool) {
            (Some(old), Some(new)) if old == new => PinChange::Keep,
            (_, Some(new)) => PinChange::Set(new.clone()),
            (Some(old), None) => {
                if let Some(allocator) = self.allocator {
                    allocator.release(old)?;
                }
                debug!(record = %record.key, folder = %old, "Pool no longer matches, pin cleared");
                PinChange::Cleared
            }
            (None, None) => PinChange::Keep,
        };

        Ok(RecordOutcome {
            key: record.key.clone(),
            ignore: shaped.ignore,
            attributes: shaped.attributes,
            actions,
            pin,
            cache_update,
        })
    }

    /// Trace one record through every rule without touching pool seats or the cache
    pub fn debug_record(&self, record: &Record) -> Result<RecordDebug> {
        let tracing = Pipeline {
            debug: true,
            ..Pipeline::new(self.account, self.rules)?.with_options(self.options)
        };
        let (shaped, filter, rewrite) = tracing.shape(record)?;

        let preview = Preview(self.allocator);
        let view = record.with_attributes(shaped.attributes.clone());
        let mut builder = ActionBuilder::new(Some(&preview));
        let actions = evaluate(&self.rules.action, &mut builder, &tracing.context(&view))?;

        Ok(RecordDebug {
            key: record.key.clone(),
            ignore: shaped.ignore,
            original_attributes: record.attributes().clone(),
            attributes: shaped.attributes,
            filter,
            rewrite,
            action: actions.trace,
            outcome: actions.outcome,
        })
    }
}

/// Apply pin and cache changes from `outcome` to `record`
///
/// Returns whether the record changed and needs saving.
pub fn apply_bookkeeping(record: &mut Record, cache_key: &str, outcome: &RecordOutcome) -> bool {
    let mut changed = false;
    match &outcome.pin {
        PinChange::Keep => {}
        PinChange::Set(folder) => {
            record.pinned_folder = Some(folder.clone());
            changed = true;
        }
        PinChange::Cleared => {
            record.pinned_folder = None;
            changed = true;
        }
    }
    if let Some(value) = &outcome.cache_update {
        record.cache.insert(cache_key.to_string(), value.clone());
        changed = true;
    }
    changed
}
