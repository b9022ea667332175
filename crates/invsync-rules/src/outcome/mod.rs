//! Outcome builders
//!
//! All three builders plug into [`crate::engine::evaluate`]:
//!
//! - [`FilterBuilder`]: attribute whitelist and host ignore
//! - [`RewriteBuilder`]: attribute rename and value transform
//! - [`ActionBuilder`]: placement, attribute and cluster decisions

mod action;
mod filter;
mod rewrite;

pub use action::{Action, ActionBuilder, ActionOutcome, SeatAllocator};
pub use filter::{FilterAction, FilterBuilder, FilterOutcome, filter_attributes};
pub use rewrite::{AttributeChange, RewriteAction, RewriteBuilder, RewriteOutcome};
