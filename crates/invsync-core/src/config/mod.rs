//! Configuration management
//!
//! - [`Manifest`]: parsed `invsync.toml`
//! - [`ConfigResolver`]: loads the manifest and its `invsync.local.toml` overlay
//! - [`ResolvedConfig`]: merged result with paths and accounts resolved

mod manifest;
mod resolver;

pub use manifest::{AccountConfig, Manifest, PathsSection};
pub use resolver::{Account, ConfigResolver, ResolvedConfig};
