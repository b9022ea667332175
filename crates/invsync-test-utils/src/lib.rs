//! Shared test utilities for the inventory-sync workspace.
//!
//! This crate is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`remote`]: [`FakeRemote`], an in-memory remote system behind the `Transport` trait
//! - [`record`]: [`RecordBuilder`] for terse record setup
//! - [`workspace`]: [`TestWorkspace`], a temporary config directory for service and CLI tests

pub mod record;
pub mod remote;
pub mod workspace;

pub use record::RecordBuilder;
pub use remote::{FakeHost, FakeRemote};
pub use workspace::TestWorkspace;
