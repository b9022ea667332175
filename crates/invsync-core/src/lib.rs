//! Reconciliation engine for inventory-sync
//!
//! This crate connects rule evaluation from `invsync-rules` to its
//! collaborators, implementing:
//!
//! - **Configuration resolution**: `invsync.toml` plus a local overlay
//! - **Record storage**: the [`RecordStore`] trait with file and memory backends
//! - **Folder pools**: seat accounting behind [`FolderPoolAllocator`]
//! - **Remote client**: typed calls over a pluggable [`Transport`]
//! - **Reconciler**: fetch, compute, apply and cleanup for one account
//!
//! # Architecture
//!
//! ```text
//!                     CLI
//!                      |
//!                 SyncService
//!                      |
//!                 Reconciler
//!                      |
//!     +---------+------+-----+-----------+
//!     |         |            |           |
//! RecordStore Pipeline  RemoteClient  FolderPoolAllocator
//!               |            |
//!        invsync-rules   Transport
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod reconcile;
pub mod remote;
pub mod service;
pub mod store;

pub use config::{Account, AccountConfig, ConfigResolver, Manifest, ResolvedConfig};
pub use error::{Error, Result};
pub use pipeline::{PinChange, Pipeline, RecordDebug, RecordOutcome, apply_bookkeeping};
pub use pool::{FolderPool, FolderPoolAllocator, MemoryPoolStore, PoolStore, TomlPoolStore};
pub use reconcile::{Reconciler, RunOptions, SyncCounts, SyncReport};
pub use remote::{HttpTransport, RemoteClient, Request, Response, Transport};
pub use service::SyncService;
pub use store::{FileRecordStore, MemoryRecordStore, RecordFilter, RecordStore};
