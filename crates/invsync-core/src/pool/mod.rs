//! Folder pools
//!
//! A pool is a folder with a fixed number of seats. Records placed by a
//! `folder_pool` action take a seat and keep it (their pin) until no pool
//! action matches them any more.

mod allocator;
mod store;

pub use allocator::FolderPoolAllocator;
pub use store::{MemoryPoolStore, PoolStore, TomlPoolStore};

use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// A capacity-bounded placement target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPool {
    /// Pool name, also the folder records are placed in
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub seats_taken: u32,
    /// Disabled pools hand out no seats but still accept releases
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FolderPool {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            seats_taken: 0,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn free_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.seats_taken)
    }

    pub fn has_room(&self) -> bool {
        self.enabled && self.free_seats() > 0
    }
}
