//! Seat allocation over folder pools

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use invsync_rules::SeatAllocator;

use super::{FolderPool, PoolStore};
use crate::Result;

/// First-fit allocator over pools ordered by name
///
/// All seat changes go through one mutex and are persisted before the lock
/// is released. A failed save reverts the in-memory change.
pub struct FolderPoolAllocator<S> {
    store: S,
    pools: Mutex<BTreeMap<String, FolderPool>>,
}

impl<S: PoolStore> FolderPoolAllocator<S> {
    /// Load pool state from `store`
    pub fn new(store: S) -> Result<Self> {
        let pools = store
            .load()?
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Ok(Self {
            store,
            pools: Mutex::new(pools),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current pool state, ordered by name
    pub fn pools(&self) -> Vec<FolderPool> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, FolderPool>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, pools: &BTreeMap<String, FolderPool>) -> Result<()> {
        let list: Vec<FolderPool> = pools.values().cloned().collect();
        self.store.save(&list)
    }

    fn first_fit<'a>(
        pools: &'a BTreeMap<String, FolderPool>,
        candidates: &[String],
    ) -> Option<&'a FolderPool> {
        pools
            .values()
            .filter(|p| candidates.is_empty() || candidates.contains(&p.name))
            .find(|p| p.has_room())
    }

    /// Take a seat in the first eligible pool with room
    pub fn allocate(&self, candidates: &[String]) -> Result<Option<String>> {
        let mut pools = self.lock();
        let Some(name) = Self::first_fit(&pools, candidates).map(|p| p.name.clone()) else {
            debug!(?candidates, "No pool seat available");
            return Ok(None);
        };

        if let Some(pool) = pools.get_mut(&name) {
            pool.seats_taken += 1;
        }
        if let Err(e) = self.persist(&pools) {
            if let Some(pool) = pools.get_mut(&name) {
                pool.seats_taken -= 1;
            }
            return Err(e);
        }
        Ok(Some(name))
    }

    /// Give back a seat; never goes below zero
    pub fn release(&self, folder: &str) -> Result<()> {
        let mut pools = self.lock();
        let Some(pool) = pools.get_mut(folder) else {
            warn!(folder, "Release for unknown pool ignored");
            return Ok(());
        };
        if pool.seats_taken == 0 {
            warn!(folder, "Release on empty pool ignored");
            return Ok(());
        }
        pool.seats_taken -= 1;

        if let Err(e) = self.persist(&pools) {
            if let Some(pool) = pools.get_mut(folder) {
                pool.seats_taken += 1;
            }
            return Err(e);
        }
        Ok(())
    }
}

impl<S: PoolStore> SeatAllocator for FolderPoolAllocator<S> {
    fn allocate(&self, candidates: &[String]) -> invsync_rules::Result<Option<String>> {
        FolderPoolAllocator::allocate(self, candidates).map_err(invsync_rules::Error::allocator)
    }

    fn peek(&self, candidates: &[String]) -> Option<String> {
        Self::first_fit(&self.lock(), candidates).map(|p| p.name.clone())
    }

    fn release(&self, folder: &str) -> invsync_rules::Result<()> {
        FolderPoolAllocator::release(self, folder).map_err(invsync_rules::Error::allocator)
    }

    fn is_pool(&self, folder: &str) -> bool {
        self.lock().get(folder).is_some_and(|p| p.enabled)
    }
}
