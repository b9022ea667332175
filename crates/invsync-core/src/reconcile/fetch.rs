//! Fetch phase: read the remote folder tree and hosts

use rayon::ThreadPoolBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc;
use tracing::{debug, info};

use crate::Result;
use crate::remote::{RemoteClient, RemoteHost};

/// Remote state at the start of a run
#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    /// Normalized folder paths, including `/`
    pub folders: BTreeSet<String>,
    pub hosts: BTreeMap<String, RemoteHost>,
}

/// Load folders and hosts
///
/// With `by_folder`, hosts are fetched per folder on `workers` threads. Any
/// failed fetch fails the whole phase.
pub fn fetch(client: &RemoteClient, by_folder: bool, workers: usize) -> Result<RemoteState> {
    let folders = client.folders()?;
    debug!(count = folders.len(), "Fetched folders");

    let hosts = if by_folder {
        fetch_by_folder(client, &folders, workers)?
    } else {
        client.hosts()?
    };

    let hosts: BTreeMap<String, RemoteHost> =
        hosts.into_iter().map(|h| (h.key.clone(), h)).collect();
    info!(folders = folders.len(), hosts = hosts.len(), "Fetched remote state");
    Ok(RemoteState { folders, hosts })
}

fn fetch_by_folder(
    client: &RemoteClient,
    folders: &BTreeSet<String>,
    workers: usize,
) -> Result<Vec<RemoteHost>> {
    let pool = ThreadPoolBuilder::new().num_threads(workers.max(1)).build()?;
    let (tx, rx) = mpsc::channel();

    pool.scope(|scope| {
        for folder in folders {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = client.hosts_in_folder(folder);
                // The receiver outlives the scope
                let _ = tx.send((folder.clone(), result));
            });
        }
    });
    drop(tx);

    let mut hosts = Vec::new();
    for (folder, result) in rx {
        let found = result?;
        debug!(folder = %folder, count = found.len(), "Fetched folder hosts");
        hosts.extend(found);
    }
    Ok(hosts)
}
