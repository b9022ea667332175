//! Apply phase: push the plan to the remote system
//!
//! Order matters: folders first (top-down), then new hosts, then moves and
//! attribute updates of existing hosts, then clusters whose nodes now exist.
//! A failed folder creation fails the phase. A failed host or chunk is
//! recorded and the phase continues.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use invsync_rules::folder::ancestors;

use super::batch::chunks;
use super::fetch::RemoteState;
use super::plan::{HostDiff, HostPlan, SyncPlan};
use super::report::{DetailLevel, SyncReport};
use crate::Result;
use crate::config::AccountConfig;
use crate::remote::{HostCreate, HostUpdate, RemoteClient};

/// What the apply phase did, by host key
#[derive(Debug, Clone, Default)]
pub struct Applied {
    /// Hosts that are part of the plan; cleanup never deletes these
    pub touched: BTreeSet<String>,
    /// Hosts whose remote write failed
    pub failed: BTreeSet<String>,
    /// Hosts successfully created or changed
    pub exported: BTreeSet<String>,
}

/// Applies a [`SyncPlan`] for one account
pub struct Applier<'a> {
    client: &'a RemoteClient,
    config: &'a AccountConfig,
    dry_run: bool,
}

impl<'a> Applier<'a> {
    pub fn new(client: &'a RemoteClient, config: &'a AccountConfig, dry_run: bool) -> Self {
        Self {
            client,
            config,
            dry_run,
        }
    }

    pub fn apply(
        &self,
        plan: &SyncPlan,
        remote: &mut RemoteState,
        report: &mut SyncReport,
    ) -> Result<Applied> {
        let mut applied = Applied::default();

        let mut creates: Vec<&HostPlan> = Vec::new();
        let mut changes: Vec<(&HostPlan, HostDiff)> = Vec::new();
        let hosts = plan.hosts.values();
        let cluster_hosts = plan.clusters.values().map(|c| &c.host);
        for host in hosts.chain(cluster_hosts) {
            applied.touched.insert(host.key.clone());
            match remote.hosts.get(&host.key) {
                Some(existing) => {
                    let diff = host.diff(existing);
                    if !diff.is_empty() {
                        changes.push((host, diff));
                    }
                }
                None if plan.clusters.contains_key(&host.key) => {}
                None => creates.push(host),
            }
        }

        let mut needed: BTreeSet<String> = creates.iter().map(|h| h.folder.clone()).collect();
        needed.extend(changes.iter().filter_map(|(_, d)| d.move_to.clone()));
        needed.extend(
            plan.clusters
                .values()
                .filter(|c| !remote.hosts.contains_key(&c.host.key))
                .map(|c| c.host.folder.clone()),
        );
        self.ensure_folders(&needed, remote, report)?;

        self.create_hosts(&creates, report, &mut applied);
        self.change_hosts(&changes, report, &mut applied);
        self.apply_clusters(plan, remote, report, &mut applied);

        info!(
            created = report.counts.created,
            updated = report.counts.updated,
            failed = applied.failed.len(),
            "Apply phase done"
        );
        Ok(applied)
    }

    fn ensure_folders(
        &self,
        needed: &BTreeSet<String>,
        remote: &mut RemoteState,
        report: &mut SyncReport,
    ) -> Result<()> {
        for path in needed {
            for folder in ancestors(path) {
                if remote.folders.contains(&folder) {
                    continue;
                }
                if self.dry_run || self.client.create_folder(&folder)? {
                    report.counts.folders_created += 1;
                    report.push_action(format!("create folder {folder}"));
                } else {
                    debug!(folder = %folder, "Folder already existed");
                }
                remote.folders.insert(folder);
            }
        }
        Ok(())
    }

    fn fail(
        &self,
        keys: impl IntoIterator<Item = String>,
        message: String,
        report: &mut SyncReport,
        applied: &mut Applied,
    ) {
        warn!("{}", message);
        report.push_error(message);
        for key in keys {
            report.counts.failed += 1;
            applied.failed.insert(key);
        }
    }

    fn create_hosts(&self, creates: &[&HostPlan], report: &mut SyncReport, applied: &mut Applied) {
        let entries: Vec<HostCreate> = creates.iter().map(|h| h.to_create()).collect();
        let size = if self.config.bulk {
            self.config.chunk_size
        } else {
            1
        };

        for (index, chunk) in chunks(&entries, size).enumerate() {
            let result = if self.dry_run {
                Ok(())
            } else if self.config.bulk {
                debug!(chunk = index, hosts = chunk.len(), "Bulk create");
                self.client.bulk_create(chunk)
            } else {
                self.client.create_host(&chunk[0])
            };

            match result {
                Ok(()) => {
                    for entry in chunk {
                        report.counts.created += 1;
                        report.push_action(format!(
                            "create host {} in {}",
                            entry.host_name, entry.folder
                        ));
                        applied.exported.insert(entry.host_name.clone());
                    }
                }
                Err(e) => self.fail(
                    chunk.iter().map(|c| c.host_name.clone()),
                    format!("Creating {} host(s) failed: {e}", chunk.len()),
                    report,
                    applied,
                ),
            }
        }
    }

    fn change_hosts(
        &self,
        changes: &[(&HostPlan, HostDiff)],
        report: &mut SyncReport,
        applied: &mut Applied,
    ) {
        let mut updated: BTreeSet<String> = BTreeSet::new();
        let mut updates: Vec<HostUpdate> = Vec::new();
        // Tokens handed back by moves, consumed by single-host updates
        let mut tokens: BTreeMap<String, String> = BTreeMap::new();

        for (host, diff) in changes {
            if let Some(folder) = &diff.move_to {
                if !self.dry_run {
                    match self.client.move_host(&host.key, folder) {
                        Ok(token) => {
                            if let Some(token) = token {
                                tokens.insert(host.key.clone(), token);
                            }
                        }
                        Err(e) => {
                            self.fail(
                                [host.key.clone()],
                                format!("Moving {} to {folder} failed: {e}", host.key),
                                report,
                                applied,
                            );
                            continue;
                        }
                    }
                }
                report.push_action(format!("move host {} to {folder}", host.key));
                updated.insert(host.key.clone());
            }
            if !diff.update.is_empty() {
                updates.push(diff.update.clone());
            }
        }

        let size = if self.config.bulk {
            self.config.chunk_size
        } else {
            1
        };
        for (index, chunk) in chunks(&updates, size).enumerate() {
            let result = if self.dry_run {
                Ok(())
            } else if self.config.bulk {
                debug!(chunk = index, hosts = chunk.len(), "Bulk update");
                self.client.bulk_update(chunk)
            } else {
                let token = tokens.remove(&chunk[0].host_name);
                self.client.update_host(&chunk[0], token.as_deref()).map(|_| ())
            };

            match result {
                Ok(()) => {
                    for update in chunk {
                        report.push_action(format!("update host {}", update.host_name));
                        updated.insert(update.host_name.clone());
                    }
                }
                Err(e) => {
                    let keys: Vec<String> = chunk.iter().map(|u| u.host_name.clone()).collect();
                    for key in &keys {
                        updated.remove(key);
                    }
                    self.fail(
                        keys,
                        format!("Updating {} host(s) failed: {e}", chunk.len()),
                        report,
                        applied,
                    );
                }
            }
        }

        report.counts.updated += updated.len();
        applied.exported.extend(updated);
    }

    fn apply_clusters(
        &self,
        plan: &SyncPlan,
        remote: &RemoteState,
        report: &mut SyncReport,
        applied: &mut Applied,
    ) {
        for cluster in plan.clusters.values() {
            let key = &cluster.host.key;
            let missing: Vec<&String> = cluster
                .nodes
                .iter()
                .filter(|n| !remote.hosts.contains_key(*n) && !applied.exported.contains(*n))
                .collect();
            if !missing.is_empty() {
                let message = format!(
                    "Cluster {key} skipped, nodes not present: {}",
                    missing
                        .iter()
                        .map(|n| n.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                warn!("{}", message);
                report.detail(DetailLevel::Warning, message);
                continue;
            }

            match remote.hosts.get(key) {
                None => {
                    let result = if self.dry_run {
                        Ok(())
                    } else {
                        self.client
                            .create_cluster(&cluster.host.to_create(), &cluster.nodes)
                    };
                    match result {
                        Ok(()) => {
                            report.counts.clusters_created += 1;
                            report.push_action(format!(
                                "create cluster {key} with nodes {}",
                                cluster.nodes.join(", ")
                            ));
                            applied.exported.insert(key.clone());
                        }
                        Err(e) => self.fail(
                            [key.clone()],
                            format!("Creating cluster {key} failed: {e}"),
                            report,
                            applied,
                        ),
                    }
                }
                Some(existing) if cluster.nodes_differ(existing.cluster_nodes.as_deref()) => {
                    let result = if self.dry_run {
                        Ok(())
                    } else {
                        self.client.update_cluster_nodes(key, &cluster.nodes)
                    };
                    match result {
                        Ok(()) => {
                            report.counts.updated += 1;
                            report.push_action(format!("update nodes of cluster {key}"));
                            applied.exported.insert(key.clone());
                        }
                        Err(e) => self.fail(
                            [key.clone()],
                            format!("Updating nodes of cluster {key} failed: {e}"),
                            report,
                            applied,
                        ),
                    }
                }
                Some(_) => {}
            }
        }
    }
}
