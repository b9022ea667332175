//! Cleanup phase: delete hosts this account owns but no longer exports

use std::collections::BTreeSet;
use tracing::{error, info, warn};

use super::apply::Applied;
use super::fetch::RemoteState;
use super::plan::SyncPlan;
use super::report::{DetailLevel, SyncReport};
use crate::remote::RemoteClient;

/// Hosts owned by `sync_id` that nothing in this run accounted for
///
/// Hosts of records whose evaluation or write failed are never candidates.
pub fn candidates(
    remote: &RemoteState,
    plan: &SyncPlan,
    applied: &Applied,
    sync_id: &str,
) -> BTreeSet<String> {
    remote
        .hosts
        .values()
        .filter(|h| h.is_owned_by(sync_id))
        .map(|h| &h.key)
        .filter(|k| !plan.contains(k) && !applied.touched.contains(*k))
        .filter(|k| !applied.failed.contains(*k) && !plan.failed.contains(*k))
        .cloned()
        .collect()
}

/// Delete stale owned hosts, unless there are more than `delete_limit`
pub fn cleanup(
    client: &RemoteClient,
    candidates: &BTreeSet<String>,
    delete_limit: usize,
    dry_run: bool,
    report: &mut SyncReport,
) {
    if candidates.len() > delete_limit {
        let message = format!(
            "Refusing to delete {} hosts, more than the limit of {delete_limit}",
            candidates.len()
        );
        error!(count = candidates.len(), limit = delete_limit, "{}", message);
        report.detail(DetailLevel::Error, message);
        return;
    }

    for host in candidates {
        if dry_run {
            report.counts.deleted += 1;
            report.push_action(format!("delete host {host}"));
            continue;
        }
        match client.delete_host(host) {
            Ok(true) => {
                report.counts.deleted += 1;
                report.push_action(format!("delete host {host}"));
            }
            Ok(false) => info!(host = %host, "Host was already gone"),
            Err(e) => {
                warn!(host = %host, error = %e, "Delete failed");
                report.push_error(format!("Deleting {host} failed: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{OWNER_LABEL, RemoteHost};
    use std::collections::BTreeMap;

    fn host(key: &str, owner: Option<&str>) -> RemoteHost {
        let mut labels = BTreeMap::new();
        if let Some(owner) = owner {
            labels.insert(OWNER_LABEL.to_string(), owner.to_string());
        }
        RemoteHost {
            key: key.to_string(),
            folder: "/".to_string(),
            attributes: serde_json::Map::new(),
            labels,
            cluster_nodes: None,
        }
    }

    #[test]
    fn only_unaccounted_owned_hosts_are_candidates() {
        let mut remote = RemoteState::default();
        for h in [
            host("kept", Some("prod")),
            host("stale", Some("prod")),
            host("foreign", Some("other")),
            host("manual", None),
            host("broken", Some("prod")),
            host("ignored", Some("prod")),
        ] {
            remote.hosts.insert(h.key.clone(), h);
        }
        let mut plan = SyncPlan::default();
        plan.failed.insert("broken".to_string());
        plan.ignored.insert("ignored".to_string());
        let mut applied = Applied::default();
        applied.touched.insert("kept".to_string());

        let found = candidates(&remote, &plan, &applied, "prod");
        let found: Vec<_> = found.into_iter().collect();
        assert_eq!(found, vec!["ignored", "stale"]);
    }
}
