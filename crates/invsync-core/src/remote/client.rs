//! Typed client for the remote host-management API
//!
//! Every call goes through [`RemoteClient::call`], which turns non-2xx
//! answers into [`Error::RemoteSystem`] unless their title is whitelisted.
//! Writes go through [`RemoteClient::write`], which tolerates nothing: a
//! host create or update answered with "not found" did not happen.

use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use invsync_rules::folder::split_parent;
use invsync_rules::format_folder_path;

use super::transport::{Request, Response, Transport};
use crate::{Error, Result};

/// Label key marking hosts created by this tool
pub const OWNER_LABEL: &str = "invsync";

/// Error titles that are tolerated instead of raised
const TOLERATED_TITLES: [&str; 2] = ["not found", "already exists"];

/// Remote folder id for a folder path: `/a/b` becomes `~a~b`
pub fn folder_id(path: &str) -> String {
    format_folder_path(path).replace('/', "~")
}

fn error_title(response: &Response) -> String {
    response
        .body
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn remote_error(response: &Response, path: String) -> Error {
    Error::RemoteSystem {
        status: response.status,
        title: error_title(response),
        detail: response
            .body
            .get("detail")
            .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
            .unwrap_or_default(),
        path,
    }
}

/// A host as the remote system reports it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteHost {
    pub key: String,
    /// Normalized folder path
    pub folder: String,
    /// Host attributes without `labels`
    pub attributes: Map<String, Value>,
    pub labels: BTreeMap<String, String>,
    /// Set for cluster hosts
    pub cluster_nodes: Option<Vec<String>>,
}

impl RemoteHost {
    /// Parse one entry of a host collection
    fn from_entry(entry: &Value) -> Option<Self> {
        let key = entry.get("id")?.as_str()?.to_string();
        let ext = entry.get("extensions").cloned().unwrap_or(Value::Null);

        let folder = format_folder_path(ext.get("folder").and_then(Value::as_str).unwrap_or("/"));
        let mut attributes = ext
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let labels = attributes
            .remove("labels")
            .and_then(|v| v.as_object().cloned())
            .map(|m| {
                m.into_iter()
                    .map(|(k, v)| {
                        let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                        (k, v)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let cluster_nodes = ext.get("cluster_nodes").and_then(Value::as_array).map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        });

        Some(Self {
            key,
            folder,
            attributes,
            labels,
            cluster_nodes,
        })
    }

    /// Whether this host carries the ownership label for `sync_id`
    pub fn is_owned_by(&self, sync_id: &str) -> bool {
        self.labels.get(OWNER_LABEL).is_some_and(|v| v == sync_id)
    }
}

/// Entry for creating a host
#[derive(Debug, Clone, PartialEq)]
pub struct HostCreate {
    pub host_name: String,
    pub folder: String,
    /// Attributes including `labels`
    pub attributes: Map<String, Value>,
}

impl HostCreate {
    fn to_json(&self) -> Value {
        json!({
            "host_name": self.host_name,
            "folder": folder_id(&self.folder),
            "attributes": self.attributes,
        })
    }
}

/// Entry for updating a host's attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostUpdate {
    pub host_name: String,
    pub update_attributes: Map<String, Value>,
    pub remove_attributes: Vec<String>,
}

impl HostUpdate {
    pub fn is_empty(&self) -> bool {
        self.update_attributes.is_empty() && self.remove_attributes.is_empty()
    }

    fn to_json(&self, with_name: bool) -> Value {
        let mut body = Map::new();
        if with_name {
            body.insert("host_name".into(), Value::String(self.host_name.clone()));
        }
        if !self.update_attributes.is_empty() {
            body.insert(
                "update_attributes".into(),
                Value::Object(self.update_attributes.clone()),
            );
        }
        if !self.remove_attributes.is_empty() {
            body.insert("remove_attributes".into(), json!(self.remove_attributes));
        }
        Value::Object(body)
    }
}

/// Typed operations over a [`Transport`]
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a request, raising non-whitelisted failures
    ///
    /// Tolerated failures are returned as-is; callers check
    /// [`Response::is_success`].
    pub fn call(&self, request: Request) -> Result<Response> {
        let response = self.transport.send(&request)?;
        if response.is_success() {
            return Ok(response);
        }

        let title = error_title(&response);
        let lowered = title.to_lowercase();
        if TOLERATED_TITLES.iter().any(|t| lowered.contains(t)) {
            debug!(path = %request.path, status = response.status, title = %title, "Tolerated remote error");
            return Ok(response);
        }

        Err(remote_error(&response, request.path))
    }

    /// Send a request that must succeed
    ///
    /// Whitelisted titles are raised like any other failure.
    pub fn write(&self, request: Request) -> Result<Response> {
        let path = request.path.clone();
        let response = self.call(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(remote_error(&response, path))
        }
    }

    fn value_list(response: &Response, path: &str) -> Result<Vec<Value>> {
        response
            .body
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| Error::UnexpectedResponse {
                path: path.to_string(),
                message: "missing value list".to_string(),
            })
    }

    /// Every folder path, normalized, including the root
    pub fn folders(&self) -> Result<BTreeSet<String>> {
        let path = "/domain-types/folder_config/collections/all?recursive=true&show_hosts=false";
        let response = self.call(Request::get(path))?;
        let mut folders = BTreeSet::from(["/".to_string()]);
        for entry in Self::value_list(&response, path)? {
            let folder = entry
                .pointer("/extensions/path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    entry
                        .get("id")
                        .and_then(Value::as_str)
                        .map(|id| id.replace('~', "/"))
                });
            if let Some(folder) = folder {
                folders.insert(format_folder_path(&folder));
            }
        }
        Ok(folders)
    }

    /// Create one folder below its parent
    ///
    /// Returns `false` when the folder already existed.
    pub fn create_folder(&self, path: &str) -> Result<bool> {
        let Some((parent, name)) = split_parent(path) else {
            return Ok(false);
        };
        let response = self.call(Request::post(
            "/domain-types/folder_config/collections/all",
            json!({ "name": name, "title": name, "parent": folder_id(&parent) }),
        ))?;
        Ok(response.is_success())
    }

    /// All hosts in one call
    pub fn hosts(&self) -> Result<Vec<RemoteHost>> {
        self.host_collection("/domain-types/host_config/collections/all?effective_attributes=false")
    }

    /// Hosts directly inside one folder
    pub fn hosts_in_folder(&self, folder: &str) -> Result<Vec<RemoteHost>> {
        self.host_collection(&format!(
            "/objects/folder_config/{}/collections/hosts",
            folder_id(folder)
        ))
    }

    fn host_collection(&self, path: &str) -> Result<Vec<RemoteHost>> {
        let response = self.call(Request::get(path))?;
        if !response.is_success() {
            return Ok(Vec::new());
        }
        Ok(Self::value_list(&response, path)?
            .iter()
            .filter_map(RemoteHost::from_entry)
            .collect())
    }

    /// Current concurrency token of a host, `None` if the host is gone
    pub fn etag(&self, host: &str) -> Result<Option<String>> {
        let response = self.call(Request::get(format!("/objects/host_config/{host}")))?;
        if !response.is_success() {
            return Ok(None);
        }
        Ok(response.etag().map(str::to_string))
    }

    fn require_etag(&self, host: &str) -> Result<String> {
        self.etag(host)?.ok_or_else(|| Error::UnexpectedResponse {
            path: format!("/objects/host_config/{host}"),
            message: "no etag for host".to_string(),
        })
    }

    pub fn bulk_create(&self, entries: &[HostCreate]) -> Result<()> {
        let entries: Vec<Value> = entries.iter().map(HostCreate::to_json).collect();
        self.write(Request::post(
            "/domain-types/host_config/actions/bulk-create/invoke",
            json!({ "entries": entries }),
        ))?;
        Ok(())
    }

    pub fn create_host(&self, entry: &HostCreate) -> Result<()> {
        self.write(Request::post(
            "/domain-types/host_config/collections/all",
            entry.to_json(),
        ))?;
        Ok(())
    }

    pub fn bulk_update(&self, entries: &[HostUpdate]) -> Result<()> {
        let entries: Vec<Value> = entries.iter().map(|e| e.to_json(true)).collect();
        self.write(Request::put(
            "/domain-types/host_config/actions/bulk-update/invoke",
            json!({ "entries": entries }),
        ))?;
        Ok(())
    }

    /// Update one host and return its refreshed token
    ///
    /// `etag` is a token from a previous write to this host; without one the
    /// current token is fetched first.
    pub fn update_host(&self, update: &HostUpdate, etag: Option<&str>) -> Result<Option<String>> {
        let etag = match etag {
            Some(etag) => etag.to_string(),
            None => self.require_etag(&update.host_name)?,
        };
        let response = self.write(
            Request::put(
                format!("/objects/host_config/{}", update.host_name),
                update.to_json(false),
            )
            .if_match(&etag),
        )?;
        Ok(response.etag().map(str::to_string))
    }

    /// Move a host and return its refreshed token
    pub fn move_host(&self, host: &str, folder: &str) -> Result<Option<String>> {
        let etag = self.require_etag(host)?;
        let response = self.write(
            Request::post(
                format!("/objects/host_config/{host}/actions/move/invoke"),
                json!({ "target_folder": folder_id(folder) }),
            )
            .if_match(&etag),
        )?;
        Ok(response.etag().map(str::to_string))
    }

    /// Delete a host; returns `false` when it was already gone
    pub fn delete_host(&self, host: &str) -> Result<bool> {
        let Some(etag) = self.etag(host)? else {
            return Ok(false);
        };
        let response =
            self.call(Request::delete(format!("/objects/host_config/{host}")).if_match(&etag))?;
        Ok(response.is_success())
    }

    pub fn create_cluster(&self, entry: &HostCreate, nodes: &[String]) -> Result<()> {
        self.write(Request::post(
            "/domain-types/host_config/collections/clusters",
            json!({
                "host_name": entry.host_name,
                "folder": folder_id(&entry.folder),
                "nodes": nodes,
                "attributes": entry.attributes,
            }),
        ))?;
        Ok(())
    }

    pub fn update_cluster_nodes(&self, host: &str, nodes: &[String]) -> Result<()> {
        let etag = self.require_etag(host)?;
        self.write(
            Request::put(
                format!("/objects/host_config/{host}/properties/nodes"),
                json!({ "nodes": nodes }),
            )
            .if_match(&etag),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::transport::Method;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays canned responses and records requests
    struct Canned {
        responses: Mutex<Vec<Response>>,
        seen: Mutex<Vec<Request>>,
    }

    impl Canned {
        fn new(responses: Vec<Response>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for Canned {
        fn send(&self, request: &Request) -> Result<Response> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    #[test]
    fn folder_ids() {
        assert_eq!(folder_id("/"), "~");
        assert_eq!(folder_id("/Prod/Web"), "~prod~web");
    }

    #[test]
    fn non_whitelisted_error_is_raised() {
        let canned = Canned::new(vec![Response::new(
            500,
            json!({ "title": "Internal Server Error", "detail": "boom" }),
        )]);
        let client = RemoteClient::new(canned);
        let err = client.hosts().unwrap_err();
        assert!(matches!(err, Error::RemoteSystem { status: 500, .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn whitelisted_error_is_tolerated() {
        let canned = Canned::new(vec![Response::new(
            400,
            json!({ "title": "Folder already exists" }),
        )]);
        let client = RemoteClient::new(canned);
        assert!(!client.create_folder("/prod").unwrap());
    }

    #[test]
    fn tolerated_title_on_a_write_is_an_error() {
        let canned = Canned::new(vec![Response::new(404, json!({ "title": "Not Found" }))]);
        let entry = HostCreate {
            host_name: "web01".to_string(),
            folder: "/prod".to_string(),
            attributes: Map::new(),
        };
        let err = RemoteClient::new(canned).bulk_create(&[entry]).unwrap_err();
        assert!(matches!(err, Error::RemoteSystem { status: 404, ref title, .. } if title == "Not Found"));
    }

    #[test]
    fn update_reuses_a_known_token() {
        let canned = Canned::new(vec![
            Response::new(200, Value::Null).with_header("ETag", "\"8\""),
        ]);
        let client = RemoteClient::new(canned.clone());
        let update = HostUpdate {
            host_name: "web01".to_string(),
            remove_attributes: vec!["alias".to_string()],
            ..HostUpdate::default()
        };

        let refreshed = client.update_host(&update, Some("\"7\"")).unwrap();

        assert_eq!(refreshed.as_deref(), Some("\"8\""));
        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Put);
        assert_eq!(seen[0].headers.get("If-Match").map(String::as_str), Some("\"7\""));
    }

    #[test]
    fn host_entries_are_parsed() {
        let canned = Canned::new(vec![Response::new(
            200,
            json!({ "value": [{
                "id": "web01",
                "extensions": {
                    "folder": "/Prod",
                    "attributes": { "alias": "w1", "labels": { "invsync": "prod", "env": "prod" } },
                    "cluster_nodes": null
                }
            }]}),
        )]);
        let hosts = RemoteClient::new(canned).hosts().unwrap();

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].folder, "/prod");
        assert!(hosts[0].is_owned_by("prod"));
        assert!(!hosts[0].attributes.contains_key("labels"));
        assert_eq!(hosts[0].cluster_nodes, None);
    }

    #[test]
    fn delete_sends_if_match() {
        let canned = Canned::new(vec![
            Response::new(200, json!({ "id": "web01" })).with_header("ETag", "\"abc\""),
            Response::new(204, Value::Null),
        ]);
        let client = RemoteClient::new(canned.clone());
        assert!(client.delete_host("web01").unwrap());

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen[1].method, Method::Delete);
        assert_eq!(seen[1].headers.get("If-Match").map(String::as_str), Some("\"abc\""));
    }

    #[test]
    fn delete_of_missing_host_is_not_an_error() {
        let canned = Canned::new(vec![Response::new(404, json!({ "title": "Not Found" }))]);
        assert!(!RemoteClient::new(canned).delete_host("gone").unwrap());
    }
}
