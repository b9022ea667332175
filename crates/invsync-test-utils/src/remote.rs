//! [`FakeRemote`]: an in-memory stand-in for the remote host-management API.
//!
//! It understands the endpoints `RemoteClient` calls, checks `If-Match`
//! tokens on single-host writes and logs every request so tests can assert
//! on what was (or was not) sent.

use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use invsync_core::remote::{Method, OWNER_LABEL, Request, Response, Transport, folder_id};

/// A host held by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct FakeHost {
    pub folder: String,
    /// Attributes including `labels`
    pub attributes: Map<String, Value>,
    pub cluster_nodes: Option<Vec<String>>,
    pub etag: u64,
}

impl FakeHost {
    /// The host's labels as strings.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.attributes
            .get("labels")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    fn to_entry(&self, key: &str) -> Value {
        let mut extensions = json!({
            "folder": self.folder,
            "attributes": self.attributes,
        });
        if let Some(nodes) = &self.cluster_nodes {
            extensions["cluster_nodes"] = json!(nodes);
        }
        json!({ "id": key, "extensions": extensions })
    }
}

#[derive(Debug, Default)]
struct State {
    folders: BTreeSet<String>,
    hosts: BTreeMap<String, FakeHost>,
    calls: Vec<(Method, String)>,
    /// Canned answers: method, path prefix, status, title
    failures: Vec<(Method, String, u16, String)>,
    unreachable: bool,
    next_etag: u64,
}

impl State {
    fn etag(&mut self) -> u64 {
        self.next_etag += 1;
        self.next_etag
    }
}

/// In-memory remote system.
///
/// Share it as `Arc<FakeRemote>` and hand a clone to the client as
/// `Arc<dyn Transport>`.
#[derive(Debug)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn ok(body: Value) -> Response {
    Response::new(200, body)
}

fn error(status: u16, title: &str, detail: &str) -> Response {
    Response::new(status, json!({ "title": title, "detail": detail }))
}

fn not_found(host: &str) -> Response {
    error(404, "Not Found", &format!("Host {host} not found"))
}

fn path_from_id(id: &str) -> String {
    let path = id.replace('~', "/");
    if path.is_empty() { "/".to_string() } else { path }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

impl FakeRemote {
    /// An empty remote with only the root folder.
    pub fn new() -> Self {
        let state = State {
            folders: BTreeSet::from(["/".to_string()]),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a folder and its ancestors.
    pub fn with_folder(self, path: &str) -> Self {
        {
            let mut state = self.lock();
            let mut current = String::new();
            for part in path.split('/').filter(|p| !p.is_empty()) {
                current = format!("{current}/{part}");
                state.folders.insert(current.clone());
            }
        }
        self
    }

    /// Add a host with the given labels.
    pub fn with_host(self, key: &str, folder: &str, labels: &[(&str, &str)]) -> Self {
        let this = self.with_folder(folder);
        {
            let mut state = this.lock();
            let labels: Map<String, Value> = labels
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect();
            let mut attributes = Map::new();
            attributes.insert("labels".to_string(), Value::Object(labels));
            let etag = state.etag();
            state.hosts.insert(
                key.to_string(),
                FakeHost {
                    folder: folder.to_string(),
                    attributes,
                    cluster_nodes: None,
                    etag,
                },
            );
        }
        this
    }

    /// Add a host carrying the ownership label of `sync_id`.
    pub fn with_owned_host(self, key: &str, folder: &str, sync_id: &str) -> Self {
        self.with_host(key, folder, &[(OWNER_LABEL, sync_id)])
    }

    /// Answer 500 to every `method` request whose path starts with `prefix`.
    pub fn fail_on(&self, method: Method, prefix: &str) {
        self.answer_on(method, prefix, 500, "Internal Server Error");
    }

    /// Answer `status` with error `title` to every `method` request whose path
    /// starts with `prefix`, without touching any state.
    pub fn answer_on(&self, method: Method, prefix: &str, status: u16, title: &str) {
        self.lock()
            .failures
            .push((method, prefix.to_string(), status, title.to_string()));
    }

    /// Make every request fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn folders(&self) -> BTreeSet<String> {
        self.lock().folders.clone()
    }

    pub fn hosts(&self) -> BTreeMap<String, FakeHost> {
        self.lock().hosts.clone()
    }

    pub fn host(&self, key: &str) -> Option<FakeHost> {
        self.lock().hosts.get(key).cloned()
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.lock().calls.clone()
    }

    /// Number of `method` requests whose path starts with `prefix`.
    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(m, p)| *m == method && p.starts_with(prefix))
            .count()
    }

    /// Number of requests that could have changed state.
    pub fn writes(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(m, _)| *m != Method::Get)
            .count()
    }

    fn route(state: &mut State, request: &Request) -> Response {
        let path = request.path.split('?').next().unwrap_or_default();
        let body = request.body.clone().unwrap_or(Value::Null);
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["domain-types", "folder_config", "collections", "all"]) => {
                let value: Vec<Value> = state
                    .folders
                    .iter()
                    .filter(|f| f.as_str() != "/")
                    .map(|f| json!({ "id": folder_id(f), "extensions": { "path": f } }))
                    .collect();
                ok(json!({ "value": value }))
            }
            (Method::Post, ["domain-types", "folder_config", "collections", "all"]) => {
                Self::create_folder(state, &body)
            }
            (Method::Get, ["domain-types", "host_config", "collections", "all"]) => {
                let value: Vec<Value> = state.hosts.iter().map(|(k, h)| h.to_entry(k)).collect();
                ok(json!({ "value": value }))
            }
            (Method::Get, ["objects", "folder_config", id, "collections", "hosts"]) => {
                let folder = path_from_id(id);
                if !state.folders.contains(&folder) {
                    return error(404, "Not Found", "Folder not found");
                }
                let value: Vec<Value> = state
                    .hosts
                    .iter()
                    .filter(|(_, h)| h.folder == folder)
                    .map(|(k, h)| h.to_entry(k))
                    .collect();
                ok(json!({ "value": value }))
            }
            (Method::Post, ["domain-types", "host_config", "collections", "all"]) => {
                Self::create_hosts(state, &[body])
            }
            (Method::Post, ["domain-types", "host_config", "actions", "bulk-create", "invoke"]) => {
                let entries = body["entries"].as_array().cloned().unwrap_or_default();
                Self::create_hosts(state, &entries)
            }
            (Method::Put, ["domain-types", "host_config", "actions", "bulk-update", "invoke"]) => {
                let entries = body["entries"].as_array().cloned().unwrap_or_default();
                if let Some(missing) = entries
                    .iter()
                    .filter_map(|e| e["host_name"].as_str())
                    .find(|h| !state.hosts.contains_key(*h))
                {
                    return not_found(missing);
                }
                for entry in &entries {
                    let key = entry["host_name"].as_str().unwrap_or_default().to_string();
                    Self::update_attributes(state, &key, entry);
                    let etag = state.etag();
                    if let Some(h) = state.hosts.get_mut(&key) {
                        h.etag = etag;
                    }
                }
                ok(Value::Null)
            }
            (Method::Post, ["domain-types", "host_config", "collections", "clusters"]) => {
                Self::create_cluster(state, &body)
            }
            (Method::Get, ["objects", "host_config", host]) => match state.hosts.get(*host) {
                Some(h) => ok(h.to_entry(host)).with_header("ETag", format!("\"{}\"", h.etag)),
                None => not_found(host),
            },
            (Method::Put, ["objects", "host_config", host]) => {
                Self::guarded(state, request, host, |state, key| {
                    Self::update_attributes(state, key, &body);
                })
            }
            (Method::Post, ["objects", "host_config", host, "actions", "move", "invoke"]) => {
                let target = path_from_id(body["target_folder"].as_str().unwrap_or_default());
                if !state.folders.contains(&target) {
                    return error(400, "Bad Request", &format!("Folder {target} missing"));
                }
                Self::guarded(state, request, host, |state, key| {
                    if let Some(h) = state.hosts.get_mut(key) {
                        h.folder = target.clone();
                    }
                })
            }
            (Method::Put, ["objects", "host_config", host, "properties", "nodes"]) => {
                let nodes = string_list(body.get("nodes"));
                Self::guarded(state, request, host, |state, key| {
                    if let Some(h) = state.hosts.get_mut(key) {
                        h.cluster_nodes = Some(nodes.clone());
                    }
                })
            }
            (Method::Delete, ["objects", "host_config", host]) => {
                let response = Self::guarded(state, request, host, |state, key| {
                    state.hosts.remove(key);
                });
                if response.is_success() {
                    Response::new(204, Value::Null)
                } else {
                    response
                }
            }
            _ => error(404, "Not Found", &format!("No route for {path}")),
        }
    }

    /// Run `change` on `host` if its token matches `If-Match`, bumping the token.
    fn guarded(
        state: &mut State,
        request: &Request,
        host: &str,
        change: impl FnOnce(&mut State, &str),
    ) -> Response {
        let Some(current) = state.hosts.get(host).map(|h| h.etag) else {
            return not_found(host);
        };
        match request.headers.get("If-Match") {
            None => return error(428, "Precondition Required", "If-Match header missing"),
            Some(token) if *token != format!("\"{current}\"") => {
                return error(412, "Precondition Failed", "ETag mismatch");
            }
            Some(_) => {}
        }
        change(state, host);
        let etag = state.etag();
        if let Some(h) = state.hosts.get_mut(host) {
            h.etag = etag;
        }
        ok(Value::Null).with_header("ETag", format!("\"{etag}\""))
    }

    fn create_folder(state: &mut State, body: &Value) -> Response {
        let name = body["name"].as_str().unwrap_or_default();
        let parent = path_from_id(body["parent"].as_str().unwrap_or("~"));
        if !state.folders.contains(&parent) {
            return error(400, "Bad Request", &format!("Parent folder {parent} missing"));
        }
        let path = if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        };
        if !state.folders.insert(path.clone()) {
            return error(400, "Folder already exists", &path);
        }
        ok(json!({ "id": folder_id(&path) }))
    }

    fn create_hosts(state: &mut State, entries: &[Value]) -> Response {
        for entry in entries {
            let key = entry["host_name"].as_str().unwrap_or_default();
            let folder = path_from_id(entry["folder"].as_str().unwrap_or("~"));
            if state.hosts.contains_key(key) {
                return error(400, "Bad Request", &format!("Host {key} exists"));
            }
            if !state.folders.contains(&folder) {
                return error(400, "Bad Request", &format!("Folder {folder} missing"));
            }
        }
        for entry in entries {
            let key = entry["host_name"].as_str().unwrap_or_default().to_string();
            let etag = state.etag();
            state.hosts.insert(
                key,
                FakeHost {
                    folder: path_from_id(entry["folder"].as_str().unwrap_or("~")),
                    attributes: entry["attributes"].as_object().cloned().unwrap_or_default(),
                    cluster_nodes: None,
                    etag,
                },
            );
        }
        ok(Value::Null)
    }

    fn create_cluster(state: &mut State, body: &Value) -> Response {
        let key = body["host_name"].as_str().unwrap_or_default().to_string();
        let nodes = string_list(body.get("nodes"));
        if let Some(missing) = nodes.iter().find(|n| !state.hosts.contains_key(*n)) {
            return error(400, "Bad Request", &format!("Node {missing} missing"));
        }
        let response = Self::create_hosts(state, &[body.clone()]);
        if response.is_success()
            && let Some(h) = state.hosts.get_mut(&key)
        {
            h.cluster_nodes = Some(nodes);
        }
        response
    }

    fn update_attributes(state: &mut State, key: &str, body: &Value) {
        let Some(host) = state.hosts.get_mut(key) else {
            return;
        };
        if let Some(update) = body["update_attributes"].as_object() {
            for (name, value) in update {
                host.attributes.insert(name.clone(), value.clone());
            }
        }
        for name in string_list(body.get("remove_attributes")) {
            host.attributes.remove(&name);
        }
    }
}

impl Transport for FakeRemote {
    fn send(&self, request: &Request) -> invsync_core::Result<Response> {
        let mut state = self.lock();
        if state.unreachable {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "remote unreachable",
            )
            .into());
        }
        state.calls.push((request.method, request.path.clone()));

        if let Some((_, _, status, title)) = state
            .failures
            .iter()
            .find(|(m, p, _, _)| *m == request.method && request.path.starts_with(p.as_str()))
        {
            return Ok(error(*status, title, "injected failure"));
        }
        Ok(Self::route(&mut state, request))
    }
}
