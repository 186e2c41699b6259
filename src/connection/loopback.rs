//! In-process asset server and client.
//!
//! [`LoopbackServer`] keeps files in memory; [`LoopbackClient`] runs every
//! request on its own worker thread and fires completions from there, which
//! exercises the same cross-thread hand-off a networked client would.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use parking_lot::Mutex;

use super::client::{
    split_url, AssetClient, Completion, ConnectionStatus, RemoteEntry, StatusCallback,
};
use crate::util::{Error, Result};

struct StoredEntry {
    /// `None` for folders.
    data: Option<Vec<u8>>,
    modified: SystemTime,
    author: String,
}

type PendingAuth = (String, Completion<()>);

struct ServerState {
    entries: BTreeMap<String, StoredEntry>,
    interactive_auth: bool,
    read_only: bool,
    pending_auth: Vec<PendingAuth>,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl ServerState {
    fn is_folder(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.entries.get(path), Some(e) if e.data.is_none())
    }

    fn ensure_folders(&mut self, path: &str, author: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        self.ensure_folders(parent_of(path), author)?;
        match self.entries.get(path) {
            Some(e) if e.data.is_some() => Err(Error::other(format!("'{}' is a file", path))),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(
                    path.to_string(),
                    StoredEntry {
                        data: None,
                        modified: SystemTime::now(),
                        author: author.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    fn create_folder(&mut self, path: &str, author: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        if path.is_empty() || self.entries.contains_key(path) {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        self.ensure_folders(path, author)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        if self.entries.remove(path).is_none() {
            return Err(Error::NotFound(path.to_string()));
        }
        let prefix = format!("{}/", path);
        self.entries.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    fn write(&mut self, path: &str, data: Vec<u8>, author: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        if self.is_folder(path) {
            return Err(Error::other(format!("'{}' is a folder", path)));
        }
        self.ensure_folders(parent_of(path), author)?;
        self.entries.insert(
            path.to_string(),
            StoredEntry {
                data: Some(data),
                modified: SystemTime::now(),
                author: author.to_string(),
            },
        );
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.entries.get(path) {
            Some(StoredEntry { data: Some(d), .. }) => Ok(d.clone()),
            Some(_) => Err(Error::other(format!("'{}' is a folder", path))),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    fn entry(&self, path: &str) -> Result<RemoteEntry> {
        if path.is_empty() {
            return Ok(RemoteEntry {
                name: String::new(),
                is_folder: true,
                modified: None,
                modified_by: None,
            });
        }
        let e = self
            .entries
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(RemoteEntry {
            name: name_of(path).to_string(),
            is_folder: e.data.is_none(),
            modified: Some(e.modified),
            modified_by: Some(e.author.clone()),
        })
    }

    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        if !self.is_folder(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        self.entries
            .keys()
            .filter(|k| parent_of(k) == path)
            .map(|k| self.entry(k))
            .collect()
    }
}

/// In-memory asset server for one host.
#[derive(Clone)]
pub struct LoopbackServer {
    host: String,
    user: String,
    state: Arc<Mutex<ServerState>>,
}

impl LoopbackServer {
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            state: Arc::new(Mutex::new(ServerState {
                entries: BTreeMap::new(),
                interactive_auth: false,
                read_only: false,
                pending_auth: Vec::new(),
            })),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Hold connection requests until [`Self::approve_authentication`].
    pub fn require_interactive_auth(&self, enabled: bool) {
        self.state.lock().interactive_auth = enabled;
    }

    /// Reject every mutation with a permission error.
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    /// Number of connection requests waiting for sign-in.
    pub fn pending_authentications(&self) -> usize {
        self.state.lock().pending_auth.len()
    }

    /// Complete every pending sign-in successfully.
    pub fn approve_authentication(&self) -> usize {
        let pending: Vec<PendingAuth> = self.state.lock().pending_auth.drain(..).collect();
        let count = pending.len();
        for (_, done) in pending {
            done(Ok(()));
        }
        count
    }

    /// Stored file content, bypassing any client.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().read(path).ok()
    }

    /// All stored paths, folders included.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    /// Spawn a client bound to this server.
    pub fn client(&self) -> LoopbackClient {
        LoopbackClient::spawn(self.clone())
    }
}

enum WorkerCommand {
    Run(Box<dyn FnOnce() + Send>),
    Stop,
}

type Subscribers = Arc<Mutex<Vec<(u64, Arc<dyn Fn(&str, ConnectionStatus) + Send + Sync>)>>>;

/// Client of a [`LoopbackServer`] with a dedicated worker thread.
pub struct LoopbackClient {
    server: LoopbackServer,
    tx: Mutex<Sender<WorkerCommand>>,
    handle: Option<JoinHandle<()>>,
    connected: Arc<Mutex<BTreeSet<String>>>,
    subscribers: Subscribers,
    next_subscription: Mutex<u64>,
}

impl LoopbackClient {
    fn spawn(server: LoopbackServer) -> Self {
        let (tx, rx) = channel::<WorkerCommand>();
        let handle = thread::spawn(move || worker_loop(rx));
        Self {
            server,
            tx: Mutex::new(tx),
            handle: Some(handle),
            connected: Arc::new(Mutex::new(BTreeSet::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscription: Mutex::new(1),
        }
    }

    fn submit(&self, job: impl FnOnce() + Send + 'static) {
        // A stopped worker drops the job; its completion never fires, which
        // only happens after the client itself is being dropped.
        let _ = self.tx.lock().send(WorkerCommand::Run(Box::new(job)));
    }

    /// Run `op` against the server state on the worker, after checking that
    /// the URL targets a connected host.
    fn request<T: Send + 'static>(
        &self,
        url: &str,
        done: Completion<T>,
        op: impl FnOnce(&mut ServerState, &str, &str) -> Result<T> + Send + 'static,
    ) {
        let url = url.to_string();
        let state = Arc::clone(&self.server.state);
        let connected = Arc::clone(&self.connected);
        let user = self.server.user.clone();
        self.submit(move || {
            let result = match split_url(&url) {
                None => Err(Error::Connection(format!("malformed url '{}'", url))),
                Some((host, _)) if !connected.lock().contains(host) => {
                    Err(Error::Connection(format!("not connected to '{}'", host)))
                }
                Some((_, path)) => {
                    let mut guard = state.lock();
                    op(&mut *guard, path, &user)
                }
            };
            done(result);
        });
    }
}

fn notify(subscribers: &Subscribers, host: &str, status: ConnectionStatus) {
    let callbacks: Vec<_> = subscribers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
    for cb in callbacks {
        cb(host, status);
    }
}

fn worker_loop(rx: Receiver<WorkerCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            WorkerCommand::Run(job) => job(),
            WorkerCommand::Stop => break,
        }
    }
}

impl AssetClient for LoopbackClient {
    fn connect(&self, host: &str, done: Completion<()>) {
        let host = host.to_string();
        let server = self.server.clone();
        let connected = Arc::clone(&self.connected);
        let subscribers = Arc::clone(&self.subscribers);
        self.submit(move || {
            notify(&subscribers, &host, ConnectionStatus::Connecting);
            if host != server.host {
                notify(&subscribers, &host, ConnectionStatus::ConnectFailed);
                done(Err(Error::Connection(format!("host '{}' is unreachable", host))));
                return;
            }

            let finish_host = host.clone();
            let finish_subscribers = Arc::clone(&subscribers);
            let finish: Completion<()> = Box::new(move |result| {
                let status = match &result {
                    Ok(()) => {
                        connected.lock().insert(finish_host.clone());
                        ConnectionStatus::Connected
                    }
                    Err(Error::Cancelled(_)) => ConnectionStatus::AuthCancelled,
                    Err(_) => ConnectionStatus::AuthFailed,
                };
                notify(&finish_subscribers, &finish_host, status);
                done(result);
            });

            let interactive = server.state.lock().interactive_auth;
            if interactive {
                notify(&subscribers, &host, ConnectionStatus::AwaitingAuthentication);
                server.state.lock().pending_auth.push((host, finish));
            } else {
                finish(Ok(()));
            }
        });
    }

    fn cancel_authentication(&self, host: &str) {
        let cancelled: Vec<PendingAuth> = {
            let mut state = self.server.state.lock();
            let (matching, rest): (Vec<_>, Vec<_>) =
                state.pending_auth.drain(..).partition(|(h, _)| h == host);
            state.pending_auth = rest;
            matching
        };
        for (h, done) in cancelled {
            done(Err(Error::Cancelled(format!("authentication with '{}' cancelled", h))));
        }
    }

    fn disconnect(&self, host: &str) {
        if self.connected.lock().remove(host) {
            notify(&self.subscribers, host, ConnectionStatus::Disconnected);
        }
    }

    fn subscribe_status(&self, callback: StatusCallback) -> u64 {
        let mut next = self.next_subscription.lock();
        let id = *next;
        *next += 1;
        self.subscribers.lock().push((id, Arc::from(callback)));
        id
    }

    fn unsubscribe_status(&self, id: u64) {
        self.subscribers.lock().retain(|(i, _)| *i != id);
    }

    fn create_folder(&self, url: &str, done: Completion<()>) {
        self.request(url, done, |state, path, user| state.create_folder(path, user));
    }

    fn delete(&self, url: &str, done: Completion<()>) {
        self.request(url, done, |state, path, _| state.delete(path));
    }

    fn write_file(&self, url: &str, content: Vec<u8>, _binary: bool, done: Completion<()>) {
        self.request(url, done, move |state, path, user| state.write(path, content, user));
    }

    fn read_file(&self, url: &str, done: Completion<Vec<u8>>) {
        self.request(url, done, |state, path, _| state.read(path));
    }

    fn copy(&self, src_url: &str, dst_url: &str, done: Completion<()>) {
        let dst = split_url(dst_url).map(|(_, p)| p.to_string());
        self.request(src_url, done, move |state, src, user| {
            let dst = dst.ok_or_else(|| Error::Connection("malformed destination url".into()))?;
            let data = state.read(src)?;
            state.write(&dst, data, user)
        });
    }

    fn list(&self, url: &str, done: Completion<Vec<RemoteEntry>>) {
        self.request(url, done, |state, path, _| state.list(path));
    }

    fn stat(&self, url: &str, done: Completion<RemoteEntry>) {
        self.request(url, done, |state, path, _| state.entry(path));
    }

    fn current_user(&self, host: &str) -> Option<String> {
        if self.connected.lock().contains(host) {
            Some(self.server.user.clone())
        } else {
            None
        }
    }
}

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        let _ = self.tx.lock().send(WorkerCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
