//! Blocking façade over an [`AssetClient`].
//!
//! Each call creates a short-lived [`WaitContext`], hands a completion that
//! fills it to the client, then blocks on its condition variable. Completions
//! may fire on client worker threads; they only ever touch the context.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::client::{make_url, AssetClient, Completion, ConnectionStatus, StatusCallback};
use super::{join_path, Connection, ConnectionSettings, DirEntry};
use crate::util::{Error, Logger, Result};

/// Mutex + done-flag rendezvous for one request. The first completion wins.
struct WaitContext<T> {
    state: Mutex<Option<Result<T>>>,
    cond: Condvar,
}

impl<T> WaitContext<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    fn complete(&self, result: Result<T>) {
        let mut state = self.state.lock();
        if state.is_none() {
            *state = Some(result);
            self.cond.notify_all();
        }
    }

    fn wait(&self) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.take() {
                return result;
            }
            self.cond.wait(&mut state);
        }
    }
}

/// Cancels an interactive authentication that `initialize` is waiting on.
///
/// Cancelling completes the outstanding wait with [`Error::Cancelled`]; it
/// is a no-op when nothing is pending.
#[derive(Clone, Default)]
pub struct AuthCancelHandle {
    pending: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl AuthCancelHandle {
    pub fn cancel(&self) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some(cancel) => {
                cancel();
                true
            }
            None => false,
        }
    }

    /// True while an authentication wait is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn arm(&self, cancel: Box<dyn FnOnce() + Send>) {
        *self.pending.lock() = Some(cancel);
    }

    fn disarm(&self) {
        self.pending.lock().take();
    }
}

/// Connection backed by a remote asset server.
pub struct RemoteConnection {
    client: Arc<dyn AssetClient>,
    logger: Logger,
    settings: Option<ConnectionSettings>,
    auth_cancel: AuthCancelHandle,
    status: Arc<Mutex<ConnectionStatus>>,
    subscriptions: Vec<u64>,
}

impl RemoteConnection {
    pub fn new(client: Arc<dyn AssetClient>, logger: Logger) -> Self {
        Self {
            client,
            logger,
            settings: None,
            auth_cancel: AuthCancelHandle::default(),
            status: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
            subscriptions: Vec::new(),
        }
    }

    /// Handle for cancelling an authentication in progress.
    pub fn auth_cancel_handle(&self) -> AuthCancelHandle {
        self.auth_cancel.clone()
    }

    /// Last status reported by the client for this connection's host.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Forward status changes to `callback`.
    pub fn on_status(&mut self, callback: StatusCallback) {
        let id = self.client.subscribe_status(callback);
        self.subscriptions.push(id);
    }

    fn host(&self) -> &str {
        self.settings.as_ref().map(|s| s.host.as_str()).unwrap_or("")
    }

    fn full_url(&self, path: &str, relative_to_base: bool) -> String {
        let (host, base) = match &self.settings {
            Some(s) => (s.host.as_str(), s.working_directory.as_str()),
            None => ("", ""),
        };
        if relative_to_base {
            make_url(host, &join_path(base, path))
        } else {
            make_url(host, path)
        }
    }

    /// Issue one request and block until its completion fires.
    fn call<T: Send + 'static>(&self, issue: impl FnOnce(Completion<T>)) -> Result<T> {
        let ctx = WaitContext::new();
        let done_ctx = Arc::clone(&ctx);
        issue(Box::new(move |result| done_ctx.complete(result)));
        ctx.wait()
    }

    fn ready(&self, op: &str, path: &str) -> bool {
        if self.settings.is_none() {
            self.logger
                .error(format!("{} '{}': {}", op, path, Error::NotInitialized));
            return false;
        }
        true
    }

    fn report<T>(&self, op: &str, path: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.logger
                    .error(format!("{} '{}' failed: {}", op, self.full_url(path, true), e));
                None
            }
        }
    }

    fn connect(&self, host: &str) -> Result<()> {
        let ctx = WaitContext::new();

        let cancel_ctx = Arc::clone(&ctx);
        let cancel_client = Arc::clone(&self.client);
        let cancel_host = host.to_string();
        self.auth_cancel.arm(Box::new(move || {
            cancel_client.cancel_authentication(&cancel_host);
            cancel_ctx.complete(Err(Error::Cancelled(format!(
                "authentication with '{}' cancelled",
                cancel_host
            ))));
        }));

        let done_ctx = Arc::clone(&ctx);
        self.client
            .connect(host, Box::new(move |result| done_ctx.complete(result)));
        let result = ctx.wait();
        self.auth_cancel.disarm();
        result
    }
}

impl Connection for RemoteConnection {
    fn initialize(&mut self, settings: &ConnectionSettings) -> bool {
        if self.settings.is_some() {
            self.logger.warn("remote connection is already initialized");
            return false;
        }
        if settings.host.is_empty() {
            self.logger.error("remote connection needs a host");
            return false;
        }

        let status = Arc::clone(&self.status);
        let watched = settings.host.clone();
        let id = self.client.subscribe_status(Box::new(move |host, s| {
            if host == watched {
                *status.lock() = s;
            }
        }));
        self.subscriptions.push(id);

        if let Err(e) = self.connect(&settings.host) {
            self.logger
                .error(format!("cannot connect to '{}': {}", settings.host, e));
            return false;
        }
        self.settings = Some(settings.clone());

        let root = self.full_url("", true);
        let created = self.call(|done| self.client.create_folder(&root, done));
        match created {
            Ok(()) | Err(Error::AlreadyExists(_)) => {}
            Err(e) => {
                self.logger
                    .error(format!("cannot create working directory '{}': {}", root, e));
                self.settings = None;
                return false;
            }
        }

        if settings.check_write_permissions {
            let probe = self.full_url(".scene_mirror_write_probe", true);
            let written = self
                .call(|done| self.client.write_file(&probe, b"probe".to_vec(), true, done))
                .and_then(|_| self.call(|done| self.client.delete(&probe, done)));
            if let Err(e) = written {
                self.logger
                    .error(format!("no write access to '{}': {}", root, e));
                self.settings = None;
                return false;
            }
        }

        self.logger.info(format!(
            "remote connection opened at '{}' as {}",
            root,
            self.current_user().unwrap_or_else(|| "<unknown user>".into())
        ));
        true
    }

    fn shutdown(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.client.unsubscribe_status(id);
        }
        if let Some(settings) = self.settings.take() {
            self.client.disconnect(&settings.host);
        }
    }

    fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_ref()
    }

    fn url(&self, path: &str) -> String {
        self.full_url(path, true)
    }

    fn create_folder(&self, path: &str, may_already_exist: bool, relative_to_base: bool) -> bool {
        if !self.ready("create folder", path) {
            return false;
        }
        let url = self.full_url(path, relative_to_base);
        match self.call(|done| self.client.create_folder(&url, done)) {
            Ok(()) => true,
            Err(Error::AlreadyExists(_)) if may_already_exist => true,
            Err(e) => {
                self.logger
                    .error(format!("create folder '{}' failed: {}", url, e));
                false
            }
        }
    }

    fn remove_folder(&self, path: &str) -> bool {
        if !self.ready("remove folder", path) {
            return false;
        }
        let url = self.full_url(path, true);
        let result = self.call(|done| self.client.delete(&url, done));
        self.report("remove folder", path, result).is_some()
    }

    fn remove_file(&self, path: &str) -> bool {
        if !self.ready("remove file", path) {
            return false;
        }
        let url = self.full_url(path, true);
        let result = self.call(|done| self.client.delete(&url, done));
        self.report("remove file", path, result).is_some()
    }

    fn write_file(&self, data: &[u8], path: &str, binary: bool) -> bool {
        if !self.ready("write file", path) {
            return false;
        }
        let url = self.full_url(path, true);
        let content = data.to_vec();
        let result = self.call(|done| self.client.write_file(&url, content, binary, done));
        self.report("write file", path, result).is_some()
    }

    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        if !self.ready("read file", path) {
            return None;
        }
        let url = self.full_url(path, true);
        let result = self.call(|done| self.client.read_file(&url, done));
        self.report("read file", path, result)
    }

    fn file_exists(&self, path: &str) -> bool {
        if self.settings.is_none() {
            return false;
        }
        let url = self.full_url(path, true);
        matches!(
            self.call(|done| self.client.stat(&url, done)),
            Ok(entry) if !entry.is_folder
        )
    }

    fn copy_file(&self, src: &str, dst: &str) -> bool {
        if !self.ready("copy file", src) {
            return false;
        }
        let from = self.full_url(src, true);
        let to = self.full_url(dst, true);
        let result = self.call(|done| self.client.copy(&from, &to, done));
        self.report("copy file", src, result).is_some()
    }

    fn list_entries(&self, path: &str) -> Vec<DirEntry> {
        if !self.ready("list", path) {
            return Vec::new();
        }
        let url = self.full_url(path, true);
        let result = self.call(|done| self.client.list(&url, done));
        self.report("list", path, result)
            .unwrap_or_default()
            .into_iter()
            .map(|e| DirEntry {
                path: join_path(path, &e.name),
                is_file: !e.is_folder,
                modified: e.modified,
                author: e.modified_by,
            })
            .collect()
    }

    fn current_user(&self) -> Option<String> {
        self.client.current_user(self.host())
    }
}

impl Drop for RemoteConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
