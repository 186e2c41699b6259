//! Asynchronous asset-streaming client interface.
//!
//! Requests complete through a callback that may run on a client-owned worker
//! thread. [`super::RemoteConnection`] turns this into a blocking API.

use std::time::SystemTime;

use crate::util::Result;

/// URL scheme of remote asset locations.
pub const REMOTE_SCHEME: &str = "asset";

/// Completion callback for one request.
pub type Completion<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Connection status callback.
pub type StatusCallback = Box<dyn Fn(&str, ConnectionStatus) + Send + Sync + 'static>;

/// Connection state reported to status subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    /// Waiting for the user to finish an interactive sign-in.
    AwaitingAuthentication,
    Connected,
    ConnectFailed,
    AuthFailed,
    AuthCancelled,
    Disconnected,
}

/// Listing entry returned by [`AssetClient::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Name relative to the listed folder.
    pub name: String,
    pub is_folder: bool,
    pub modified: Option<SystemTime>,
    pub modified_by: Option<String>,
}

/// Non-blocking client of a remote asset server.
///
/// All URLs have the form `asset://<host>/<path>`.
pub trait AssetClient: Send + Sync {
    /// Connect and authenticate against `host`.
    fn connect(&self, host: &str, done: Completion<()>);

    /// Abort an interactive authentication in progress for `host`.
    fn cancel_authentication(&self, host: &str);

    fn disconnect(&self, host: &str);

    /// Register a status callback; returns a subscription id.
    fn subscribe_status(&self, callback: StatusCallback) -> u64;

    fn unsubscribe_status(&self, id: u64);

    fn create_folder(&self, url: &str, done: Completion<()>);

    /// Delete a file or a folder with everything beneath it.
    fn delete(&self, url: &str, done: Completion<()>);

    fn write_file(&self, url: &str, content: Vec<u8>, binary: bool, done: Completion<()>);

    fn read_file(&self, url: &str, done: Completion<Vec<u8>>);

    fn copy(&self, src_url: &str, dst_url: &str, done: Completion<()>);

    fn list(&self, url: &str, done: Completion<Vec<RemoteEntry>>);

    fn stat(&self, url: &str, done: Completion<RemoteEntry>);

    /// User signed in on `host`, if connected.
    fn current_user(&self, host: &str) -> Option<String>;
}

/// Split `asset://host/path` into `(host, path)`.
pub fn split_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix(REMOTE_SCHEME)?.strip_prefix("://")?;
    match rest.find('/') {
        Some(idx) => Some((&rest[..idx], rest[idx + 1..].trim_end_matches('/'))),
        None => Some((rest, "")),
    }
}

/// Build `asset://host/path`.
pub fn make_url(host: &str, path: &str) -> String {
    format!("{}://{}/{}", REMOTE_SCHEME, host, path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_round_trip() {
        let url = make_url("server.local", "/Users/me/Session_1");
        assert_eq!(url, "asset://server.local/Users/me/Session_1");
        assert_eq!(split_url(&url), Some(("server.local", "Users/me/Session_1")));
        assert_eq!(split_url("asset://host"), Some(("host", "")));
        assert_eq!(split_url("file:///tmp"), None);
    }
}
