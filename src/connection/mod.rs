//! Storage connections.
//!
//! A [`Connection`] offers best-effort CRUD over a storage root: every
//! operation logs its failure and reports it as `false` or an empty result,
//! leaving the caller to decide whether it matters. Two implementations exist:
//! [`LocalConnection`] over the filesystem and [`RemoteConnection`] over an
//! [`AssetClient`].

mod client;
mod local;
mod loopback;
mod remote;

use std::time::SystemTime;

pub use client::*;
pub use local::LocalConnection;
pub use loopback::{LoopbackClient, LoopbackServer};
pub use remote::{AuthCancelHandle, RemoteConnection};

/// Prefix of session folder names.
pub const SESSION_PREFIX: &str = "Session_";

/// Settings fixed for the lifetime of one connection instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Remote host; empty for local storage.
    pub host: String,
    /// Root directory (local path or server-relative folder).
    pub working_directory: String,
    /// Probe write access during `initialize`.
    pub check_write_permissions: bool,
}

/// One entry of a folder listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Path relative to the working directory.
    pub path: String,
    pub is_file: bool,
    pub modified: Option<SystemTime>,
    pub author: Option<String>,
}

impl DirEntry {
    /// Last path element.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Uniform storage interface used by the writer.
pub trait Connection: Send {
    /// Open the connection. Can only succeed once per instance.
    fn initialize(&mut self, settings: &ConnectionSettings) -> bool;

    /// Release the connection. Further operations fail.
    fn shutdown(&mut self);

    /// Settings passed to a successful `initialize`.
    fn settings(&self) -> Option<&ConnectionSettings>;

    /// Fully qualified location of `path` (for logs and reference strings).
    fn url(&self, path: &str) -> String;

    fn create_folder(&self, path: &str, may_already_exist: bool, relative_to_base: bool) -> bool;
    fn remove_folder(&self, path: &str) -> bool;
    fn remove_file(&self, path: &str) -> bool;
    fn write_file(&self, data: &[u8], path: &str, binary: bool) -> bool;
    fn read_file(&self, path: &str) -> Option<Vec<u8>>;
    fn file_exists(&self, path: &str) -> bool;
    fn list_entries(&self, path: &str) -> Vec<DirEntry>;

    /// Copy a file inside the store.
    fn copy_file(&self, src: &str, dst: &str) -> bool {
        match self.read_file(src) {
            Some(data) => self.write_file(&data, dst, true),
            None => false,
        }
    }

    /// Name of the user the store attributes writes to.
    fn current_user(&self) -> Option<String> {
        None
    }

    /// Highest existing `Session_<N>` folder number, or -1.
    fn max_session_number(&self) -> i32 {
        self.list_entries("")
            .iter()
            .filter(|e| !e.is_file)
            .filter_map(|e| parse_session_number(e.name()))
            .max()
            .unwrap_or(-1)
    }
}

/// Parse `Session_<N>` into `N`.
pub fn parse_session_number(name: &str) -> Option<i32> {
    let digits = name.strip_prefix(SESSION_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Join two store-relative paths with a single `/`.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_number() {
        assert_eq!(parse_session_number("Session_0"), Some(0));
        assert_eq!(parse_session_number("Session_42"), Some(42));
        assert_eq!(parse_session_number("Session_"), None);
        assert_eq!(parse_session_number("Session_4a"), None);
        assert_eq!(parse_session_number("Session_-1"), None);
        assert_eq!(parse_session_number("Sessions_1"), None);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a/b"), "a/b");
        assert_eq!(join_path("root/", "/a"), "root/a");
        assert_eq!(join_path("root", ""), "root");
    }
}
