//! Filesystem-backed connection.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{join_path, Connection, ConnectionSettings, DirEntry};
use crate::util::{Error, Logger, Result};

const PROBE_FILE: &str = ".scene_mirror_write_probe";

/// Connection over a local directory.
pub struct LocalConnection {
    logger: Logger,
    settings: Option<ConnectionSettings>,
    base: PathBuf,
}

impl LocalConnection {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            settings: None,
            base: PathBuf::new(),
        }
    }

    fn resolve(&self, path: &str, relative_to_base: bool) -> PathBuf {
        if relative_to_base {
            self.base.join(path.trim_start_matches('/'))
        } else {
            PathBuf::from(path)
        }
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
                self.logger.error(format!("{} '{}' failed: {}", op, path, e));
                None
            }
        }
    }

    fn probe_write_access(base: &Path) -> Result<()> {
        let probe = base.join(PROBE_FILE);
        fs::write(&probe, b"probe").map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => Error::PermissionDenied(base.display().to_string()),
            _ => Error::Io(e),
        })?;
        fs::remove_file(&probe)?;
        Ok(())
    }
}

impl Connection for LocalConnection {
    fn initialize(&mut self, settings: &ConnectionSettings) -> bool {
        if self.settings.is_some() {
            self.logger.warn("local connection is already initialized");
            return false;
        }
        if settings.working_directory.is_empty() {
            self.logger.error("local connection needs a working directory");
            return false;
        }

        let base = PathBuf::from(&settings.working_directory);
        if let Err(e) = fs::create_dir_all(&base) {
            self.logger
                .error(format!("cannot create output directory '{}': {}", base.display(), e));
            return false;
        }
        if settings.check_write_permissions {
            if let Err(e) = Self::probe_write_access(&base) {
                self.logger
                    .error(format!("no write access to '{}': {}", base.display(), e));
                return false;
            }
        }

        self.logger
            .info(format!("local connection opened at '{}'", base.display()));
        self.base = base;
        self.settings = Some(settings.clone());
        true
    }

    fn shutdown(&mut self) {
        self.settings = None;
    }

    fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_ref()
    }

    fn url(&self, path: &str) -> String {
        self.resolve(path, true).to_string_lossy().replace('\\', "/")
    }

    fn create_folder(&self, path: &str, may_already_exist: bool, relative_to_base: bool) -> bool {
        if !self.ready("create folder", path) {
            return false;
        }
        let full = self.resolve(path, relative_to_base);
        if full.is_dir() {
            if !may_already_exist {
                self.logger
                    .error(format!("create folder '{}' failed: {}", path, Error::AlreadyExists(path.into())));
            }
            return may_already_exist;
        }
        self.report("create folder", path, fs::create_dir_all(&full).map_err(Error::from))
            .is_some()
    }

    fn remove_folder(&self, path: &str) -> bool {
        if !self.ready("remove folder", path) {
            return false;
        }
        let full = self.resolve(path, true);
        self.report("remove folder", path, fs::remove_dir_all(full).map_err(Error::from))
            .is_some()
    }

    fn remove_file(&self, path: &str) -> bool {
        if !self.ready("remove file", path) {
            return false;
        }
        let full = self.resolve(path, true);
        self.report("remove file", path, fs::remove_file(full).map_err(Error::from))
            .is_some()
    }

    fn write_file(&self, data: &[u8], path: &str, _binary: bool) -> bool {
        if !self.ready("write file", path) {
            return false;
        }
        let full = self.resolve(path, true);
        let result = (|| -> Result<()> {
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full, data)?;
            Ok(())
        })();
        self.report("write file", path, result).is_some()
    }

    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        if !self.ready("read file", path) {
            return None;
        }
        let full = self.resolve(path, true);
        let result = fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(path.to_string()),
            _ => Error::Io(e),
        });
        self.report("read file", path, result)
    }

    fn file_exists(&self, path: &str) -> bool {
        self.settings.is_some() && self.resolve(path, true).is_file()
    }

    fn copy_file(&self, src: &str, dst: &str) -> bool {
        if !self.ready("copy file", src) {
            return false;
        }
        let from = self.resolve(src, true);
        let to = self.resolve(dst, true);
        let result = (|| -> Result<()> {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &to)?;
            Ok(())
        })();
        self.report("copy file", src, result).is_some()
    }

    fn list_entries(&self, path: &str) -> Vec<DirEntry> {
        if !self.ready("list", path) {
            return Vec::new();
        }
        let full = self.resolve(path, true);
        let result = (|| -> Result<Vec<DirEntry>> {
            let mut out = Vec::new();
            for entry in fs::read_dir(&full)? {
                let entry = entry?;
                let meta = entry.metadata()?;
                let name = entry.file_name().to_string_lossy().to_string();
                out.push(DirEntry {
                    path: join_path(path, &name),
                    is_file: meta.is_file(),
                    modified: meta.modified().ok(),
                    author: None,
                });
            }
            out.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(out)
        })();
        self.report("list", path, result).unwrap_or_default()
    }

    fn current_user(&self) -> Option<String> {
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
    }
}
