//! Writer settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionSettings;
use crate::document::{Encoding, UpAxis};
use crate::shading::ShadingBackendKind;
use crate::util::Result;

/// Multi-process layout: this process's rank and the process count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLayout {
    pub rank: u32,
    pub count: u32,
}

/// Settings consumed when the writer opens a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    // Storage
    /// Remote host; empty writes to the local filesystem.
    pub host: String,
    pub output_directory: String,
    pub check_write_permissions: bool,

    // Session
    /// Start a fresh `Session_<N+1>` instead of reusing the latest session.
    pub create_new_session: bool,
    pub process: Option<ProcessLayout>,

    // Documents
    pub binary_documents: bool,
    pub up_axis: UpAxis,
    pub time_codes_per_second: f64,
    pub compress_volumes: bool,

    // Shading
    pub shading_backends: Vec<ShadingBackendKind>,

    /// Start in live-edit mode.
    pub live_edit: bool,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            output_directory: String::new(),
            check_write_permissions: true,
            create_new_session: true,
            process: None,
            binary_documents: false,
            up_axis: UpAxis::Y,
            time_codes_per_second: 24.0,
            compress_volumes: true,
            shading_backends: vec![ShadingBackendKind::Preview],
            live_edit: false,
        }
    }
}

impl WriterSettings {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.validated())
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn validated(mut self) -> Self {
        if let Some(p) = self.process {
            if p.count == 0 || p.rank >= p.count {
                self.process = None;
            }
        }
        if self.shading_backends.is_empty() {
            self.shading_backends.push(ShadingBackendKind::Preview);
        }
        if self.time_codes_per_second.is_nan() || self.time_codes_per_second <= 0.0 {
            self.time_codes_per_second = 24.0;
        }
        self
    }

    pub fn is_remote(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn encoding(&self) -> Encoding {
        if self.binary_documents {
            Encoding::Binary
        } else {
            Encoding::Text
        }
    }

    /// Settings for the connection the writer opens.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            working_directory: self.output_directory.clone(),
            check_write_permissions: self.check_write_permissions,
        }
    }

    pub fn process_layout(&self) -> Option<(u32, u32)> {
        self.process.map(|p| (p.rank, p.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = WriterSettings::from_json_str(r#"{ "host": "server", "up_axis": "Z" }"#).unwrap();
        assert!(settings.is_remote());
        assert_eq!(settings.up_axis, UpAxis::Z);
        assert_eq!(settings.shading_backends, vec![ShadingBackendKind::Preview]);
        assert_eq!(settings.encoding(), Encoding::Text);
    }

    #[test]
    fn test_invalid_process_layout_is_dropped() {
        let settings = WriterSettings::from_json_str(
            r#"{ "process": { "rank": 3, "count": 2 }, "shading_backends": [] }"#,
        )
        .unwrap();
        assert_eq!(settings.process, None);
        assert!(!settings.shading_backends.is_empty());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.json");
        let settings = WriterSettings {
            output_directory: "/tmp/out".into(),
            binary_documents: true,
            shading_backends: vec![ShadingBackendKind::StandardSurface],
            ..WriterSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(WriterSettings::load(&path).unwrap(), settings);
    }
}
