// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining settings for the experiment context.
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Registry directory holding the device metadata, as path segments.
    pub device_paths: Vec<String>,
    pub with_diagnostics: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            device_paths: vec!["Servers".to_string(), "devices".to_string()],
            with_diagnostics: false,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::InvalidMetadata {
            path: "settings".to_string(),
            source,
        })
    }

    pub fn device_paths(&self) -> Vec<&str> {
        self.device_paths.iter().map(String::as_str).collect()
    }

    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        let mut changes = vec![];
        let sanitized: Vec<String> = self
            .device_paths
            .iter()
            .map(|segment| segment.trim_matches('/').trim().to_string())
            .filter(|segment| !segment.is_empty())
            .collect();
        if sanitized.is_empty() {
            return Err(Error::new("Expected `device_paths` to name a registry directory"));
        }
        if sanitized != self.device_paths {
            changes.push(SanitizationChange {
                field: "device_paths",
                original: format!("{:?}", self.device_paths),
                sanitized: format!("{sanitized:?}"),
                reason: "Empty segments and surrounding separators are dropped.".to_string(),
            });
            self.device_paths = sanitized;
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let settings = Settings::default();
        assert_eq!(settings.device_paths(), vec!["Servers", "devices"]);
        assert!(!settings.with_diagnostics);
    }

    #[test]
    fn test_from_json_partial() {
        let settings = Settings::from_json(r#"{"with_diagnostics": true}"#).unwrap();
        assert!(settings.with_diagnostics);
        assert_eq!(settings.device_paths(), vec!["Servers", "devices"]);
        assert!(Settings::from_json(r#"{"device_path": []}"#).is_err());
    }

    #[test]
    fn test_sanitization_change() {
        let mut settings = Settings {
            device_paths: vec!["/Servers/".to_string(), "".to_string(), "devices".to_string()],
            with_diagnostics: false,
        };
        let changes = settings.sanitize().unwrap();
        assert_eq!(settings.device_paths(), vec!["Servers", "devices"]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "device_paths");

        assert!(settings.sanitize().unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_rejects_empty_paths() {
        let mut settings = Settings {
            device_paths: vec![" ".to_string()],
            with_diagnostics: false,
        };
        assert!(settings.sanitize().is_err());
    }
}
