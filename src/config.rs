//! Purpose: Boundary configuration: registry lookup directories and log filter.
//! Exports: `Config`, `REGISTRY_PATH_ENV`.
//! Role: Shared by the C ABI (env only) and the CLI (file + flags + env).
//! Invariants: Env values override file values; CLI flags are applied last by the caller.
//! Invariants: Corpus refs containing a path separator are used verbatim.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::logging::LOG_ENV;

pub const REGISTRY_PATH_ENV: &str = "MANGO_REGISTRY_PATH";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub registry_dirs: Vec<PathBuf>,
    pub log_filter: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read config")
                .with_path(path)
                .with_source(err)
        })?;
        serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid config: {err}"))
                .with_path(path)
                .with_source(err)
        })
    }

    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(paths) = lookup(REGISTRY_PATH_ENV) {
            self.registry_dirs = paths
                .split(':')
                .filter(|part| !part.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = Some(filter);
        }
        self
    }

    /// Resolves a corpus ref: bare ids are looked up in the registry dirs, first hit wins.
    pub fn resolve_corpus_path(&self, corpus: &str) -> PathBuf {
        if corpus.contains('/') {
            return PathBuf::from(corpus);
        }
        self.registry_dirs
            .iter()
            .map(|dir| dir.join(corpus))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| PathBuf::from(corpus))
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, REGISTRY_PATH_ENV};
    use crate::logging::LOG_ENV;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn env_overrides_file_values() {
        let base = Config {
            registry_dirs: vec![PathBuf::from("/from/file")],
            log_filter: Some("info".to_string()),
        };
        let config = base.with_env(|key| match key {
            REGISTRY_PATH_ENV => Some("/a::/b".to_string()),
            LOG_ENV => Some("mango=debug".to_string()),
            _ => None,
        });
        assert_eq!(
            config.registry_dirs,
            [PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(config.log_filter.as_deref(), Some("mango=debug"));
    }

    #[test]
    fn loads_camel_case_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("mango.json");
        fs::write(&path, r#"{"registryDirs": ["/corpora/registry"]}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry_dirs, [PathBuf::from("/corpora/registry")]);
        assert_eq!(config.log_filter, None);

        fs::write(&path, "{").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn bare_ids_resolve_through_registry_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("one");
        let second = temp.path().join("two");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join("susanne"), "ATTRIBUTE word\n").unwrap();

        let config = Config {
            registry_dirs: vec![first, second.clone()],
            log_filter: None,
        };
        assert_eq!(config.resolve_corpus_path("susanne"), second.join("susanne"));
        assert_eq!(config.resolve_corpus_path("missing"), PathBuf::from("missing"));
        assert_eq!(
            config.resolve_corpus_path("/abs/susanne"),
            PathBuf::from("/abs/susanne")
        );
    }
}
