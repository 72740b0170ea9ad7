//! Purpose: Corpus summary (registry, size, data paths, vertical file stats) for the CLI.
//! Exports: `CorpusInfo`, `VerticalInfo`, `corpus_info`.
//! Role: Opens the corpus through the boundary and closes it before returning.
//! Invariants: Missing optional registry keys yield `None`, never an error.
//! Notes: `lastModified` is RFC 3339 UTC.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::boundary::Boundary;
use crate::core::error::{Error, ErrorKind};
use crate::engine::Engine;
use crate::engine::registry::resolve_data_path;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusInfo {
    pub corpus: String,
    pub registry_path: PathBuf,
    pub size: i64,
    pub data_path: Option<String>,
    pub vertical: Option<VerticalInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerticalInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: Option<u64>,
    pub last_modified: Option<String>,
}

pub fn corpus_info<E: Engine>(boundary: &Boundary<E>, corpus: &str) -> Result<CorpusInfo, Error> {
    let registry_path = boundary.config().resolve_corpus_path(corpus);
    let handle = boundary.open_corpus(&registry_path.to_string_lossy())?;

    let collected = (|| -> Result<CorpusInfo, Error> {
        let size = boundary.corpus_size(handle)?;
        let data_path = optional_conf(boundary.corpus_conf(handle, "PATH"))?;
        let vertical = optional_conf(boundary.corpus_conf(handle, "VERTICAL"))?
            .map(|value| vertical_info(&registry_path, &value))
            .transpose()?;
        Ok(CorpusInfo {
            corpus: corpus.to_string(),
            registry_path: registry_path.clone(),
            size,
            data_path,
            vertical,
        })
    })();

    if let Err(err) = boundary.close_corpus(handle) {
        tracing::warn!(?handle, error = %err, "failed to close corpus");
    }
    collected
}

fn optional_conf(value: Result<String, Error>) -> Result<Option<String>, Error> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::Engine => Ok(None),
        Err(err) => Err(err),
    }
}

fn vertical_info(registry_path: &Path, value: &str) -> Result<VerticalInfo, Error> {
    let path = resolve_data_path(registry_path, value);
    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(VerticalInfo {
                path,
                exists: false,
                size: None,
                last_modified: None,
            });
        }
        Err(err) => {
            return Err(Error::new(ErrorKind::Io)
                .with_message("failed to stat vertical file")
                .with_path(&path)
                .with_source(err));
        }
    };
    let last_modified = metadata.modified().ok().and_then(format_time);
    Ok(VerticalInfo {
        path,
        exists: true,
        size: Some(metadata.len()),
        last_modified,
    })
}

fn format_time(ts: SystemTime) -> Option<String> {
    OffsetDateTime::from(ts).format(&Rfc3339).ok()
}
