//! Purpose: Parse corpus registry files (the per-corpus configuration the engine opens).
//! Exports: `Registry`, `StructureDef`.
//! Invariants: Attribute declaration order is the column order of the vertical data.
//! Invariants: Lookups are case-sensitive; unknown keys are engine errors, not empty strings.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureDef {
    pub name: String,
    pub attributes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Registry {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    attributes: Vec<String>,
    structures: Vec<StructureDef>,
}

#[derive(Clone, Copy)]
enum Decl {
    Attribute,
    Structure(usize),
    Other,
}

impl Registry {
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::engine(format!("CorpInfoNotFound ({})", path.display())));
        }
        let text = fs::read_to_string(path).map_err(|err| {
            Error::engine(format!("cannot read registry {}: {err}", path.display()))
                .with_path(path)
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, Error> {
        let mut entries = BTreeMap::new();
        let mut attributes = Vec::new();
        let mut structures: Vec<StructureDef> = Vec::new();
        // Owner of each open block: `Some(i)` for structure `i`, `None` otherwise.
        let mut blocks: Vec<Option<usize>> = Vec::new();
        let mut last = Decl::Other;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "{" {
                blocks.push(block_owner(last));
                continue;
            }
            if line == "}" {
                if blocks.pop().is_none() {
                    return Err(syntax_error(path, lineno, "unexpected '}'"));
                }
                continue;
            }

            let (body, opens) = match line.strip_suffix('{') {
                Some(body) => (body.trim_end(), true),
                None => (line, false),
            };
            let (key, value) = split_entry(body);
            if key.is_empty() {
                return Err(syntax_error(path, lineno, "missing key"));
            }

            last = match blocks.last() {
                None => match key {
                    "ATTRIBUTE" => {
                        attributes.push(require_name(path, lineno, value)?);
                        Decl::Attribute
                    }
                    "STRUCTURE" => {
                        structures.push(StructureDef {
                            name: require_name(path, lineno, value)?,
                            attributes: Vec::new(),
                        });
                        Decl::Structure(structures.len() - 1)
                    }
                    _ => {
                        entries.insert(key.to_string(), value);
                        Decl::Other
                    }
                },
                Some(Some(idx)) if key == "ATTRIBUTE" && blocks.len() == 1 => {
                    let name = require_name(path, lineno, value)?;
                    structures[*idx].attributes.push(name);
                    Decl::Other
                }
                // Properties of attributes and nested blocks are not used here.
                Some(_) => Decl::Other,
            };
            if opens {
                blocks.push(block_owner(last));
            }
        }

        if !blocks.is_empty() {
            return Err(Error::engine(format!(
                "registry {}: unclosed block at end of file",
                path.display()
            )));
        }
        if attributes.is_empty() {
            return Err(Error::engine(format!(
                "registry {}: no positional attributes declared",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            attributes,
            structures,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn structures(&self) -> &[StructureDef] {
        &self.structures
    }

    pub fn default_attr(&self) -> &str {
        self.entries
            .get("DEFAULTATTR")
            .map(String::as_str)
            .unwrap_or(self.attributes[0].as_str())
    }

    /// Looks up a configuration key, including the derived list keys.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.entries.get(key) {
            return Some(value.clone());
        }
        match key {
            "NAME" => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            "DEFAULTATTR" => Some(self.default_attr().to_string()),
            "ATTRLIST" => Some(self.attributes.join(",")),
            "STRUCTLIST" => Some(
                self.structures
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            "STRUCTATTRLIST" => Some(
                self.structures
                    .iter()
                    .flat_map(|s| s.attributes.iter().map(move |a| format!("{}.{a}", s.name)))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }

    pub fn vertical_path(&self) -> Result<PathBuf, Error> {
        let value = self.entries.get("VERTICAL").ok_or_else(|| {
            Error::engine(format!(
                "VERTICAL not defined in registry {}",
                self.path.display()
            ))
        })?;
        Ok(resolve_data_path(self.path(), value))
    }
}

/// Resolves a registry-relative file path (such as `VERTICAL`) against the registry's directory.
pub fn resolve_data_path(registry_path: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        return path;
    }
    match registry_path.parent() {
        Some(base) => base.join(path),
        None => path,
    }
}

fn block_owner(decl: Decl) -> Option<usize> {
    match decl {
        Decl::Structure(idx) => Some(idx),
        Decl::Attribute | Decl::Other => None,
    }
}

fn split_entry(line: &str) -> (&str, String) {
    match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, unquote(rest.trim())),
        None => (line, String::new()),
    }
}

fn unquote(value: &str) -> String {
    let inner = match value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner,
        None => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn require_name(path: &Path, lineno: usize, value: String) -> Result<String, Error> {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(syntax_error(path, lineno, "expected a single name"));
    }
    Ok(value)
}

fn syntax_error(path: &Path, lineno: usize, what: &str) -> Error {
    Error::engine(format!(
        "registry {} line {}: {what}",
        path.display(),
        lineno + 1
    ))
}
