//! Purpose: Load vertical corpus data (one token per line, structure tags) into columns.
//! Exports: `CorpusData`, `Attribute`, `Structure`, `Span`, `load`.
//! Role: Indexing step of the reference engine; runs once per corpus open.
//! Invariants: Every attribute column has exactly `size` entries.
//! Invariants: Structure spans are stored in opening order, `start <= end <= size`.
//! Notes: Tags for structures not declared in the registry are skipped.
use std::collections::HashMap;
use std::fs::File;

use memmap2::Mmap;

use crate::core::error::Error;
use crate::engine::registry::Registry;

/// Half-open token range `[start, end)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// A positional attribute stored as lexicon ids.
#[derive(Debug, Default)]
pub struct Attribute {
    pub name: String,
    ids: Vec<u32>,
    lexicon: Vec<String>,
    index: HashMap<String, u32>,
}

impl Attribute {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn push(&mut self, value: &str) {
        let id = match self.index.get(value) {
            Some(id) => *id,
            None => {
                let id = self.lexicon.len() as u32;
                self.lexicon.push(value.to_string());
                self.index.insert(value.to_string(), id);
                id
            }
        };
        self.ids.push(id);
    }

    pub fn id_at(&self, pos: usize) -> u32 {
        self.ids[pos]
    }

    pub fn value_at(&self, pos: usize) -> &str {
        &self.lexicon[self.ids[pos] as usize]
    }

    pub fn lexicon(&self) -> &[String] {
        &self.lexicon
    }
}

#[derive(Debug)]
pub struct Structure {
    pub name: String,
    pub attributes: Vec<String>,
    spans: Vec<Span>,
    // values[attr][span]
    values: Vec<Vec<String>>,
}

impl Structure {
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a == name)
    }

    pub fn value(&self, attr: usize, span: usize) -> &str {
        &self.values[attr][span]
    }

    /// Index of the span enclosing `pos`, if any.
    pub fn span_at(&self, pos: usize) -> Option<usize> {
        let after = self.spans.partition_point(|span| span.start <= pos);
        let idx = after.checked_sub(1)?;
        (pos < self.spans[idx].end).then_some(idx)
    }
}

#[derive(Debug)]
pub struct CorpusData {
    pub attributes: Vec<Attribute>,
    pub structures: Vec<Structure>,
    size: usize,
}

impl CorpusData {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }
}

pub fn load(registry: &Registry) -> Result<CorpusData, Error> {
    let path = registry.vertical_path()?;
    let file = File::open(&path).map_err(|err| {
        Error::engine(format!("CorpInfoNotFound ({}): {err}", path.display())).with_path(&path)
    })?;
    let len = file
        .metadata()
        .map_err(|err| Error::engine(format!("cannot stat {}: {err}", path.display())))?
        .len();
    if len == 0 {
        return parse(registry, "");
    }
    // SAFETY: the map is read-only and dropped before this function returns.
    let map = unsafe { Mmap::map(&file) }
        .map_err(|err| Error::engine(format!("cannot map {}: {err}", path.display())))?;
    let text = std::str::from_utf8(&map).map_err(|err| {
        Error::engine(format!(
            "{} is not valid UTF-8 (byte {})",
            path.display(),
            err.valid_up_to()
        ))
    })?;
    parse(registry, text)
}

pub fn parse(registry: &Registry, text: &str) -> Result<CorpusData, Error> {
    let mut attributes: Vec<Attribute> = registry
        .attributes()
        .iter()
        .map(|name| Attribute::new(name))
        .collect();
    let mut structures: Vec<Structure> = registry
        .structures()
        .iter()
        .map(|def| Structure {
            name: def.name.clone(),
            attributes: def.attributes.clone(),
            spans: Vec::new(),
            values: vec![Vec::new(); def.attributes.len()],
        })
        .collect();
    // (structure index, span index) of currently open tags
    let mut open: Vec<(usize, usize)> = Vec::new();
    let mut size = 0usize;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if let Some(tag) = parse_tag(line) {
            match tag {
                Tag::Open { name, attrs } => {
                    let Some(sidx) = structures.iter().position(|s| s.name == name) else {
                        tracing::trace!(tag = name, "skipping undeclared structure");
                        continue;
                    };
                    let structure = &mut structures[sidx];
                    structure.spans.push(Span {
                        start: size,
                        end: size,
                    });
                    for (aidx, attr) in structure.attributes.iter().enumerate() {
                        let value = attrs
                            .iter()
                            .find(|(key, _)| key == attr)
                            .map(|(_, value)| value.clone())
                            .unwrap_or_default();
                        structure.values[aidx].push(value);
                    }
                    open.push((sidx, structure.spans.len() - 1));
                }
                Tag::Close { name } => {
                    if let Some(at) = open.iter().rposition(|(s, _)| structures[*s].name == name) {
                        let (sidx, span) = open.remove(at);
                        structures[sidx].spans[span].end = size;
                    }
                }
                Tag::Empty => {}
            }
            continue;
        }
        let mut columns = line.split('\t');
        for attr in attributes.iter_mut() {
            attr.push(columns.next().unwrap_or(""));
        }
        size += 1;
    }
    for (sidx, span) in open {
        structures[sidx].spans[span].end = size;
    }

    Ok(CorpusData {
        attributes,
        structures,
        size,
    })
}

enum Tag<'a> {
    Open {
        name: &'a str,
        attrs: Vec<(String, String)>,
    },
    Close {
        name: &'a str,
    },
    Empty,
}

fn parse_tag(line: &str) -> Option<Tag<'_>> {
    let inner = line.strip_prefix('<')?.strip_suffix('>')?;
    if let Some(name) = inner.strip_prefix('/') {
        return Some(Tag::Close { name: name.trim() });
    }
    if inner.ends_with('/') {
        return Some(Tag::Empty);
    }
    let (name, rest) = match inner.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest),
        None => (inner, ""),
    };
    Some(Tag::Open {
        name,
        attrs: parse_tag_attrs(rest),
    })
}

fn parse_tag_attrs(mut rest: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    loop {
        rest = rest.trim_start();
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let Some(after) = after.trim_start().strip_prefix('"') else {
            break;
        };
        let Some(end) = after.find('"') else {
            break;
        };
        out.push((key.trim().to_string(), after[..end].to_string()));
        rest = &after[end + 1..];
    }
    out
}
