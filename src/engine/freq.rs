//! Purpose: Parse frequency criteria and bucket concordance lines into a distribution.
//! Exports: `Criteria`, `FreqDist`, `distribution`.
//! Invariants: `words`, `freqs` and `norms` always have equal length and aligned entries.
//! Invariants: Ordering is frequency descending, then label ascending.
//! Invariants: A criterion spans at most `MAX_CONTEXT_WIDTH` positions beyond the line itself.
//! Notes: A norm of 0 means "no natural normalizing size"; callers fall back to corpus size.
use std::collections::HashMap;

use crate::core::error::Error;
use crate::engine::vertical::{CorpusData, Span};

const MAX_CONTEXT_WIDTH: i64 = 256;

/// Parallel label/frequency/norm sequences produced by a frequency query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreqDist {
    pub words: Vec<String>,
    pub freqs: Vec<i64>,
    pub norms: Vec<i64>,
}

impl FreqDist {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        self.words.len() == self.freqs.len() && self.freqs.len() == self.norms.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    Start,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pos {
    offset: i64,
    anchor: Anchor,
}

impl Pos {
    fn resolve(self, line: Span) -> i64 {
        match self.anchor {
            Anchor::Start => (line.start as i64).saturating_add(self.offset),
            Anchor::End => (line.end as i64 - 1).saturating_add(self.offset),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Attr(usize),
    Struct { structure: usize, attr: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Criterion {
    source: Source,
    lowercase: bool,
    from: Pos,
    to: Pos,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Criteria {
    items: Vec<Criterion>,
}

impl Criteria {
    pub fn parse(text: &str, data: &CorpusData) -> Result<Self, Error> {
        let mut words = text.split_whitespace().peekable();
        let mut items = Vec::new();
        while let Some(spec) = words.next() {
            let ctx = words.next_if(|w| looks_like_ctx(w)).unwrap_or("0");
            items.push(parse_item(spec, ctx, data)?);
        }
        if items.is_empty() {
            return Err(Error::engine("empty frequency criteria"));
        }
        Ok(Self { items })
    }

    fn label(&self, data: &CorpusData, line: Span) -> String {
        let parts: Vec<String> = self
            .items
            .iter()
            .map(|item| item.label(data, line))
            .collect();
        parts.join("\t")
    }

    // Only a lone structure attribute has a natural normalizing size.
    fn norms(&self, data: &CorpusData) -> Option<HashMap<String, i64>> {
        let [item] = self.items.as_slice() else {
            return None;
        };
        let Source::Struct { structure, attr } = item.source else {
            return None;
        };
        let structure = &data.structures[structure];
        let mut sizes: HashMap<String, i64> = HashMap::new();
        for (sidx, span) in structure.spans().iter().enumerate() {
            let value = normalize(structure.value(attr, sidx), item.lowercase);
            *sizes.entry(value).or_default() += span.len() as i64;
        }
        Some(sizes)
    }
}

impl Criterion {
    fn label(&self, data: &CorpusData, line: Span) -> String {
        let from = self.from.resolve(line);
        let to = self.to.resolve(line);
        let values: Vec<String> = (from..=to)
            .map(|pos| normalize(self.value_at(data, pos), self.lowercase))
            .collect();
        values.join(" ")
    }

    fn value_at<'a>(&self, data: &'a CorpusData, pos: i64) -> &'a str {
        let Ok(pos) = usize::try_from(pos) else {
            return "";
        };
        if pos >= data.size() {
            return "";
        }
        match self.source {
            Source::Attr(attr) => data.attributes[attr].value_at(pos),
            Source::Struct { structure, attr } => {
                let structure = &data.structures[structure];
                structure
                    .span_at(pos)
                    .map(|sidx| structure.value(attr, sidx))
                    .unwrap_or("")
            }
        }
    }
}

fn normalize(value: &str, lowercase: bool) -> String {
    if lowercase {
        value.to_lowercase()
    } else {
        value.to_string()
    }
}

fn looks_like_ctx(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit() || c == '-')
}

fn parse_item(spec: &str, ctx: &str, data: &CorpusData) -> Result<Criterion, Error> {
    let (name, flags) = match spec.split_once('/') {
        Some((name, flags)) => (name, flags),
        None => (spec, ""),
    };
    let mut lowercase = false;
    for flag in flags.chars() {
        match flag {
            'i' => lowercase = true,
            'e' => {}
            other => {
                return Err(Error::engine(format!(
                    "unknown frequency criterion flag '{other}' in \"{spec}\""
                )));
            }
        }
    }
    let source = resolve_source(name, data)?;
    let (from, to) = match ctx.split_once('~') {
        Some((from, to)) => (parse_pos(from)?, parse_pos(to)?),
        None => {
            let pos = parse_pos(ctx)?;
            (pos, pos)
        }
    };
    match to.offset.checked_sub(from.offset) {
        Some(width) if width <= MAX_CONTEXT_WIDTH => {}
        _ => {
            return Err(Error::engine(format!(
                "frequency context too wide \"{ctx}\" (at most {MAX_CONTEXT_WIDTH} positions)"
            )));
        }
    }
    Ok(Criterion {
        source,
        lowercase,
        from,
        to,
    })
}

fn resolve_source(name: &str, data: &CorpusData) -> Result<Source, Error> {
    if let Some((sname, aname)) = name.split_once('.') {
        let structure = data
            .structures
            .iter()
            .position(|s| s.name == sname)
            .ok_or_else(|| Error::engine(format!("StructNotFound ({sname})")))?;
        let attr = data.structures[structure]
            .attr_index(aname)
            .ok_or_else(|| Error::engine(format!("AttrNotFound ({name})")))?;
        return Ok(Source::Struct { structure, attr });
    }
    data.attributes
        .iter()
        .position(|a| a.name == name)
        .map(Source::Attr)
        .ok_or_else(|| Error::engine(format!("AttrNotFound ({name})")))
}

fn parse_pos(text: &str) -> Result<Pos, Error> {
    let (offset, anchor) = if let Some(offset) = text.strip_suffix(">0") {
        (offset, Anchor::End)
    } else if let Some(offset) = text.strip_suffix("<0") {
        (offset, Anchor::Start)
    } else {
        (text, Anchor::Start)
    };
    let offset = offset
        .parse::<i64>()
        .map_err(|_| Error::engine(format!("invalid frequency context \"{text}\"")))?;
    Ok(Pos { offset, anchor })
}

/// Buckets `lines` by `criteria`, dropping labels seen fewer than `flimit` times.
pub fn distribution(
    data: &CorpusData,
    lines: &[Span],
    criteria: &Criteria,
    flimit: i64,
) -> FreqDist {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for line in lines {
        *counts.entry(criteria.label(data, *line)).or_default() += 1;
    }
    let norms = criteria.norms(data);

    let mut rows: Vec<(String, i64)> = counts
        .into_iter()
        .filter(|(_, freq)| *freq >= flimit)
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut dist = FreqDist::default();
    for (word, freq) in rows {
        let norm = norms
            .as_ref()
            .and_then(|sizes| sizes.get(&word).copied())
            .unwrap_or(0);
        dist.words.push(word);
        dist.freqs.push(freq);
        dist.norms.push(norm);
    }
    dist
}
