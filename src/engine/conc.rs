//! Purpose: Concordance over a corpus: a compiled query plus its (lazily computed) lines.
//! Exports: `Concordance`.
//! Invariants: Lines are only readable after `sync`; `sync` is idempotent.
//! Invariants: The concordance keeps its corpus data alive for its own lifetime.
use std::sync::Arc;

use crate::core::error::Error;
use crate::engine::corpus::Corpus;
use crate::engine::query::CompiledQuery;
use crate::engine::vertical::Span;

#[derive(Debug)]
pub struct Concordance {
    corpus: Arc<Corpus>,
    query: CompiledQuery,
    lines: Option<Vec<Span>>,
}

impl Concordance {
    pub fn new(corpus: Arc<Corpus>, query: CompiledQuery) -> Self {
        Self {
            corpus,
            query,
            lines: None,
        }
    }

    pub fn sync(&mut self) {
        if self.lines.is_none() {
            let lines = self.query.matches(self.corpus.data());
            tracing::debug!(query = self.query.text(), size = lines.len(), "concordance synced");
            self.lines = Some(lines);
        }
    }

    pub fn lines(&self) -> Result<&[Span], Error> {
        self.lines
            .as_deref()
            .ok_or_else(|| Error::engine("concordance is not synchronized"))
    }

    pub fn size(&self) -> Result<i64, Error> {
        Ok(self.lines()?.len() as i64)
    }

    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }
}
