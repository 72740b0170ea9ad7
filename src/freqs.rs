//! Purpose: Row-oriented frequency results on top of the vector-based boundary calls.
//! Exports: `FreqItem`, `freq_items`.
//! Role: Used by the CLI `freqs` command and by Rust callers that want rows, not vectors.
//! Invariants: Output vectors are created and freed here; no handle outlives the call.
//! Invariants: An item without a norm reports the corpus size as `norm` and `ipm` base.
use serde::Serialize;

use crate::boundary::{Boundary, ResultVector};
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::Handle;
use crate::engine::Engine;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FreqItem {
    pub word: String,
    pub freq: i64,
    pub norm: i64,
    pub ipm: f64,
}

impl FreqItem {
    fn new(word: String, freq: i64, norm: i64, corpus_size: i64) -> Self {
        let base = if norm > 0 { norm } else { corpus_size };
        let ipm = if base > 0 {
            freq as f64 / base as f64 * 1e6
        } else {
            0.0
        };
        Self {
            word,
            freq,
            norm: base,
            ipm,
        }
    }
}

pub fn freq_items<E: Engine>(
    boundary: &Boundary<E>,
    corpus: Handle,
    conc: Handle,
    criteria: &str,
    flimit: i64,
) -> Result<Vec<FreqItem>, Error> {
    let words = boundary.new_str_vector()?;
    let outputs = boundary.new_int_vector().and_then(|freqs| {
        boundary
            .new_int_vector()
            .map(|norms| (freqs, norms))
            .inspect_err(|_| {
                let _ = boundary.free_vector(freqs);
            })
    });
    let (freqs, norms) = match outputs {
        Ok(outputs) => outputs,
        Err(err) => {
            let _ = boundary.free_vector(words);
            return Err(err);
        }
    };

    let result = collect(boundary, corpus, conc, criteria, flimit, [words, freqs, norms]);
    for vector in [words, freqs, norms] {
        if let Err(err) = boundary.free_vector(vector) {
            tracing::warn!(?vector, error = %err, "failed to free result vector");
        }
    }
    result
}

fn collect<E: Engine>(
    boundary: &Boundary<E>,
    corpus: Handle,
    conc: Handle,
    criteria: &str,
    flimit: i64,
    [words, freqs, norms]: [Handle; 3],
) -> Result<Vec<FreqItem>, Error> {
    boundary.freq_dist(corpus, conc, criteria, flimit, words, freqs, norms)?;
    let corpus_size = boundary.corpus_size(corpus)?;
    let (ResultVector::Str(words), ResultVector::Int(freqs), ResultVector::Int(norms)) = (
        boundary.vector(words)?,
        boundary.vector(freqs)?,
        boundary.vector(norms)?,
    ) else {
        return Err(Error::new(ErrorKind::Internal).with_message("result vectors changed type"));
    };
    Ok(words
        .into_iter()
        .zip(freqs)
        .zip(norms)
        .map(|((word, freq), norm)| FreqItem::new(word, freq, norm, corpus_size))
        .collect())
}
