//! Purpose: Typed call boundary over an `Engine`: handle tables plus one fault guard per call.
//! Exports: `Boundary`, `ResultVector`.
//! Role: Invocation adapter shared by the C ABI and the Rust API/CLI.
//! Invariants: Every engine call runs inside `fault::guard`; nothing panics past this type.
//! Invariants: The boundary owns engine objects only through its tables; hosts own handles.
//! Invariants: A concordance is unusable once its originating corpus handle is closed.
//! Invariants: Handle tables are never locked across an engine call.
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::core::error::{Error, ErrorKind};
use crate::core::fault::guard;
use crate::core::handle::{Family, Handle, HandleTable};
use crate::engine::Engine;

/// Host-visible result vector; filled by `freq_dist`, read by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultVector {
    Str(Vec<String>),
    Int(Vec<i64>),
}

impl ResultVector {
    pub fn len(&self) -> usize {
        match self {
            Self::Str(items) => items.len(),
            Self::Int(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
        }
    }
}

struct ConcEntry<C> {
    corpus: Handle,
    conc: C,
}

pub struct Boundary<E: Engine> {
    engine: E,
    config: Config,
    corpora: HandleTable<E::Corpus>,
    concordances: HandleTable<ConcEntry<E::Concordance>>,
    vectors: HandleTable<RwLock<ResultVector>>,
}

impl<E: Engine> Boundary<E> {
    pub fn new(engine: E, config: Config) -> Self {
        Self {
            engine,
            config,
            corpora: HandleTable::new(Family::Corpus),
            concordances: HandleTable::new(Family::Concordance),
            vectors: HandleTable::new(Family::Vector),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live handle counts: corpora, concordances, vectors.
    pub fn live_handles(&self) -> (usize, usize, usize) {
        (
            self.corpora.len(),
            self.concordances.len(),
            self.vectors.len(),
        )
    }

    // corpus lifecycle

    pub fn open_corpus(&self, path: &str) -> Result<Handle, Error> {
        let resolved = self.config.resolve_corpus_path(path);
        let resolved = resolved.to_string_lossy();
        let corpus = guard("open_corpus", || self.engine.open_corpus(&resolved))?;
        let handle = self.corpora.insert(corpus)?;
        tracing::debug!(path = %resolved, ?handle, "corpus opened");
        Ok(handle)
    }

    pub fn close_corpus(&self, handle: Handle) -> Result<(), Error> {
        let corpus = self.corpora.remove(handle)?;
        guard("close_corpus", || {
            drop(corpus);
            Ok(())
        })?;
        tracing::debug!(?handle, "corpus closed");
        Ok(())
    }

    pub fn corpus_size(&self, handle: Handle) -> Result<i64, Error> {
        let corpus = self.corpora.get(handle)?;
        guard("corpus_size", || self.engine.corpus_size(&corpus))
    }

    pub fn corpus_conf(&self, handle: Handle, key: &str) -> Result<String, Error> {
        let corpus = self.corpora.get(handle)?;
        guard("corpus_conf", || self.engine.corpus_conf(&corpus, key))
    }

    // concordances

    pub fn create_concordance(&self, corpus_handle: Handle, query: &str) -> Result<Handle, Error> {
        let corpus = self.corpora.get(corpus_handle)?;
        let conc = guard("create_concordance", || {
            let filter = self.engine.eval_query(query, &corpus)?;
            let mut conc = self.engine.filter_concordance(&corpus, filter)?;
            self.engine.sync(&mut conc)?;
            Ok(conc)
        })?;
        let handle = self.concordances.insert(ConcEntry {
            corpus: corpus_handle,
            conc,
        })?;
        tracing::debug!(corpus = ?corpus_handle, ?handle, query, "concordance created");
        Ok(handle)
    }

    pub fn concordance_size(&self, handle: Handle) -> Result<i64, Error> {
        let entry = self.concordance(handle)?;
        guard("concordance_size", || {
            self.engine.concordance_size(&entry.conc)
        })
    }

    pub fn close_concordance(&self, handle: Handle) -> Result<(), Error> {
        let entry = self.concordances.remove(handle)?;
        guard("close_concordance", || {
            drop(entry);
            Ok(())
        })
    }

    fn concordance(&self, handle: Handle) -> Result<Arc<ConcEntry<E::Concordance>>, Error> {
        let entry = self.concordances.get(handle)?;
        if !self.corpora.contains(entry.corpus) {
            return Err(Error::new(ErrorKind::InvalidHandle).with_message(format!(
                "{handle:?} outlived its corpus {:?}",
                entry.corpus
            )));
        }
        Ok(entry)
    }

    // vectors

    pub fn new_str_vector(&self) -> Result<Handle, Error> {
        self.vectors.insert(RwLock::new(ResultVector::Str(Vec::new())))
    }

    pub fn new_int_vector(&self) -> Result<Handle, Error> {
        self.vectors.insert(RwLock::new(ResultVector::Int(Vec::new())))
    }

    pub fn free_vector(&self, handle: Handle) -> Result<(), Error> {
        self.vectors.remove(handle).map(drop)
    }

    pub fn vector_size(&self, handle: Handle) -> Result<i64, Error> {
        let vector = self.vectors.get(handle)?;
        let items = read(&vector)?;
        Ok(items.len() as i64)
    }

    pub fn str_vector_get(&self, handle: Handle, index: i64) -> Result<String, Error> {
        let vector = self.vectors.get(handle)?;
        let items = read(&vector)?;
        match &*items {
            ResultVector::Str(items) => Ok(items[checked_index(index, items.len())?].clone()),
            other => Err(wrong_vector(handle, "string", other)),
        }
    }

    pub fn int_vector_get(&self, handle: Handle, index: i64) -> Result<i64, Error> {
        let vector = self.vectors.get(handle)?;
        let items = read(&vector)?;
        match &*items {
            ResultVector::Int(items) => Ok(items[checked_index(index, items.len())?]),
            other => Err(wrong_vector(handle, "int", other)),
        }
    }

    /// Snapshot of a vector's contents.
    pub fn vector(&self, handle: Handle) -> Result<ResultVector, Error> {
        let vector = self.vectors.get(handle)?;
        let items = read(&vector)?;
        Ok(items.clone())
    }

    // frequency distribution

    /// Replaces the contents of the three output vectors with the distribution of
    /// `conc` by `criteria`. Outputs are untouched when anything fails.
    #[allow(clippy::too_many_arguments)]
    pub fn freq_dist(
        &self,
        corpus_handle: Handle,
        conc_handle: Handle,
        criteria: &str,
        flimit: i64,
        words: Handle,
        freqs: Handle,
        norms: Handle,
    ) -> Result<(), Error> {
        if words == freqs || words == norms || freqs == norms {
            return Err(Error::new(ErrorKind::Usage).with_message("output vectors must be distinct"));
        }
        let corpus = self.corpora.get(corpus_handle)?;
        let entry = self.concordance(conc_handle)?;
        if entry.corpus != corpus_handle {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "{conc_handle:?} was not created from {corpus_handle:?}"
            )));
        }
        let out_words = self.vectors.get(words)?;
        let out_freqs = self.vectors.get(freqs)?;
        let out_norms = self.vectors.get(norms)?;
        expect_kind(words, &out_words, "string")?;
        expect_kind(freqs, &out_freqs, "int")?;
        expect_kind(norms, &out_norms, "int")?;

        let dist = guard("freq_dist", || {
            self.engine.freq_dist(&corpus, &entry.conc, criteria, flimit)
        })?;
        if !dist.is_aligned() {
            return Err(Error::new(ErrorKind::Internal).with_message(format!(
                "engine returned misaligned distribution ({}/{}/{})",
                dist.words.len(),
                dist.freqs.len(),
                dist.norms.len()
            )));
        }
        tracing::debug!(criteria, flimit, items = dist.len(), "frequency distribution computed");

        *write(&out_words)? = ResultVector::Str(dist.words);
        *write(&out_freqs)? = ResultVector::Int(dist.freqs);
        *write(&out_norms)? = ResultVector::Int(dist.norms);
        Ok(())
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, Error> {
    usize::try_from(index)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or_else(|| {
            Error::new(ErrorKind::Index)
                .with_message(format!("index {index} out of range for length {len}"))
        })
}

fn wrong_vector(handle: Handle, wanted: &str, found: &ResultVector) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!(
        "{handle:?} is a {} vector, not a {wanted} vector",
        found.kind_name()
    ))
}

fn expect_kind(handle: Handle, vector: &RwLock<ResultVector>, wanted: &str) -> Result<(), Error> {
    let items = read(vector)?;
    if items.kind_name() == wanted {
        Ok(())
    } else {
        Err(wrong_vector(handle, wanted, &items))
    }
}

fn read(vector: &RwLock<ResultVector>) -> Result<RwLockReadGuard<'_, ResultVector>, Error> {
    vector
        .read()
        .map_err(|_| Error::new(ErrorKind::Internal).with_message("vector lock poisoned"))
}

fn write(vector: &RwLock<ResultVector>) -> Result<RwLockWriteGuard<'_, ResultVector>, Error> {
    vector
        .write()
        .map_err(|_| Error::new(ErrorKind::Internal).with_message("vector lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::{Boundary, ResultVector, checked_index};
    use crate::config::Config;
    use crate::core::error::{Error, ErrorKind};
    use crate::engine::{Engine, FreqDist};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Engine double with live-object counters; queries are integers ("3" = 3 matches).
    #[derive(Default)]
    struct CountingEngine {
        live_corpora: Arc<AtomicI64>,
        live_concs: Arc<AtomicI64>,
    }

    struct FakeCorpus {
        size: i64,
        live: Arc<AtomicI64>,
    }

    impl Drop for FakeCorpus {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct FakeConc {
        size: i64,
        synced: bool,
        live: Arc<AtomicI64>,
    }

    impl Drop for FakeConc {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Engine for CountingEngine {
        type Corpus = FakeCorpus;
        type Filter = i64;
        type Concordance = FakeConc;

        fn open_corpus(&self, path: &str) -> Result<FakeCorpus, Error> {
            if path == "panic" {
                panic!("segfault stand-in");
            }
            let size = path
                .parse()
                .map_err(|_| Error::engine(format!("CorpInfoNotFound ({path})")))?;
            self.live_corpora.fetch_add(1, Ordering::SeqCst);
            Ok(FakeCorpus {
                size,
                live: Arc::clone(&self.live_corpora),
            })
        }

        fn corpus_size(&self, corpus: &FakeCorpus) -> Result<i64, Error> {
            Ok(corpus.size)
        }

        fn corpus_conf(&self, _corpus: &FakeCorpus, key: &str) -> Result<String, Error> {
            match key {
                "ENCODING" => Ok("UTF-8".to_string()),
                _ => Err(Error::engine(format!("unknown configuration key: {key}"))),
            }
        }

        fn eval_query(&self, query: &str, _corpus: &FakeCorpus) -> Result<i64, Error> {
            query
                .parse()
                .map_err(|_| Error::engine("query syntax error"))
        }

        fn filter_concordance(&self, _corpus: &Arc<FakeCorpus>, filter: i64) -> Result<FakeConc, Error> {
            self.live_concs.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConc {
                size: filter,
                synced: false,
                live: Arc::clone(&self.live_concs),
            })
        }

        fn sync(&self, conc: &mut FakeConc) -> Result<(), Error> {
            conc.synced = true;
            Ok(())
        }

        fn concordance_size(&self, conc: &FakeConc) -> Result<i64, Error> {
            assert!(conc.synced, "size before sync");
            Ok(conc.size)
        }

        fn freq_dist(
            &self,
            _corpus: &FakeCorpus,
            conc: &FakeConc,
            criteria: &str,
            _flimit: i64,
        ) -> Result<FreqDist, Error> {
            if criteria == "misaligned" {
                return Ok(FreqDist {
                    words: vec!["a".to_string()],
                    freqs: Vec::new(),
                    norms: Vec::new(),
                });
            }
            let n = conc.size;
            Ok(FreqDist {
                words: (0..n).map(|i| format!("w{i}")).collect(),
                freqs: (0..n).map(|i| n - i).collect(),
                norms: vec![0; n as usize],
            })
        }
    }

    fn boundary() -> Boundary<CountingEngine> {
        Boundary::new(CountingEngine::default(), Config::default())
    }

    #[test]
    fn close_releases_engine_objects() {
        let b = boundary();
        let corpus = b.open_corpus("100").unwrap();
        let conc = b.create_concordance(corpus, "4").unwrap();
        assert_eq!(b.engine().live_corpora.load(Ordering::SeqCst), 1);
        assert_eq!(b.engine().live_concs.load(Ordering::SeqCst), 1);

        b.close_concordance(conc).unwrap();
        b.close_corpus(corpus).unwrap();
        assert_eq!(b.engine().live_corpora.load(Ordering::SeqCst), 0);
        assert_eq!(b.engine().live_concs.load(Ordering::SeqCst), 0);
        assert_eq!(b.live_handles(), (0, 0, 0));
    }

    #[test]
    fn double_close_is_detected() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        b.close_corpus(corpus).unwrap();
        let err = b.close_corpus(corpus).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert_eq!(b.corpus_size(corpus).unwrap_err().kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn engine_panics_become_internal_errors() {
        let b = boundary();
        let err = b.open_corpus("panic").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().unwrap().contains("segfault stand-in"));
        assert_eq!(b.live_handles(), (0, 0, 0));
    }

    #[test]
    fn failed_query_leaves_corpus_usable() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        let err = b.create_concordance(corpus, "malformed query (").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(b.corpus_size(corpus).unwrap(), 10);
        assert_eq!(b.engine().live_concs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concordance_is_invalid_after_corpus_close() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        let conc = b.create_concordance(corpus, "2").unwrap();
        b.close_corpus(corpus).unwrap();
        let err = b.concordance_size(conc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert!(err.message().unwrap().contains("outlived its corpus"));
        b.close_concordance(conc).unwrap();
    }

    #[test]
    fn config_lookups_are_idempotent() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        let first = b.corpus_conf(corpus, "ENCODING").unwrap();
        let second = b.corpus_conf(corpus, "ENCODING").unwrap();
        assert_eq!(first, second);
        assert_eq!(b.corpus_conf(corpus, "NOPE").unwrap_err().kind(), ErrorKind::Engine);
    }

    #[test]
    fn freq_dist_fills_aligned_vectors() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        let conc = b.create_concordance(corpus, "3").unwrap();
        let words = b.new_str_vector().unwrap();
        let freqs = b.new_int_vector().unwrap();
        let norms = b.new_int_vector().unwrap();

        b.freq_dist(corpus, conc, "word", 1, words, freqs, norms).unwrap();
        assert_eq!(b.vector_size(words).unwrap(), 3);
        assert_eq!(b.vector_size(freqs).unwrap(), 3);
        assert_eq!(b.vector_size(norms).unwrap(), 3);
        assert_eq!(b.str_vector_get(words, 1).unwrap(), "w1");
        assert_eq!(b.int_vector_get(freqs, 1).unwrap(), 2);

        // a second call replaces rather than appends
        b.freq_dist(corpus, conc, "word", 1, words, freqs, norms).unwrap();
        assert_eq!(
            b.vector(words).unwrap(),
            ResultVector::Str(vec!["w0".into(), "w1".into(), "w2".into()])
        );
    }

    #[test]
    fn freq_dist_rejects_bad_outputs_without_touching_them() {
        let b = boundary();
        let corpus = b.open_corpus("10").unwrap();
        let conc = b.create_concordance(corpus, "2").unwrap();
        let words = b.new_str_vector().unwrap();
        let freqs = b.new_int_vector().unwrap();
        let norms = b.new_int_vector().unwrap();

        let swapped = b.freq_dist(corpus, conc, "word", 1, freqs, words, norms);
        assert_eq!(swapped.unwrap_err().kind(), ErrorKind::Usage);
        let aliased = b.freq_dist(corpus, conc, "word", 1, words, freqs, freqs);
        assert_eq!(aliased.unwrap_err().kind(), ErrorKind::Usage);
        let misaligned = b.freq_dist(corpus, conc, "misaligned", 1, words, freqs, norms);
        assert_eq!(misaligned.unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(b.vector_size(words).unwrap(), 0);

        let other = b.open_corpus("5").unwrap();
        let foreign = b.freq_dist(other, conc, "word", 1, words, freqs, norms);
        assert_eq!(foreign.unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn vector_access_is_bounds_and_type_checked() {
        let b = boundary();
        let words = b.new_str_vector().unwrap();
        let freqs = b.new_int_vector().unwrap();
        assert_eq!(b.str_vector_get(words, 0).unwrap_err().kind(), ErrorKind::Index);
        assert_eq!(b.str_vector_get(words, -1).unwrap_err().kind(), ErrorKind::Index);
        assert_eq!(b.int_vector_get(words, 0).unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(b.str_vector_get(freqs, 0).unwrap_err().kind(), ErrorKind::Usage);

        b.free_vector(words).unwrap();
        assert_eq!(b.vector_size(words).unwrap_err().kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn checked_index_rejects_out_of_range() {
        assert_eq!(checked_index(0, 1).unwrap(), 0);
        assert!(checked_index(1, 1).is_err());
        assert!(checked_index(i64::MIN, 1).is_err());
    }
}
