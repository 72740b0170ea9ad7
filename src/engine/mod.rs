//! Purpose: The corpus engine seam the boundary calls into, plus the reference engine.
//! Exports: `Engine`, `VerticalEngine`, `FreqDist`, engine submodules.
//! Role: `Engine` mirrors the native calls (open, size, conf, evaluate, filter, sync,
//! conc size, frequency distribution); `VerticalEngine` implements them over
//! registry + vertical files.
//! Invariants: Engine methods report failure as `Error` values with kind `Engine`;
//! anything they panic with is caught by the caller's fault boundary.
pub mod conc;
pub mod corpus;
pub mod freq;
pub mod query;
pub mod registry;
pub mod vertical;

use std::path::Path;
use std::sync::Arc;

use crate::core::error::Error;

pub use conc::Concordance;
pub use corpus::Corpus;
pub use freq::FreqDist;
pub use query::CompiledQuery;

pub trait Engine: Send + Sync + 'static {
    type Corpus: Send + Sync + 'static;
    type Filter;
    type Concordance: Send + Sync + 'static;

    fn open_corpus(&self, path: &str) -> Result<Self::Corpus, Error>;

    fn corpus_size(&self, corpus: &Self::Corpus) -> Result<i64, Error>;

    fn corpus_conf(&self, corpus: &Self::Corpus, key: &str) -> Result<String, Error>;

    /// Query evaluator: turns query text into a filter bound to `corpus`.
    fn eval_query(&self, query: &str, corpus: &Self::Corpus) -> Result<Self::Filter, Error>;

    fn filter_concordance(
        &self,
        corpus: &Arc<Self::Corpus>,
        filter: Self::Filter,
    ) -> Result<Self::Concordance, Error>;

    /// Forces completion of a possibly lazy concordance.
    fn sync(&self, conc: &mut Self::Concordance) -> Result<(), Error>;

    fn concordance_size(&self, conc: &Self::Concordance) -> Result<i64, Error>;

    fn freq_dist(
        &self,
        corpus: &Self::Corpus,
        conc: &Self::Concordance,
        criteria: &str,
        flimit: i64,
    ) -> Result<FreqDist, Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VerticalEngine;

impl Engine for VerticalEngine {
    type Corpus = Corpus;
    type Filter = CompiledQuery;
    type Concordance = Concordance;

    fn open_corpus(&self, path: &str) -> Result<Corpus, Error> {
        Corpus::open(Path::new(path))
    }

    fn corpus_size(&self, corpus: &Corpus) -> Result<i64, Error> {
        Ok(corpus.size())
    }

    fn corpus_conf(&self, corpus: &Corpus, key: &str) -> Result<String, Error> {
        corpus.get_conf(key)
    }

    fn eval_query(&self, query: &str, corpus: &Corpus) -> Result<CompiledQuery, Error> {
        let ast = query::parse(query, corpus.registry().default_attr())?;
        query::compile(query, &ast, corpus.data())
    }

    fn filter_concordance(
        &self,
        corpus: &Arc<Corpus>,
        filter: CompiledQuery,
    ) -> Result<Concordance, Error> {
        Ok(Concordance::new(Arc::clone(corpus), filter))
    }

    fn sync(&self, conc: &mut Concordance) -> Result<(), Error> {
        conc.sync();
        Ok(())
    }

    fn concordance_size(&self, conc: &Concordance) -> Result<i64, Error> {
        conc.size()
    }

    fn freq_dist(
        &self,
        corpus: &Corpus,
        conc: &Concordance,
        criteria: &str,
        flimit: i64,
    ) -> Result<FreqDist, Error> {
        if !std::ptr::eq(conc.corpus().as_ref(), corpus) {
            return Err(Error::engine("concordance belongs to a different corpus"));
        }
        let criteria = freq::Criteria::parse(criteria, corpus.data())?;
        Ok(freq::distribution(
            corpus.data(),
            conc.lines()?,
            &criteria,
            flimit,
        ))
    }
}
