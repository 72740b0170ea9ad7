// Opened corpus: registry plus loaded vertical data.
use std::path::Path;

use crate::core::error::Error;
use crate::engine::registry::Registry;
use crate::engine::vertical::{self, CorpusData};

#[derive(Debug)]
pub struct Corpus {
    registry: Registry,
    data: CorpusData,
}

impl Corpus {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let registry = Registry::load(path)?;
        let data = vertical::load(&registry)?;
        tracing::debug!(
            corpus = %path.display(),
            size = data.size(),
            attributes = registry.attributes().len(),
            "corpus loaded"
        );
        Ok(Self { registry, data })
    }

    pub fn size(&self) -> i64 {
        self.data.size() as i64
    }

    pub fn get_conf(&self, key: &str) -> Result<String, Error> {
        self.registry
            .get(key)
            .ok_or_else(|| Error::engine(format!("unknown configuration key: {key}")))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn data(&self) -> &CorpusData {
        &self.data
    }
}
