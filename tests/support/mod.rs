//! Shared on-disk corpus fixture for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Tokens in the fixture corpus.
pub const SIZE: i64 = 14;

/// Occurrences of `the` (lowercase word).
pub const THE_COUNT: i64 = 4;

pub const REGISTRY: &str = r#"# three-document test corpus
NAME "Mini"
PATH "/corpora/data/mini/"
VERTICAL "mini.vert"
ENCODING "UTF-8"
LANGUAGE "English"

ATTRIBUTE word
ATTRIBUTE lemma
ATTRIBUTE tag

STRUCTURE doc {
    ATTRIBUTE id
    ATTRIBUTE genre
}
STRUCTURE s
"#;

pub const VERTICAL: &str = "\
<doc id=\"d1\" genre=\"fiction\">
<s>
the\tthe\tDT
cat\tcat\tNN
sat\tsit\tVBD
on\ton\tIN
the\tthe\tDT
mat\tmat\tNN
</s>
</doc>
<doc id=\"d2\" genre=\"news\">
<s>
the\tthe\tDT
dog\tdog\tNN
ran\trun\tVBD
</s>
</doc>
<doc id=\"d3\" genre=\"fiction\">
<s>
a\ta\tDT
bird\tbird\tNN
saw\tsee\tVBD
the\tthe\tDT
cat\tcat\tNN
</s>
</doc>
";

pub struct Fixture {
    pub dir: TempDir,
    pub registry_dir: PathBuf,
    pub registry: PathBuf,
}

impl Fixture {
    pub fn registry_str(&self) -> &str {
        self.registry.to_str().expect("utf-8 temp path")
    }
}

/// Writes `registry/mini` and `registry/mini.vert` into a fresh temp dir.
pub fn mini_corpus() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry_dir = dir.path().join("registry");
    fs::create_dir_all(&registry_dir).expect("mkdir registry");
    let registry = registry_dir.join("mini");
    write(&registry, REGISTRY);
    write(&registry_dir.join("mini.vert"), VERTICAL);
    Fixture {
        dir,
        registry_dir,
        registry,
    }
}

fn write(path: &Path, text: &str) {
    fs::write(path, text).expect("write fixture");
}
