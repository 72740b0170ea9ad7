//! Purpose: Typed boundary over the reference engine with a private handle space.
//! Role: Checks lifecycle accounting and row helpers without the process-wide ABI state.
mod support;

use mango::boundary::{Boundary, ResultVector};
use mango::config::Config;
use mango::core::error::ErrorKind;
use mango::engine::VerticalEngine;
use mango::freqs::freq_items;
use mango::info::corpus_info;

fn boundary(fixture: &support::Fixture) -> Boundary<VerticalEngine> {
    let config = Config {
        registry_dirs: vec![fixture.registry_dir.clone()],
        log_filter: None,
    };
    Boundary::new(VerticalEngine, config)
}

#[test]
fn every_handle_is_released() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);

    let corpus = b.open_corpus("mini").unwrap();
    let conc = b.create_concordance(corpus, r#"[word="the"]"#).unwrap();
    let items = freq_items(&b, corpus, conc, "doc.id", 1).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(b.live_handles(), (1, 1, 0));

    b.close_concordance(conc).unwrap();
    b.close_corpus(corpus).unwrap();
    assert_eq!(b.live_handles(), (0, 0, 0));
}

#[test]
fn document_norms_sum_to_corpus_size() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let corpus = b.open_corpus(fixture.registry_str()).unwrap();
    let conc = b.create_concordance(corpus, r#"[word="the"]"#).unwrap();
    let words = b.new_str_vector().unwrap();
    let freqs = b.new_int_vector().unwrap();
    let norms = b.new_int_vector().unwrap();

    b.freq_dist(corpus, conc, "doc.id", 1, words, freqs, norms)
        .unwrap();
    let ResultVector::Int(norm_values) = b.vector(norms).unwrap() else {
        panic!("norms is an int vector");
    };
    assert_eq!(norm_values.iter().sum::<i64>(), b.corpus_size(corpus).unwrap());
    assert_eq!(
        b.vector(words).unwrap(),
        ResultVector::Str(vec!["d1".into(), "d2".into(), "d3".into()])
    );
}

#[test]
fn ipm_follows_norm_or_corpus_size() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let corpus = b.open_corpus("mini").unwrap();
    let conc = b.create_concordance(corpus, r#"[word="the"]"#).unwrap();

    let by_doc = freq_items(&b, corpus, conc, "doc.id", 1).unwrap();
    assert_eq!(by_doc[0].word, "d1");
    assert_eq!(by_doc[0].norm, 6);
    assert!((by_doc[0].ipm - 2.0 / 6.0 * 1e6).abs() < 1e-6);

    let by_word = freq_items(&b, corpus, conc, "word", 1).unwrap();
    assert_eq!(by_word.len(), 1);
    assert_eq!(by_word[0].norm, support::SIZE);
    assert!((by_word[0].ipm - 4.0 / 14.0 * 1e6).abs() < 1e-6);

    let err = freq_items(&b, corpus, conc, "doc.nope", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(b.live_handles().2, 0);
}

#[test]
fn context_criteria_read_neighbouring_tokens() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let corpus = b.open_corpus("mini").unwrap();
    let conc = b.create_concordance(corpus, r#"[word="the"]"#).unwrap();

    let items = freq_items(&b, corpus, conc, "word 1", 1).unwrap();
    let rows: Vec<(&str, i64)> = items.iter().map(|i| (i.word.as_str(), i.freq)).collect();
    assert_eq!(rows, [("cat", 2), ("dog", 1), ("mat", 1)]);

    let items = freq_items(&b, corpus, conc, "tag -1 word 0", 1).unwrap();
    assert!(items.iter().any(|i| i.word == "IN\tthe"));
}

#[test]
fn within_restricts_matches_to_a_structure_value() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let corpus = b.open_corpus("mini").unwrap();
    let conc = b
        .create_concordance(corpus, r#"[word="the"] within <doc genre="news"/>"#)
        .unwrap();
    assert_eq!(b.concordance_size(conc).unwrap(), 1);

    let err = b
        .create_concordance(corpus, r#"[word="the"] within <p/>"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(err.message(), Some("StructNotFound (p)"));
}

#[test]
fn info_summarizes_registry_and_closes_corpus() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let info = corpus_info(&b, "mini").unwrap();
    assert_eq!(info.registry_path, fixture.registry);
    assert_eq!(info.size, support::SIZE);
    assert_eq!(info.data_path.as_deref(), Some("/corpora/data/mini/"));
    let vertical = info.vertical.expect("vertical info");
    assert_eq!(vertical.path, fixture.registry_dir.join("mini.vert"));
    assert!(vertical.exists);
    assert_eq!(b.live_handles(), (0, 0, 0));

    let err = corpus_info(&b, "absent").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
}

#[test]
fn concordance_size_matches_independent_count() {
    let fixture = support::mini_corpus();
    let b = boundary(&fixture);
    let corpus = b.open_corpus("mini").unwrap();

    for word in ["the", "cat", "a", "zebra"] {
        let expected = support::VERTICAL
            .lines()
            .filter(|line| !line.starts_with('<'))
            .filter(|line| line.split('\t').next() == Some(word))
            .count() as i64;
        let conc = b
            .create_concordance(corpus, &format!("[word=\"{word}\"]"))
            .unwrap();
        assert_eq!(b.concordance_size(conc).unwrap(), expected, "{word}");
        b.close_concordance(conc).unwrap();
    }
}
