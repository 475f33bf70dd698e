use searchcore::config::RankConfig;
use searchcore::index::classic_idf;
use searchcore::persist::{load_all, load_index_files, save_all, save_index_files, IndexPaths};
use searchcore::retrieval::{QueryOptions, RetrievalMode, Weights};
use searchcore::{authority_scores, DocumentId, IndexBuilder, SearchSnapshot, SourceDocument};
use tempfile::tempdir;

fn doc(id: &str, title: &str, body: &str, links: &[&str]) -> SourceDocument {
    SourceDocument {
        id: id.into(),
        title: Some(title.into()),
        body: body.into(),
        links: links.iter().map(|l| l.to_string()).collect(),
        ..Default::default()
    }
}

fn animals() -> SearchSnapshot {
    let out = IndexBuilder::default().build(vec![
        doc("0-1", "A", "cat dog cat", &[]),
        doc("0-2", "B", "dog bird", &[]),
        doc("0-3", "C", "cat bird bird", &[]),
    ]);
    SearchSnapshot::from_build(out, Weights::default())
}

#[test]
fn bm25_prefers_the_document_with_more_matches() {
    let snapshot = animals();
    let q = snapshot.normalizer().normalize("cat");
    let hits = snapshot.query(&q.groups, RetrievalMode::Bm25, &QueryOptions::default());
    let ids: Vec<String> = hits.iter().map(|h| h.doc_id.to_string()).collect();
    assert_eq!(ids, vec!["0-1", "0-3"]);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn conjunctive_mode_requires_every_term() {
    let snapshot = animals();
    let q = snapshot.normalizer().normalize("Cat, bird!");
    let hits = snapshot.query(&q.groups, RetrievalMode::Conjunctive, &QueryOptions::default());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocumentId::new(0, 3));

    let q = snapshot.normalizer().normalize("cat unicorn");
    assert!(snapshot.query(&q.groups, RetrievalMode::Conjunctive, &QueryOptions::default()).is_empty());
}

#[test]
fn top_k_truncates_after_sorting() {
    let snapshot = animals();
    let q = snapshot.normalizer().normalize("bird");
    let options = QueryOptions { top_k: Some(1), ..Default::default() };
    let hits = snapshot.query(&q.groups, RetrievalMode::Bm25, &options);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocumentId::new(0, 3));
}

#[test]
fn mutual_links_outrank_an_isolated_page() {
    let out = IndexBuilder::default().build(vec![
        doc("0-1", "A", "alpha", &["B"]),
        doc("0-2", "B", "beta", &["A"]),
        doc("0-3", "C", "gamma", &[]),
    ]);
    let scores = authority_scores(&out.docs.link_graph(), &RankConfig::default()).unwrap();
    assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    assert!((scores[0] - scores[1]).abs() < 1e-9);
    assert!(scores[0] > scores[2]);
}

#[test]
fn idf_survives_the_exchange_files() {
    let snapshot = animals();
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_index_files(&paths, &snapshot).unwrap();
    let back = load_index_files(&paths).unwrap();
    for (term, list) in &back.corpus.terms {
        assert_eq!(list.idf, snapshot.corpus.get(term).unwrap().idf);
        assert_eq!(list.idf, classic_idf(3, list.document_count));
        assert!(list.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
    }
}

#[test]
fn a_saved_index_answers_the_same_queries() {
    let mut out = IndexBuilder::default().build(vec![
        doc("0-1", "Group theory", "group axioms identity inverse", &["Ring theory"]),
        doc("0-2", "Ring theory", "ring group addition multiplication", &["Group theory"]),
        doc("0-3", "Topology", "open sets continuity", &[]),
    ]);
    let scores = authority_scores(&out.docs.link_graph(), &RankConfig::default()).unwrap();
    out.docs.assign_authority(&scores);
    let snapshot = SearchSnapshot::from_build(out, Weights([1.0, 1.0, 10.0, 1.0, 0.0]));

    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_all(&paths, &snapshot).unwrap();
    let loaded = load_all(&paths).unwrap();

    let q = loaded.normalizer().normalize("group");
    for mode in [RetrievalMode::Bm25, RetrievalMode::LearnedLinear] {
        let expected = snapshot.query(&q.groups, mode, &QueryOptions::default());
        let actual = loaded.query(&q.groups, mode, &QueryOptions::default());
        assert_eq!(expected, actual);
        assert_eq!(actual.len(), 2);
    }
}
