mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use agent_memstore::{namespace, Indexing, Op, OpResult, SearchOp, Store};
use helpers::{at_cos, embedded_store, obj, StubEmbedder};
use serde_json::json;

#[test]
fn gte_filter_selects_matching_items() {
    let mut store = Store::open_in_memory().unwrap();
    store.put(namespace(["scores"]), "a", obj(json!({"score": 4.0}))).unwrap();
    store.put(namespace(["scores"]), "b", obj(json!({"score": 5.0}))).unwrap();
    store.put(namespace(["scores"]), "c", obj(json!({"score": 3.0}))).unwrap();

    let results = store
        .search(SearchOp::new(namespace(["scores"])).with_filter(obj(json!({"score": {"$gte": 4.0}}))))
        .unwrap();

    let keys: Vec<&str> = results.iter().map(|r| r.item.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert!(results.iter().all(|r| r.score.is_none()));
}

#[test]
fn comparison_on_missing_field_does_not_match() {
    let mut store = Store::open_in_memory().unwrap();
    store.put(namespace(["s"]), "has", obj(json!({"n": 10}))).unwrap();
    store.put(namespace(["s"]), "lacks", obj(json!({"other": 10}))).unwrap();
    store.put(namespace(["s"]), "text", obj(json!({"n": "ten"}))).unwrap();

    let results = store
        .search(SearchOp::new(namespace(["s"])).with_filter(obj(json!({"n": {"$lt": 100}}))))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.key, "has");
}

#[test]
fn nested_and_equality_filters() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .put(namespace(["u"]), "1", obj(json!({"meta": {"lang": "en"}, "tags": ["x", "y"]})))
        .unwrap();
    store
        .put(namespace(["u"]), "2", obj(json!({"meta": {"lang": "fr"}, "tags": ["x"]})))
        .unwrap();

    let by_lang = store
        .search(SearchOp::new(namespace(["u"])).with_filter(obj(json!({"meta": {"lang": "en"}}))))
        .unwrap();
    assert_eq!(by_lang.len(), 1);
    assert_eq!(by_lang[0].item.key, "1");

    let by_tags = store
        .search(SearchOp::new(namespace(["u"])).with_filter(obj(json!({"tags": ["x"]}))))
        .unwrap();
    assert_eq!(by_tags.len(), 1);
    assert_eq!(by_tags[0].item.key, "2");

    let ne = store
        .search(SearchOp::new(namespace(["u"])).with_filter(obj(json!({"meta": {"lang": {"$ne": "en"}}}))))
        .unwrap();
    assert_eq!(ne.len(), 1);
    assert_eq!(ne[0].item.key, "2");
}

#[test]
fn search_prefix_is_segment_wise() {
    let mut store = Store::open_in_memory().unwrap();
    store.put(namespace(["users", "alice"]), "k", obj(json!({}))).unwrap();
    store.put(namespace(["users", "alice", "notes"]), "k", obj(json!({}))).unwrap();
    store.put(namespace(["users", "alicia"]), "k", obj(json!({}))).unwrap();

    let results = store
        .search(SearchOp::new(namespace(["users", "alice"])))
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.item.namespace[..2] == namespace(["users", "alice"])[..]));

    assert_eq!(store.search(SearchOp::new(Vec::new())).unwrap().len(), 3);
}

#[test]
fn unscored_pagination_is_stable() {
    let mut store = Store::open_in_memory().unwrap();
    for i in 0..7 {
        store.put(namespace(["p"]), format!("k{i}"), obj(json!({"i": i}))).unwrap();
    }

    let page = |offset| {
        store
            .search(SearchOp::new(namespace(["p"])).with_limit(3).with_offset(offset))
            .unwrap()
            .into_iter()
            .map(|r| r.item.key)
            .collect::<Vec<_>>()
    };

    let all: Vec<String> = [page(0), page(3), page(6)].concat();
    assert_eq!(all, vec!["k0", "k1", "k2", "k3", "k4", "k5", "k6"]);
    assert!(page(7).is_empty());
}

#[test]
fn max_pooling_keeps_best_chunk() {
    let embedder = Arc::new(StubEmbedder::new([
        ("chunk a", at_cos(0.9)),
        ("chunk b", at_cos(0.95)),
        ("other", at_cos(0.5)),
        ("q", at_cos(1.0)),
    ]));
    let mut store = embedded_store(embedder, &["chunks[*]"]);
    store
        .put(namespace(["docs"]), "multi", obj(json!({"chunks": ["chunk a", "chunk b"]})))
        .unwrap();
    store
        .put(namespace(["docs"]), "single", obj(json!({"chunks": ["other"]})))
        .unwrap();

    let results = store
        .search(SearchOp::new(namespace(["docs"])).with_query("q"))
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].item.key, "multi");
    assert!((results[0].score.unwrap() - 0.95).abs() < 1e-5);
    assert_eq!(results[1].item.key, "single");
    assert!((results[1].score.unwrap() - 0.5).abs() < 1e-5);
}

#[test]
fn ranked_pagination_counts_items_not_vectors() {
    let embedder = Arc::new(StubEmbedder::new([
        ("a1", at_cos(0.99)),
        ("a2", at_cos(0.98)),
        ("b1", at_cos(0.97)),
        ("c1", at_cos(0.96)),
        ("c2", at_cos(0.10)),
        ("q", at_cos(1.0)),
    ]));
    let mut store = embedded_store(embedder, &["chunks[*]"]);
    store.put(namespace(["d"]), "a", obj(json!({"chunks": ["a1", "a2"]}))).unwrap();
    store.put(namespace(["d"]), "b", obj(json!({"chunks": ["b1"]}))).unwrap();
    store.put(namespace(["d"]), "c", obj(json!({"chunks": ["c1", "c2"]}))).unwrap();

    let keys = |offset, limit| {
        store
            .search(
                SearchOp::new(namespace(["d"]))
                    .with_query("q")
                    .with_offset(offset)
                    .with_limit(limit),
            )
            .unwrap()
            .into_iter()
            .map(|r| r.item.key)
            .collect::<Vec<_>>()
    };

    assert_eq!(keys(0, 2), vec!["a", "b"]);
    assert_eq!(keys(2, 2), vec!["c"]);
    assert_eq!(keys(1, 1), vec!["b"]);
}

#[test]
fn items_without_vectors_fill_the_page_unscored() {
    let embedder = Arc::new(StubEmbedder::new([("hit", at_cos(0.8)), ("q", at_cos(1.0))]));
    let mut store = embedded_store(embedder, &["text"]);
    store.put(namespace(["m"]), "embedded", obj(json!({"text": "hit"}))).unwrap();
    store
        .put_with_index(namespace(["m"]), "plain", obj(json!({"text": "hit"})), Indexing::Disabled)
        .unwrap();

    let results = store
        .search(SearchOp::new(namespace(["m"])).with_query("q"))
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].item.key, "embedded");
    assert!(results[0].score.is_some());
    assert_eq!(results[1].item.key, "plain");
    assert!(results[1].score.is_none());
}

#[test]
fn queries_in_one_batch_are_embedded_together() {
    let embedder = Arc::new(StubEmbedder::new([("t", at_cos(0.7)), ("q1", at_cos(1.0))]));
    let mut store = embedded_store(embedder.clone(), &["text"]);
    store.put(namespace(["x"]), "k", obj(json!({"text": "t"}))).unwrap();
    let before = embedder.calls.load(Ordering::SeqCst);

    let results = store
        .batch(vec![
            Op::Search(SearchOp::new(namespace(["x"])).with_query("q1")),
            Op::Search(SearchOp::new(namespace(["x"]))),
            Op::Search(SearchOp::new(namespace(["x"])).with_query("q2")),
        ])
        .unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), before + 1);
    match (&results[0], &results[1], &results[2]) {
        (OpResult::Search(a), OpResult::Search(b), OpResult::Search(c)) => {
            assert!((a[0].score.unwrap() - 0.7).abs() < 1e-5);
            assert!(b[0].score.is_none());
            // "q2" embeds to the zero vector.
            assert_eq!(c[0].score, Some(0.0));
        }
        other => panic!("unexpected results {other:?}"),
    }
}

#[test]
fn overwrite_replaces_old_vectors() {
    let embedder = Arc::new(StubEmbedder::new([
        ("old", at_cos(0.99)),
        ("new", at_cos(0.2)),
        ("q", at_cos(1.0)),
    ]));
    let mut store = embedded_store(embedder, &["text"]);
    store.put(namespace(["v"]), "k", obj(json!({"text": "old"}))).unwrap();
    store.put(namespace(["v"]), "k", obj(json!({"text": "new"}))).unwrap();

    let results = store
        .search(SearchOp::new(namespace(["v"])).with_query("q"))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!((results[0].score.unwrap() - 0.2).abs() < 1e-5);
}

#[test]
fn ranked_search_with_unbounded_limit() {
    let embedder = Arc::new(StubEmbedder::new([
        ("first", at_cos(0.9)),
        ("second", at_cos(0.6)),
        ("q", at_cos(1.0)),
    ]));
    let mut store = embedded_store(embedder, &["text"]);
    store.put(namespace(["x"]), "a", obj(json!({"text": "first"}))).unwrap();
    store.put(namespace(["x"]), "b", obj(json!({"text": "second"}))).unwrap();

    let results = store
        .search(
            SearchOp::new(namespace(["x"]))
                .with_query("q")
                .with_offset(1)
                .with_limit(usize::MAX),
        )
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.key, "b");
    assert!((results[0].score.unwrap() - 0.6).abs() < 1e-5);
}
