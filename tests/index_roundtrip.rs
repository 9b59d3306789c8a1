//! End-to-end tests: build an index from a token stream, reopen it and
//! compare every lookup against a brute-force model of the corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use xftx::index::{
    IndexConfig, IndexMeta, IndexReader, IndexedToken, OptionsError, Posting, TokenSource,
    VecTokenSource, build_index, drop_index,
};
use xftx::query::{NodeMatch, PostingIter, PostingSet, WildcardError, WildcardPattern, bounded_distance};

const WORDS: &[&str] = &[
    "cat", "car", "cats", "cart", "scat", "act", "dog", "dig", "do", "a", "an", "and", "xml",
    "xquery", "index", "indices", "indexed", "search", "sea", "seat", "café", "cafe", "über",
    "uber", "zebra", "zz", "database", "data", "date", "dated",
];

/// Deterministic corpus: (token, pre, pos) triples in scan order
fn corpus(nodes: u32, seed: u64) -> Vec<(String, u32, u32)> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut triples = Vec::new();
    for pre in 0..nodes {
        let tokens = 1 + next() % 6;
        for pos in 0..tokens {
            let word = WORDS[next() % WORDS.len()];
            triples.push((word.to_string(), pre * 3 + 1, pos as u32));
        }
    }
    triples
}

fn source(triples: &[(String, u32, u32)]) -> VecTokenSource {
    triples
        .iter()
        .map(|(t, pre, pos)| (t.clone(), *pre, *pos))
        .collect()
}

/// token -> sorted postings
fn model(triples: &[(String, u32, u32)]) -> BTreeMap<Vec<u8>, Vec<Posting>> {
    let mut map: BTreeMap<Vec<u8>, Vec<Posting>> = BTreeMap::new();
    for (t, pre, pos) in triples {
        map.entry(t.as_bytes().to_vec())
            .or_default()
            .push(Posting::new(*pre, *pos));
    }
    for list in map.values_mut() {
        list.sort();
    }
    map
}

fn config(interval: usize, limit: usize) -> IndexConfig {
    IndexConfig {
        flush_check_interval: interval,
        flush_posting_limit: limit,
        ..Default::default()
    }
}

fn build(dir: &Path, triples: &[(String, u32, u32)], config: IndexConfig) -> IndexReader {
    build_index(dir, config, source(triples)).unwrap();
    IndexReader::open(dir).unwrap()
}

fn exact(reader: &IndexReader, token: &[u8]) -> Vec<Posting> {
    reader
        .exact_lookup(token)
        .map(|entry| {
            let mut postings = reader.postings(entry);
            postings.sort();
            postings
        })
        .unwrap_or_default()
}

fn nodes(iter: PostingIter) -> Vec<NodeMatch> {
    iter.collect()
}

#[test]
fn test_small_corpus_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let triples = vec![
        ("cat".to_string(), 10, 0),
        ("car".to_string(), 10, 1),
        ("cats".to_string(), 20, 0),
    ];
    let reader = build(dir.path(), &triples, IndexConfig::default());

    assert_eq!(exact(&reader, b"cat"), vec![Posting::new(10, 0)]);

    let fuzzy1 = reader.union_terms(&reader.fuzzy_lookup(b"cat", 1));
    assert_eq!(
        fuzzy1.as_slice(),
        &[Posting::new(10, 0), Posting::new(10, 1), Posting::new(20, 0)]
    );

    let fuzzy0 = reader.union_terms(&reader.fuzzy_lookup(b"cat", 0));
    assert_eq!(fuzzy0.as_slice(), &[Posting::new(10, 0)]);

    // Grouped per node: (10) reports both positions at once
    assert_eq!(
        nodes(reader.search_fuzzy(b"cat", 1)),
        vec![
            NodeMatch { pre: 10, positions: vec![0, 1] },
            NodeMatch { pre: 20, positions: vec![0] },
        ]
    );
}

#[test]
fn test_roundtrip_without_flush() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(200, 7);
    let reader = build(dir.path(), &triples, IndexConfig::default());
    assert_eq!(reader.meta.segments_merged, 0);

    for (token, postings) in model(&triples) {
        assert_eq!(exact(&reader, &token), postings);
    }
    assert!(exact(&reader, b"absent").is_empty());
    assert!(exact(&reader, b"").is_empty());
}

#[test]
fn test_flush_count_invariance() {
    let triples = corpus(300, 42);
    let expected = model(&triples);

    // (interval, limit): no flush, a single flush, many flushes
    let schedules = [(4096, 4_000_000), (1, triples.len() / 2), (5, 20), (2, 3)];

    let base_dir = tempfile::tempdir().unwrap();
    let base = build(base_dir.path(), &triples, IndexConfig::default());

    for (interval, limit) in schedules {
        let dir = tempfile::tempdir().unwrap();
        let reader = build(dir.path(), &triples, config(interval, limit));

        assert_eq!(reader.meta.token_count, expected.len() as u64);
        assert_eq!(reader.meta.posting_count, triples.len() as u64);
        assert!(!dir.path().join("segments").exists());

        for (token, postings) in &expected {
            assert_eq!(&exact(&reader, token), postings, "schedule {:?}", (interval, limit));
        }
        assert_eq!(reader.entries(b""), base.entries(b""));
        for pattern in ["ca.*", ".+at", "d.t.?", "x.{1,5}"] {
            assert_eq!(
                nodes(reader.search_wildcard(pattern).unwrap()),
                nodes(base.search_wildcard(pattern).unwrap())
            );
        }
        for k in 0..3 {
            assert_eq!(
                nodes(reader.search_fuzzy(b"date", k)),
                nodes(base.search_fuzzy(b"date", k))
            );
        }
    }
}

#[test]
fn test_flush_after_every_token() {
    let triples = corpus(40, 21);

    let base_dir = tempfile::tempdir().unwrap();
    let base = build(base_dir.path(), &triples, IndexConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let per_token = build(dir.path(), &triples, config(1, 1));
    assert_eq!(per_token.meta.segments_merged as usize, triples.len());

    for (token, _) in model(&triples) {
        assert_eq!(exact(&per_token, &token), exact(&base, &token));
    }
    assert_eq!(per_token.entries(b""), base.entries(b""));
    assert_eq!(
        nodes(per_token.search_wildcard(".*").unwrap()),
        nodes(base.search_wildcard(".*").unwrap())
    );
    assert_eq!(
        nodes(per_token.search_fuzzy(b"data", 2)),
        nodes(base.search_fuzzy(b"data", 2))
    );
}

#[test]
fn test_bucket_ordering_invariant() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(150, 3);
    let reader = build(dir.path(), &triples, config(3, 10));

    let entries = reader.entries(b"");
    for pair in entries.windows(2) {
        let (a, b) = (&pair[0].0, &pair[1].0);
        if a.len() == b.len() {
            assert!(a < b, "{:?} !< {:?}", a, b);
        } else {
            assert!(a.len() < b.len());
        }
    }

    let total: u64 = entries.iter().map(|(_, n)| *n as u64).sum();
    assert_eq!(total, triples.len() as u64);
}

#[test]
fn test_wildcard_superset_property() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(200, 11);
    let reader = build(dir.path(), &triples, config(7, 30));
    let expected = model(&triples);

    for pattern in ["ca.", "ca.*", ".at", ".+a.?", "da.{1,3}", "ind.x.*", r"caf.", ".*", "zz"] {
        let compiled = WildcardPattern::parse(pattern).unwrap();
        let max = compiled.max_len().unwrap_or(reader.max_token_len());

        let model_set = PostingSet::union_all(
            expected
                .iter()
                .filter(|(t, _)| t.len() <= max && compiled.matches(t))
                .map(|(_, p)| p.clone()),
        );
        let terms = reader.wildcard_lookup(pattern).unwrap();
        assert_eq!(reader.union_terms(&terms), model_set, "pattern {}", pattern);
        for term in &terms {
            assert!(compiled.matches(&term.token));
        }
    }
}

#[test]
fn test_malformed_wildcard_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let reader = build(dir.path(), &corpus(5, 1), IndexConfig::default());

    let err = reader.wildcard_lookup("ca.{4,2}").unwrap_err();
    assert_eq!(
        err.downcast_ref::<WildcardError>(),
        Some(&WildcardError::InvertedRange { min: 4, max: 2 })
    );
    assert!(reader.search_wildcard("oops\\").is_err());
}

#[test]
fn test_fuzzy_boundary_property() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(200, 5);
    let reader = build(dir.path(), &triples, config(2, 15));
    let expected = model(&triples);

    for query in ["cat", "date", "index", "a", "cafe", "xml"] {
        for k in 0..=3 {
            let found: BTreeSet<Vec<u8>> = reader
                .fuzzy_lookup(query.as_bytes(), k)
                .into_iter()
                .map(|m| m.token)
                .collect();

            for token in &found {
                assert!(token.len().abs_diff(query.len()) <= k);
            }
            let wanted: BTreeSet<Vec<u8>> = expected
                .keys()
                .filter(|t| bounded_distance(query.as_bytes(), t, k).is_some())
                .cloned()
                .collect();
            assert_eq!(found, wanted, "query {} k={}", query, k);
        }
    }
}

#[test]
fn test_fuzzy_huge_edit_bound() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(60, 13);
    let reader = build(dir.path(), &triples, IndexConfig::default());

    let found: BTreeSet<Vec<u8>> = reader
        .fuzzy_lookup(b"cat", usize::MAX)
        .into_iter()
        .map(|m| m.token)
        .collect();
    let all: BTreeSet<Vec<u8>> = model(&triples).into_keys().collect();
    assert_eq!(found, all);
}

#[test]
fn test_max_token_length() {
    let dir = tempfile::tempdir().unwrap();
    let triples = vec![
        ("short".to_string(), 1, 0),
        ("muchtoolong".to_string(), 1, 1),
        ("".to_string(), 1, 2),
    ];
    let config = IndexConfig {
        max_token_len: 6,
        ..Default::default()
    };
    let summary = build_index(dir.path(), config, source(&triples)).unwrap();
    assert_eq!(summary.skipped, 2);

    let reader = IndexReader::open(dir.path()).unwrap();
    assert_eq!(exact(&reader, b"short"), vec![Posting::new(1, 0)]);
    assert!(reader.exact_lookup(b"muchtoolong").is_none());
    assert!(reader.wildcard_lookup("much.*").unwrap().is_empty());
}

#[test]
fn test_cache_hits() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(20, 9);
    build_index(dir.path(), IndexConfig::default(), source(&triples)).unwrap();

    let reader = IndexReader::open_with_cache(dir.path(), 4).unwrap();
    let token = triples[0].0.as_bytes();
    let first = reader.exact_lookup(token);
    let second = reader.exact_lookup(token);
    assert_eq!(first, second);
    assert_eq!(reader.cache_counters(), (1, 1));

    let uncached = IndexReader::open_with_cache(dir.path(), 0).unwrap();
    assert_eq!(uncached.exact_lookup(token), first);
    assert_eq!(uncached.exact_lookup(token), first);
    assert_eq!(uncached.cache_counters(), (0, 2));
    reader.close();
}

#[test]
fn test_concurrent_readers() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(300, 13);
    let expected = Arc::new(model(&triples));
    let reader = Arc::new(build(dir.path(), &triples, config(16, 64)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reader = Arc::clone(&reader);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                for _ in 0..3 {
                    for (token, postings) in expected.iter() {
                        assert_eq!(&exact(&reader, token), postings);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Fails after a fixed number of tokens
struct FailingSource {
    left: usize,
}

impl TokenSource for FailingSource {
    fn next_token(&mut self) -> anyhow::Result<Option<IndexedToken>> {
        if self.left == 0 {
            anyhow::bail!("storage read failed");
        }
        self.left -= 1;
        Ok(Some(IndexedToken::new(b"tok".to_vec(), self.left as u32, 0)))
    }
}

#[test]
fn test_failed_build_leaves_index_unbuilt() {
    let dir = tempfile::tempdir().unwrap();
    build_index(dir.path(), IndexConfig::default(), source(&corpus(10, 2))).unwrap();
    assert!(IndexReader::open(dir.path()).is_ok());

    let result = build_index(dir.path(), config(1, 1), FailingSource { left: 5 });
    assert!(result.is_err());
    assert!(IndexMeta::read(dir.path()).is_err());
    assert!(IndexReader::open(dir.path()).is_err());

    // A fresh build recovers the directory
    build_index(dir.path(), IndexConfig::default(), source(&corpus(10, 2))).unwrap();
    assert!(IndexReader::open(dir.path()).is_ok());
}

/// Yields its tokens, then removes one spilled segment's length index
/// before the merge starts
struct SegmentLosingSource {
    tokens: Vec<(Vec<u8>, u32, u32)>,
    victim: PathBuf,
}

impl TokenSource for SegmentLosingSource {
    fn next_token(&mut self) -> anyhow::Result<Option<IndexedToken>> {
        match self.tokens.pop() {
            Some((token, pre, pos)) => Ok(Some(IndexedToken::new(token, pre, pos))),
            None => {
                std::fs::remove_file(&self.victim)?;
                Ok(None)
            }
        }
    }
}

#[test]
fn test_failed_merge_keeps_segments() {
    let dir = tempfile::tempdir().unwrap();
    let segments = dir.path().join("segments");
    let mut tokens: Vec<(Vec<u8>, u32, u32)> = (0..6u32)
        .map(|pre| (b"tok".to_vec(), pre, 0))
        .collect();
    tokens.reverse();
    let source = SegmentLosingSource {
        tokens,
        victim: segments.join("seg_0001").join("lengths.bin"),
    };

    let result = build_index(dir.path(), config(1, 2), source);
    assert!(result.is_err());
    assert!(IndexMeta::read(dir.path()).is_err());
    assert!(IndexReader::open(dir.path()).is_err());
    assert!(segments.join("seg_0000").join("lengths.bin").exists());
    assert!(segments.join("seg_0002").exists());
}

#[test]
fn test_rejected_options() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = IndexConfig::default();
    config.options.language = Some("klingon".into());

    let err = build_index(dir.path(), config, source(&corpus(3, 1))).unwrap_err();
    assert_eq!(
        err.downcast_ref::<OptionsError>(),
        Some(&OptionsError::UnknownLanguage("klingon".into()))
    );
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_drop_index() {
    let dir = tempfile::tempdir().unwrap();
    build_index(dir.path(), IndexConfig::default(), source(&corpus(5, 4))).unwrap();
    drop_index(dir.path()).unwrap();
    assert!(IndexReader::open(dir.path()).is_err());
}

#[test]
fn test_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let reader = build(dir.path(), &[], IndexConfig::default());
    assert_eq!(reader.meta.token_count, 0);
    assert!(reader.exact_lookup(b"cat").is_none());
    assert!(reader.fuzzy_lookup(b"cat", 2).is_empty());
    assert!(reader.wildcard_lookup(".*").unwrap().is_empty());
    assert!(reader.entries(b"").is_empty());
}

#[test]
fn test_entries_and_wildcard_search() {
    let dir = tempfile::tempdir().unwrap();
    let triples = corpus(120, 21);
    let reader = build(dir.path(), &triples, config(8, 40));
    let expected = model(&triples);

    let mut want: Vec<(Vec<u8>, u32)> = expected
        .iter()
        .filter(|(t, _)| t.starts_with(b"ca"))
        .map(|(t, p)| (t.clone(), p.len() as u32))
        .collect();
    want.sort_by(|a, b| (a.0.len(), &a.0).cmp(&(b.0.len(), &b.0)));
    assert_eq!(reader.entries(b"ca"), want);

    let all: usize = reader.entries(b"").iter().map(|(_, n)| *n as usize).sum();
    assert_eq!(all, triples.len());

    let model_set = PostingSet::union_all(
        expected
            .iter()
            .filter(|(t, _)| t.starts_with(b"ca"))
            .map(|(_, p)| p.clone()),
    );
    let found = nodes(reader.search_wildcard("ca.*").unwrap());
    assert_eq!(found, nodes(model_set.into_iter_nodes()));
    assert!(found.windows(2).all(|w| w[0].pre < w[1].pre));
}
