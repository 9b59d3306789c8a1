use crate::index::types::{Pos, Posting, Pre};
use std::collections::BTreeMap;

/// One length shard: token bytes -> postings in insertion order
pub type Shard = BTreeMap<Vec<u8>, Vec<Posting>>;

/// In-memory token accumulator, sharded by token length.
///
/// Shard `n` holds every token of exactly `n` bytes, so iterating the shards
/// in order and each shard in key order yields the length-then-lexicographic
/// order of the on-disk catalog without a global sort.
pub struct TermTree {
    shards: Vec<Shard>,
    max_len: usize,
    postings: usize,
    tokens: usize,
}

impl TermTree {
    /// Create an empty tree accepting tokens of up to `max_len` bytes
    pub fn new(max_len: usize) -> Self {
        Self {
            shards: (0..=max_len).map(|_| BTreeMap::new()).collect(),
            max_len,
            postings: 0,
            tokens: 0,
        }
    }

    /// Record one token occurrence.
    ///
    /// Returns `false` when the token is empty or too long to be indexed.
    pub fn index(&mut self, token: &[u8], pre: Pre, pos: Pos) -> bool {
        let len = token.len();
        if len == 0 || len > self.max_len {
            return false;
        }

        let shard = &mut self.shards[len];
        match shard.get_mut(token) {
            Some(list) => list.push(Posting::new(pre, pos)),
            None => {
                shard.insert(token.to_vec(), vec![Posting::new(pre, pos)]);
                self.tokens += 1;
            }
        }
        self.postings += 1;
        true
    }

    /// Shards with at least one token, ascending by length
    pub fn shards(&self) -> impl Iterator<Item = (usize, &Shard)> {
        self.shards
            .iter()
            .enumerate()
            .filter(|(_, shard)| !shard.is_empty())
    }

    /// Postings for one token
    pub fn get(&self, token: &[u8]) -> Option<&[Posting]> {
        self.shards
            .get(token.len())
            .and_then(|shard| shard.get(token))
            .map(Vec::as_slice)
    }

    /// Accumulated postings since the last reset
    pub fn posting_count(&self) -> usize {
        self.postings
    }

    /// Distinct tokens since the last reset
    pub fn token_count(&self) -> usize {
        self.tokens
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn is_empty(&self) -> bool {
        self.tokens == 0
    }

    /// Drop all shards' contents
    pub fn clear(&mut self) {
        for shard in &mut self.shards {
            shard.clear();
        }
        self.postings = 0;
        self.tokens = 0;
    }
}
