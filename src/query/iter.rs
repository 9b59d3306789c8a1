use crate::index::types::{Pos, Posting, Pre};

/// Sorted, duplicate-free postings gathered for one query term
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingSet {
    postings: Vec<Posting>,
}

impl PostingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from postings in any order
    pub fn from_postings(mut postings: Vec<Posting>) -> Self {
        postings.sort_unstable();
        postings.dedup();
        Self { postings }
    }

    /// Merge two sets with a single sort of the combined keys
    pub fn union(a: PostingSet, b: PostingSet) -> PostingSet {
        if a.is_empty() {
            return b;
        }
        if b.is_empty() {
            return a;
        }
        let mut postings = a.postings;
        postings.extend(b.postings);
        Self::from_postings(postings)
    }

    /// Union of any number of posting lists
    pub fn union_all<I>(lists: I) -> PostingSet
    where
        I: IntoIterator<Item = Vec<Posting>>,
    {
        let postings: Vec<Posting> = lists.into_iter().flatten().collect();
        Self::from_postings(postings)
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }

    /// Iterate node by node
    pub fn into_iter_nodes(self) -> PostingIter {
        PostingIter::new(self)
    }
}

/// All matches inside one text node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    pub pre: Pre,
    pub positions: Vec<Pos>,
}

/// Walks a posting set one text node at a time.
///
/// Postings sharing a `pre` are reported once, together with every matched
/// position in ascending order. The iterator is finite and cannot be
/// rewound; issue the lookup again for a second pass.
#[derive(Debug)]
pub struct PostingIter {
    postings: Vec<Posting>,
    next: usize,
    current: Option<NodeMatch>,
}

impl PostingIter {
    pub fn new(set: PostingSet) -> Self {
        Self {
            postings: set.postings,
            next: 0,
            current: None,
        }
    }

    /// An iterator with no results
    pub fn empty() -> Self {
        Self::new(PostingSet::new())
    }

    /// Advance to the next node; `false` once exhausted
    pub fn more(&mut self) -> bool {
        let Some(first) = self.postings.get(self.next) else {
            self.current = None;
            return false;
        };

        let pre = first.pre;
        let mut positions = Vec::new();
        while let Some(p) = self.postings.get(self.next) {
            if p.pre != pre {
                break;
            }
            positions.push(p.pos);
            self.next += 1;
        }

        self.current = Some(NodeMatch { pre, positions });
        true
    }

    /// Node of the current match
    pub fn pre(&self) -> Option<Pre> {
        self.current.as_ref().map(|m| m.pre)
    }

    /// Positions of the current match, for proximity evaluation
    pub fn matches(&self) -> &[Pos] {
        self.current
            .as_ref()
            .map(|m| m.positions.as_slice())
            .unwrap_or(&[])
    }

    /// Postings not yet consumed
    pub fn remaining(&self) -> usize {
        self.postings.len() - self.next
    }
}

impl Iterator for PostingIter {
    type Item = NodeMatch;

    fn next(&mut self) -> Option<NodeMatch> {
        if self.more() {
            self.current.clone()
        } else {
            None
        }
    }
}
