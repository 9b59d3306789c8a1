use crate::index::types::*;
use crate::query::fuzzy::within_distance;
use crate::query::iter::{PostingIter, PostingSet};
use crate::query::wildcard::WildcardPattern;
use crate::utils::{decode_num, read_num, read_u32_le, u40_from_slice};
use anyhow::{Context, Result};
use lru::LruCache;
use memmap2::Mmap;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::{debug, info};

/// Decoded length index of one set of index files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthIndex {
    /// (token length, catalog offset), ascending
    pub buckets: Vec<(usize, u32)>,
    /// Catalog size, stored in the sentinel entry
    pub end: u32,
    /// Length stored in the sentinel, one past the longest token
    pub sentinel_len: usize,
}

impl LengthIndex {
    /// Read `lengths.bin` from `dir`
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(LENGTHS_FILE);
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mut cursor = bytes.as_slice();

        let count = read_num(&mut cursor)? as usize;
        let mut buckets = Vec::with_capacity(count);
        for _ in 0..count {
            let len = read_num(&mut cursor)? as usize;
            let offset = read_u32_le(&mut cursor)?;
            buckets.push((len, offset));
        }
        let sentinel_len = read_num(&mut cursor)? as usize;
        let end = read_u32_le(&mut cursor)?;

        Ok(Self {
            buckets,
            end,
            sentinel_len,
        })
    }

    /// Number of catalog entries in each bucket
    pub fn bucket_sizes(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.buckets.iter().enumerate().map(|(i, &(len, offset))| {
            let next = self.buckets.get(i + 1).map_or(self.end, |&(_, o)| o);
            let size = (next - offset) as u64 / (len + CATALOG_ENTRY_TAIL) as u64;
            (len, size)
        })
    }

    /// Expand into an array where `starts[len]..starts[len + 1]` is the
    /// catalog range of bucket `len`; unused lengths get empty ranges
    fn starts(&self, max_len: usize) -> Vec<u64> {
        let mut starts = vec![self.end as u64; max_len + 2];
        let mut next = self.buckets.iter().rev().peekable();
        for len in (0..=max_len).rev() {
            starts[len] = match next.peek() {
                Some(&&(l, offset)) if l == len => {
                    next.next();
                    offset as u64
                }
                _ => starts[len + 1],
            };
        }
        starts
    }
}

/// Map a file, treating an empty file as an empty region
pub(crate) fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    let map = unsafe { Mmap::map(&file)? };
    Ok(Some(map))
}

/// Payload bytes of the posting list stored at `offset`
pub(crate) fn posting_payload(store: &[u8], offset: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let (len, consumed) = decode_num(store.get(start..)?)?;
    let begin = start + consumed;
    store.get(begin..begin + len as usize)
}

/// Decode `count` (pre, pos) pairs
pub(crate) fn decode_postings(payload: &[u8], count: u32) -> Vec<Posting> {
    let mut postings = Vec::with_capacity(count as usize);
    let mut at = 0;
    for _ in 0..count {
        let Some((pre, n)) = payload.get(at..).and_then(decode_num) else {
            break;
        };
        at += n;
        let Some((pos, n)) = payload.get(at..).and_then(decode_num) else {
            break;
        };
        at += n;
        postings.push(Posting::new(pre, pos));
    }
    postings
}

/// Reader over one built index.
///
/// Opening loads the length index into memory and maps the catalog and the
/// posting store; both mappings are read-only, so lookups from several
/// threads only meet at the cache lock.
pub struct IndexReader {
    index_path: PathBuf,
    pub meta: IndexMeta,
    max_len: usize,
    starts: Vec<u64>,
    catalog: Option<Mmap>,
    postings: Option<Mmap>,
    cache: Option<Mutex<LruCache<Vec<u8>, CatalogEntry>>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl IndexReader {
    /// Open a built index
    pub fn open(index_path: &Path) -> Result<Self> {
        Self::open_with_cache(index_path, IndexConfig::default().cache_size)
    }

    /// Open a built index with an explicit cache capacity (0 disables caching)
    pub fn open_with_cache(index_path: &Path, cache_size: usize) -> Result<Self> {
        let meta = IndexMeta::read(index_path)?;
        if !meta.built {
            anyhow::bail!("Index at {} is not built", index_path.display());
        }

        let lengths = LengthIndex::read(index_path)?;
        let max_len = meta.max_token_len;
        if lengths.sentinel_len != max_len + 1 {
            anyhow::bail!(
                "Length index sentinel {} does not match max token length {}",
                lengths.sentinel_len,
                max_len
            );
        }
        let starts = lengths.starts(max_len);

        let catalog = map_file(&index_path.join(CATALOG_FILE))?;
        let postings = map_file(&index_path.join(POSTINGS_FILE))?;

        let cache = NonZeroUsize::new(cache_size).map(|n| Mutex::new(LruCache::new(n)));

        info!(
            path = %index_path.display(),
            tokens = meta.token_count,
            postings = meta.posting_count,
            "opened full-text index"
        );

        Ok(Self {
            index_path: index_path.to_path_buf(),
            meta,
            max_len,
            starts,
            catalog,
            postings,
            cache,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        })
    }

    /// Release the index; the cache is dropped with it
    pub fn close(self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }
        debug!(path = %self.index_path.display(), "closed full-text index");
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn max_token_len(&self) -> usize {
        self.max_len
    }

    fn catalog(&self) -> &[u8] {
        self.catalog.as_deref().unwrap_or(&[])
    }

    fn store(&self) -> &[u8] {
        self.postings.as_deref().unwrap_or(&[])
    }

    /// Catalog bytes of the bucket holding `len`-byte tokens
    fn bucket(&self, len: usize) -> Bucket<'_> {
        if len == 0 || len > self.max_len {
            return Bucket { data: &[], len };
        }
        let start = self.starts[len] as usize;
        let end = self.starts[len + 1] as usize;
        Bucket {
            data: self.catalog().get(start..end).unwrap_or(&[]),
            len,
        }
    }

    /// Catalog entry of `token`, if indexed
    pub fn exact_lookup(&self, token: &[u8]) -> Option<CatalogEntry> {
        if token.is_empty() || token.len() > self.max_len {
            return None;
        }

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(token) {
                self.cache_hits.fetch_add(1, AtomicOrdering::Relaxed);
                return Some(*entry);
            }
        }
        self.cache_misses.fetch_add(1, AtomicOrdering::Relaxed);

        let bucket = self.bucket(token.len());
        let idx = bucket.find(token).ok()?;
        let entry = bucket.entry(idx);

        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .put(token.to_vec(), entry);
        }
        Some(entry)
    }

    /// Tokens matching a wildcard pattern.
    ///
    /// The pattern is compiled before the catalog is touched, so a malformed
    /// pattern fails without any index access.
    pub fn wildcard_lookup(&self, pattern: &str) -> Result<Vec<TermMatch>> {
        let pattern = WildcardPattern::parse(pattern)?;
        let prefix = pattern.prefix();

        let min_len = pattern.min_len().max(prefix.len()).max(1);
        let max_len = pattern.max_len().unwrap_or(self.max_len).min(self.max_len);
        if min_len > max_len {
            return Ok(Vec::new());
        }

        let per_bucket: Vec<Vec<TermMatch>> = (min_len..=max_len)
            .into_par_iter()
            .map(|len| {
                let bucket = self.bucket(len);
                let start = match bucket.find(prefix) {
                    Ok(i) | Err(i) => i,
                };
                (start..bucket.count())
                    .map(|i| bucket.token(i))
                    .take_while(|token| token.starts_with(prefix))
                    .enumerate()
                    .filter(|(_, token)| pattern.matches(token))
                    .map(|(i, token)| TermMatch {
                        token: token.to_vec(),
                        entry: bucket.entry(start + i),
                    })
                    .collect()
            })
            .collect();

        let matches: Vec<TermMatch> = per_bucket.into_iter().flatten().collect();
        debug!(candidates = matches.len(), "wildcard lookup");
        Ok(matches)
    }

    /// Tokens within `max_errors` byte edits of `token`
    pub fn fuzzy_lookup(&self, token: &[u8], max_errors: usize) -> Vec<TermMatch> {
        if token.is_empty() {
            return Vec::new();
        }
        if max_errors == 0 {
            return self
                .exact_lookup(token)
                .map(|entry| TermMatch {
                    token: token.to_vec(),
                    entry,
                })
                .into_iter()
                .collect();
        }

        // No indexed token is further away than the longest token length
        let max_errors = max_errors.min(self.max_len);
        let min_len = token.len().saturating_sub(max_errors).max(1);
        let max_len = token.len().saturating_add(max_errors).min(self.max_len);
        if min_len > max_len {
            return Vec::new();
        }

        let per_bucket: Vec<Vec<TermMatch>> = (min_len..=max_len)
            .into_par_iter()
            .map(|len| {
                let bucket = self.bucket(len);
                (0..bucket.count())
                    .filter(|&i| within_distance(token, bucket.token(i), max_errors))
                    .map(|i| TermMatch {
                        token: bucket.token(i).to_vec(),
                        entry: bucket.entry(i),
                    })
                    .collect()
            })
            .collect();

        let matches: Vec<TermMatch> = per_bucket.into_iter().flatten().collect();
        debug!(candidates = matches.len(), max_errors, "fuzzy lookup");
        matches
    }

    /// Decode the postings a catalog entry points to
    pub fn postings(&self, entry: CatalogEntry) -> Vec<Posting> {
        posting_payload(self.store(), entry.offset)
            .map(|payload| decode_postings(payload, entry.count))
            .unwrap_or_default()
    }

    /// Matches of a single token
    pub fn search_exact(&self, token: &[u8]) -> PostingIter {
        match self.exact_lookup(token) {
            Some(entry) => PostingSet::from_postings(self.postings(entry)).into_iter_nodes(),
            None => PostingIter::empty(),
        }
    }

    /// Matches of every token satisfying a wildcard pattern
    pub fn search_wildcard(&self, pattern: &str) -> Result<PostingIter> {
        let terms = self.wildcard_lookup(pattern)?;
        Ok(self.union_terms(&terms).into_iter_nodes())
    }

    /// Matches of every token within `max_errors` edits
    pub fn search_fuzzy(&self, token: &[u8], max_errors: usize) -> PostingIter {
        let terms = self.fuzzy_lookup(token, max_errors);
        self.union_terms(&terms).into_iter_nodes()
    }

    /// Postings of several catalog matches as one set
    pub fn union_terms(&self, terms: &[TermMatch]) -> PostingSet {
        PostingSet::union_all(terms.iter().map(|t| self.postings(t.entry)))
    }

    /// Indexed tokens starting with `prefix` and their posting counts,
    /// ordered by length, then bytes
    pub fn entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, u32)> {
        let mut entries = Vec::new();
        for len in prefix.len().max(1)..=self.max_len {
            let bucket = self.bucket(len);
            let start = match bucket.find(prefix) {
                Ok(i) | Err(i) => i,
            };
            for i in start..bucket.count() {
                let token = bucket.token(i);
                if !token.starts_with(prefix) {
                    break;
                }
                entries.push((token.to_vec(), bucket.entry(i).count));
            }
        }
        entries
    }

    /// Distinct token count per length bucket
    pub fn bucket_sizes(&self) -> Vec<(usize, u64)> {
        (1..=self.max_len)
            .map(|len| (len, self.bucket(len).count() as u64))
            .filter(|&(_, n)| n > 0)
            .collect()
    }

    /// Cache (hits, misses) since open
    pub fn cache_counters(&self) -> (u64, u64) {
        (
            self.cache_hits.load(AtomicOrdering::Relaxed),
            self.cache_misses.load(AtomicOrdering::Relaxed),
        )
    }
}

/// One length bucket of the catalog
struct Bucket<'a> {
    data: &'a [u8],
    len: usize,
}

impl<'a> Bucket<'a> {
    #[inline]
    fn stride(&self) -> usize {
        self.len + CATALOG_ENTRY_TAIL
    }

    fn count(&self) -> usize {
        self.data.len() / self.stride()
    }

    fn token(&self, i: usize) -> &'a [u8] {
        let at = i * self.stride();
        &self.data[at..at + self.len]
    }

    fn entry(&self, i: usize) -> CatalogEntry {
        let at = i * self.stride() + self.len;
        let tail = &self.data[at..at + CATALOG_ENTRY_TAIL];
        CatalogEntry {
            offset: u40_from_slice(&tail[..5]),
            count: u32::from_le_bytes([tail[5], tail[6], tail[7], tail[8]]),
        }
    }

    /// Binary search; `Err` holds the insertion point
    fn find(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.token(mid).cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }
}
