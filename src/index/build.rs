use crate::index::merge::merge_segments;
use crate::index::tree::TermTree;
use crate::index::types::*;
use crate::index::writer::{SegmentSummary, segment_dir, write_tree};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Stream of normalized tokens produced by the tokenizer.
///
/// Tokens arrive already case-folded, stemmed and stop-word filtered
/// according to the options the index is built with.
pub trait TokenSource {
    /// Refuse option combinations the tokenizer cannot honour
    fn supports(&self, _options: &FtOptions) -> Result<(), OptionsError> {
        Ok(())
    }

    /// Next token, or `None` once the document has been scanned
    fn next_token(&mut self) -> Result<Option<IndexedToken>>;
}

/// Token source over an in-memory list
pub struct VecTokenSource {
    tokens: std::vec::IntoIter<IndexedToken>,
}

impl VecTokenSource {
    pub fn new(tokens: Vec<IndexedToken>) -> Self {
        Self {
            tokens: tokens.into_iter(),
        }
    }
}

impl<T: AsRef<[u8]>> FromIterator<(T, Pre, Pos)> for VecTokenSource {
    fn from_iter<I: IntoIterator<Item = (T, Pre, Pos)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(t, pre, pos)| IndexedToken::new(t.as_ref(), pre, pos))
                .collect(),
        )
    }
}

impl TokenSource for VecTokenSource {
    fn next_token(&mut self) -> Result<Option<IndexedToken>> {
        Ok(self.tokens.next())
    }
}

/// Decides when accumulated postings are spilled to a segment.
///
/// The check runs once every `interval` tokens, keeping the per-token cost
/// to a counter increment.
#[derive(Debug, Clone)]
pub struct FlushController {
    interval: usize,
    limit: usize,
    since_check: usize,
}

impl FlushController {
    pub fn new(interval: usize, limit: usize) -> Self {
        Self {
            interval: interval.max(1),
            limit: limit.max(1),
            since_check: 0,
        }
    }

    /// Called after every scanned token with the current posting count
    pub fn should_flush(&mut self, postings: usize) -> bool {
        self.since_check += 1;
        if self.since_check < self.interval {
            return false;
        }
        self.since_check = 0;
        postings >= self.limit
    }
}

/// Outcome of a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub scanned: u64,
    pub skipped: u64,
    pub segments: SegmentId,
    pub index: SegmentSummary,
}

/// Builds the full-text index of one token stream
pub struct IndexBuilder<S: TokenSource> {
    index_path: PathBuf,
    config: IndexConfig,
    source: S,
    tree: TermTree,
    flush: FlushController,
    segments: SegmentId,
    progress: Option<Box<dyn FnMut(u64)>>,
}

impl<S: TokenSource> IndexBuilder<S> {
    /// Validate the configuration against the token source.
    ///
    /// Nothing is written to disk until [`IndexBuilder::build`] runs.
    pub fn new(index_path: &Path, config: IndexConfig, source: S) -> Result<Self> {
        config.validate()?;
        config.options.validate()?;
        source.supports(&config.options)?;

        let tree = TermTree::new(config.max_token_len);
        let flush = FlushController::new(config.flush_check_interval, config.flush_posting_limit);

        Ok(Self {
            index_path: index_path.to_path_buf(),
            config,
            source,
            tree,
            flush,
            segments: 0,
            progress: None,
        })
    }

    /// Report the number of scanned tokens at every flush check
    pub fn with_progress(mut self, callback: impl FnMut(u64) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Scan the token source and write the final index.
    ///
    /// Any failure leaves the directory without `meta.json`, so the index
    /// counts as not built and must be rebuilt.
    pub fn build(mut self) -> Result<BuildSummary> {
        info!(path = %self.index_path.display(), "building full-text index");
        drop_index(&self.index_path)?;
        fs::create_dir_all(&self.index_path)
            .with_context(|| format!("Failed to create {}", self.index_path.display()))?;

        let mut scanned: u64 = 0;
        let mut skipped: u64 = 0;
        let check_every = self.config.flush_check_interval as u64;

        while let Some(t) = self.source.next_token()? {
            scanned += 1;
            if !self.tree.index(&t.token, t.pre, t.pos) {
                skipped += 1;
                continue;
            }
            if self.flush.should_flush(self.tree.posting_count()) {
                self.spill()?;
            }
            if scanned % check_every == 0 {
                if let Some(progress) = self.progress.as_mut() {
                    progress(scanned);
                }
            }
        }

        let index = if self.segments == 0 {
            write_tree(&self.tree, &self.index_path)?
        } else {
            if !self.tree.is_empty() {
                self.spill()?;
            }
            let summary = merge_segments(&self.index_path, self.segments, self.config.max_token_len)?;
            fs::remove_dir_all(self.index_path.join(SEGMENTS_DIR))
                .context("Failed to remove merged segments")?;
            summary
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let meta = IndexMeta {
            version: IndexMeta::VERSION,
            built: true,
            max_token_len: self.config.max_token_len,
            token_count: index.tokens,
            posting_count: index.postings,
            segments_merged: self.segments,
            options: self.config.options.clone(),
            created_at: now,
        };
        meta.write(&self.index_path)?;

        if skipped > 0 {
            warn!(skipped, "tokens outside the indexable length range were ignored");
        }
        info!(
            tokens = index.tokens,
            postings = index.postings,
            segments = self.segments,
            "full-text index built"
        );

        Ok(BuildSummary {
            scanned,
            skipped,
            segments: self.segments,
            index,
        })
    }

    /// Write the current tree as the next segment and reset it
    fn spill(&mut self) -> Result<()> {
        let id = self.segments;
        let summary = write_tree(&self.tree, &segment_dir(&self.index_path, id))
            .with_context(|| format!("Failed to write segment {}", id))?;
        debug!(
            segment = id,
            tokens = summary.tokens,
            postings = summary.postings,
            "flushed segment"
        );
        self.segments += 1;
        self.tree.clear();
        Ok(())
    }
}

/// Build an index from a token source in one call
pub fn build_index<S: TokenSource>(index_path: &Path, config: IndexConfig, source: S) -> Result<BuildSummary> {
    IndexBuilder::new(index_path, config, source)?.build()
}

/// Remove every index file from `index_path`, leaving unrelated files alone
pub fn drop_index(index_path: &Path) -> Result<()> {
    if !index_path.exists() {
        return Ok(());
    }

    // meta.json goes first so a half-deleted index is never addressable
    for name in [META_FILE, LENGTHS_FILE, CATALOG_FILE, POSTINGS_FILE] {
        let path = index_path.join(name);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    let segments = index_path.join(SEGMENTS_DIR);
    if segments.exists() {
        fs::remove_dir_all(&segments)
            .with_context(|| format!("Failed to remove {}", segments.display()))?;
    }
    Ok(())
}
