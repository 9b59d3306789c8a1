use crate::index::tree::TermTree;
use crate::index::types::*;
use crate::utils::{encode_num, write_u32_le, write_u40_le};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Totals of one written set of index files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentSummary {
    pub tokens: u64,
    pub postings: u64,
    pub catalog_bytes: u64,
    pub posting_bytes: u64,
}

/// Streams catalog entries into the three index files.
///
/// Entries must arrive ordered by length, then by bytes; both the
/// tree flush and the segment merge produce them in that order.
pub struct SegmentWriter {
    dir: PathBuf,
    max_len: usize,
    catalog: BufWriter<File>,
    postings: BufWriter<File>,
    /// (token length, catalog offset of its first entry)
    lengths: Vec<(usize, u32)>,
    catalog_offset: u64,
    postings_offset: u64,
    last_token: Vec<u8>,
    summary: SegmentSummary,
    prefix: Vec<u8>,
}

impl SegmentWriter {
    /// Create empty index files in `dir`
    pub fn create(dir: &Path, max_len: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let catalog = BufWriter::new(File::create(dir.join(CATALOG_FILE))?);
        let postings = BufWriter::new(File::create(dir.join(POSTINGS_FILE))?);

        Ok(Self {
            dir: dir.to_path_buf(),
            max_len,
            catalog,
            postings,
            lengths: Vec::new(),
            catalog_offset: 0,
            postings_offset: 0,
            last_token: Vec::new(),
            summary: SegmentSummary::default(),
            prefix: Vec::with_capacity(5),
        })
    }

    /// Append one token with `count` postings already encoded in `payload`
    pub fn push(&mut self, token: &[u8], count: u32, payload: &[u8]) -> Result<()> {
        let len = token.len();
        if len == 0 || len > self.max_len {
            anyhow::bail!("token length {} outside 1..={}", len, self.max_len);
        }
        if (len, token) <= (self.last_token.len(), self.last_token.as_slice()) {
            anyhow::bail!(
                "catalog entries out of order: {:?} after {:?}",
                String::from_utf8_lossy(token),
                String::from_utf8_lossy(&self.last_token)
            );
        }

        if self.lengths.last().map(|&(l, _)| l) != Some(len) {
            let offset = u32::try_from(self.catalog_offset)
                .context("token catalog exceeds 4 GiB")?;
            self.lengths.push((len, offset));
        }

        // Posting store: byte length, then the (pre, pos) pairs
        let payload_len = u32::try_from(payload.len()).context("posting list exceeds 4 GiB")?;
        self.prefix.clear();
        encode_num(payload_len, &mut self.prefix);
        self.postings.write_all(&self.prefix)?;
        self.postings.write_all(payload)?;

        // Catalog: token, store offset, posting count
        self.catalog.write_all(token)?;
        write_u40_le(&mut self.catalog, self.postings_offset)?;
        write_u32_le(&mut self.catalog, count)?;

        self.postings_offset += (self.prefix.len() + payload.len()) as u64;
        self.catalog_offset += (len + CATALOG_ENTRY_TAIL) as u64;
        self.last_token.clear();
        self.last_token.extend_from_slice(token);
        self.summary.tokens += 1;
        self.summary.postings += count as u64;
        Ok(())
    }

    /// Flush the catalog and store and write the length index
    pub fn finish(mut self) -> Result<SegmentSummary> {
        self.catalog.flush()?;
        self.postings.flush()?;

        let end = u32::try_from(self.catalog_offset).context("token catalog exceeds 4 GiB")?;
        let mut lengths = BufWriter::new(File::create(self.dir.join(LENGTHS_FILE))?);
        let mut buf = Vec::new();
        encode_num(self.lengths.len() as u32, &mut buf);
        for &(len, offset) in &self.lengths {
            encode_num(len as u32, &mut buf);
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        // Sentinel closes the last bucket
        encode_num(self.max_len as u32 + 1, &mut buf);
        buf.extend_from_slice(&end.to_le_bytes());
        lengths.write_all(&buf)?;
        lengths.flush()?;

        self.summary.catalog_bytes = self.catalog_offset;
        self.summary.posting_bytes = self.postings_offset;
        debug!(
            dir = %self.dir.display(),
            tokens = self.summary.tokens,
            postings = self.summary.postings,
            "wrote index files"
        );
        Ok(self.summary)
    }
}

/// Encode postings as consecutive (pre, pos) numbers
pub fn encode_postings(postings: &[Posting], buf: &mut Vec<u8>) {
    for p in postings {
        encode_num(p.pre, buf);
        encode_num(p.pos, buf);
    }
}

/// Serialize the whole tree into `dir`
pub fn write_tree(tree: &TermTree, dir: &Path) -> Result<SegmentSummary> {
    let mut writer = SegmentWriter::create(dir, tree.max_len())?;
    let mut payload = Vec::new();

    for (_, shard) in tree.shards() {
        for (token, postings) in shard {
            payload.clear();
            encode_postings(postings, &mut payload);
            let count = u32::try_from(postings.len()).context("too many postings for one token")?;
            writer.push(token, count, &payload)?;
        }
    }

    writer.finish()
}

/// Directory of segment `id` below the index directory
pub fn segment_dir(index_path: &Path, id: SegmentId) -> PathBuf {
    index_path.join(SEGMENTS_DIR).join(format!("seg_{:04}", id))
}
