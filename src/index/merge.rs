use crate::index::reader::{LengthIndex, map_file, posting_payload};
use crate::index::types::*;
use crate::index::writer::{SegmentSummary, SegmentWriter, segment_dir};
use crate::utils::{read_u32_le, read_u40_le};
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Sequential reader over one segment's catalog
struct SegmentCursor {
    id: SegmentId,
    catalog: BufReader<File>,
    store: Option<Mmap>,
    /// (token length, entries) still to visit, in file order
    buckets: std::vec::IntoIter<(usize, u64)>,
    len: usize,
    remaining: u64,
    token: Vec<u8>,
    entry: CatalogEntry,
}

impl SegmentCursor {
    fn open(dir: &Path, id: SegmentId) -> Result<Self> {
        let lengths = LengthIndex::read(dir)
            .with_context(|| format!("Failed to read segment {}", id))?;
        let buckets: Vec<(usize, u64)> = lengths.bucket_sizes().collect();
        let catalog = BufReader::new(File::open(dir.join(CATALOG_FILE))?);
        let store = map_file(&dir.join(POSTINGS_FILE))?;

        Ok(Self {
            id,
            catalog,
            store,
            buckets: buckets.into_iter(),
            len: 0,
            remaining: 0,
            token: Vec::new(),
            entry: CatalogEntry { offset: 0, count: 0 },
        })
    }

    /// Move to the next catalog entry; `false` at the end of the segment
    fn advance(&mut self) -> Result<bool> {
        while self.remaining == 0 {
            match self.buckets.next() {
                Some((len, size)) => {
                    self.len = len;
                    self.remaining = size;
                }
                None => return Ok(false),
            }
        }

        self.token.resize(self.len, 0);
        self.catalog.read_exact(&mut self.token)?;
        let offset = read_u40_le(&mut self.catalog)?;
        let count = read_u32_le(&mut self.catalog)?;
        self.entry = CatalogEntry { offset, count };
        self.remaining -= 1;
        Ok(true)
    }

    fn payload(&self) -> Result<&[u8]> {
        let store = self.store.as_deref().unwrap_or(&[]);
        posting_payload(store, self.entry.offset).with_context(|| {
            format!(
                "Segment {} has no posting list at offset {}",
                self.id, self.entry.offset
            )
        })
    }
}

/// Merge segments `0..segments` below `index_path` into the final files.
///
/// Tokens present in several segments get one catalog entry whose postings
/// are the segments' lists concatenated in segment order. Segment files are
/// left in place; the caller removes them once the merge has succeeded.
pub fn merge_segments(index_path: &Path, segments: SegmentId, max_len: usize) -> Result<SegmentSummary> {
    info!(segments, "merging segments");

    let mut cursors = Vec::with_capacity(segments as usize);
    for id in 0..segments {
        cursors.push(SegmentCursor::open(&segment_dir(index_path, id), id)?);
    }

    // Min-heap on (length, token, cursor index); ties pop in segment order
    let mut heap = BinaryHeap::new();
    for (i, cursor) in cursors.iter_mut().enumerate() {
        if cursor.advance()? {
            heap.push(Reverse((cursor.len, cursor.token.clone(), i)));
        }
    }

    let mut writer = SegmentWriter::create(index_path, max_len)?;
    let mut tied = Vec::with_capacity(cursors.len());
    let mut payload = Vec::new();

    while let Some(Reverse((len, token, first))) = heap.pop() {
        tied.clear();
        tied.push(first);
        while let Some(Reverse((l, t, _))) = heap.peek() {
            if *l != len || *t != token {
                break;
            }
            if let Some(Reverse((_, _, i))) = heap.pop() {
                tied.push(i);
            }
        }

        payload.clear();
        let mut count: u32 = 0;
        for &i in &tied {
            let cursor = &cursors[i];
            payload.extend_from_slice(cursor.payload()?);
            count = count
                .checked_add(cursor.entry.count)
                .context("merged posting count overflows")?;
        }
        writer.push(&token, count, &payload)?;

        for &i in &tied {
            let cursor = &mut cursors[i];
            if cursor.advance()? {
                heap.push(Reverse((cursor.len, cursor.token.clone(), i)));
            }
        }
    }

    let summary = writer.finish()?;
    debug!(
        tokens = summary.tokens,
        postings = summary.postings,
        "merge complete"
    );
    Ok(summary)
}
