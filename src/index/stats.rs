use crate::index::reader::IndexReader;
use crate::index::types::{CATALOG_FILE, LENGTHS_FILE, POSTINGS_FILE};
use anyhow::Result;
use std::path::Path;

/// Summary of an opened index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub tokens: u64,
    pub postings: u64,
    pub max_token_len: usize,
    pub segments_merged: u32,
    /// (token length, distinct tokens) for every non-empty bucket
    pub buckets: Vec<(usize, u64)>,
    pub disk_bytes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl IndexStats {
    /// Collect statistics from a reader
    pub fn collect(reader: &IndexReader) -> Result<Self> {
        let (cache_hits, cache_misses) = reader.cache_counters();
        let mut disk_bytes = 0;
        for name in [LENGTHS_FILE, CATALOG_FILE, POSTINGS_FILE] {
            disk_bytes += std::fs::metadata(reader.index_path().join(name))?.len();
        }

        Ok(Self {
            tokens: reader.meta.token_count,
            postings: reader.meta.posting_count,
            max_token_len: reader.max_token_len(),
            segments_merged: reader.meta.segments_merged,
            buckets: reader.bucket_sizes(),
            disk_bytes,
            cache_hits,
            cache_misses,
        })
    }
}

/// Display index statistics
pub fn show_stats(index_path: &Path) -> Result<()> {
    let reader = IndexReader::open(index_path)?;
    let stats = IndexStats::collect(&reader)?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Index location:   {}", index_path.display());
    println!("Index version:    {}", reader.meta.version);
    println!("Distinct tokens:  {}", stats.tokens);
    println!("Postings:         {}", stats.postings);
    println!("Max token length: {}", stats.max_token_len);
    println!("Merged segments:  {}", stats.segments_merged);
    println!("Index size:       {}", format_size(stats.disk_bytes));

    let opts = &reader.meta.options;
    println!();
    println!("Tokenizer options:");
    println!("  case sensitive  {}", opts.case_sensitive);
    println!("  diacritics      {}", opts.diacritics);
    println!("  stemming        {}", opts.stemming);
    println!("  language        {}", opts.language.as_deref().unwrap_or("-"));

    println!();
    println!("Tokens by length:");
    for (len, count) in stats.buckets.iter().take(20) {
        println!("  {:4} {}", len, count);
    }
    if stats.buckets.len() > 20 {
        println!("  ... and {} more lengths", stats.buckets.len() - 20);
    }

    println!();
    println!("Created:          {}", format_timestamp(reader.meta.created_at));

    reader.close();
    Ok(())
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
