//! # xftx - Full-Text Token Index
//!
//! xftx is the disk-based full-text index of a native XML database. It turns
//! a stream of normalized tokens into three compact files and answers exact,
//! wildcard and fuzzy token lookups directly on them.
//!
//! ## Architecture
//!
//! - [`index`] - Building (term tree, segment spill, k-way merge) and reading
//! - [`query`] - Wildcard patterns, bounded edit distance, posting iteration
//! - [`utils`] - Integer encodings and progress reporting
//!
//! ## Quick Start
//!
//! ```no_run
//! use xftx::index::{build_index, IndexConfig, IndexReader, VecTokenSource};
//! use std::path::Path;
//!
//! let tokens: VecTokenSource = vec![("cat", 10, 0), ("car", 10, 1), ("cats", 20, 0)]
//!     .into_iter()
//!     .collect();
//! build_index(Path::new("/tmp/ftx"), IndexConfig::default(), tokens).unwrap();
//!
//! let reader = IndexReader::open(Path::new("/tmp/ftx")).unwrap();
//! let mut hits = reader.search_fuzzy(b"cat", 1);
//! while hits.more() {
//!     println!("{}: {:?}", hits.pre().unwrap(), hits.matches());
//! }
//! ```
//!
//! ## Memory
//!
//! Postings accumulate in a length-sharded tree. Once the configured posting
//! limit is reached the tree is written out as a segment and cleared; at the
//! end all segments are merged, so peak memory is bounded by the limit rather
//! than by the corpus.

pub mod index;
pub mod query;
pub mod utils;
