pub mod build;
pub mod merge;
pub mod reader;
pub mod stats;
pub mod tree;
pub mod types;
pub mod writer;

pub use build::{build_index, drop_index, IndexBuilder, TokenSource, VecTokenSource};
pub use reader::IndexReader;
pub use types::*;
pub use writer::SegmentWriter;
