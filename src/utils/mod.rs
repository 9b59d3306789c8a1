//! Utility functions shared by the index files.
//!
//! ## Modules
//!
//! - [`encoding`] - Prefix-tagged variable-length integers and fixed-width helpers
//! - [`progress`] - Build progress spinner (no-op without the `progress` feature)
//!
//! ## Key Functions
//!
//! ```
//! use xftx::utils::{decode_num, encode_num};
//!
//! let mut buf = Vec::new();
//! encode_num(300, &mut buf);
//! assert_eq!(buf.len(), 2);
//! assert_eq!(decode_num(&buf), Some((300, 2)));
//! ```

pub mod encoding;
pub mod progress;

pub use encoding::*;
