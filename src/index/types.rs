use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Preorder address of a text node
pub type Pre = u32;

/// Ordinal position of a token within its text node
pub type Pos = u32;

/// Segment identifier
pub type SegmentId = u32;

/// Length index file name
pub const LENGTHS_FILE: &str = "lengths.bin";
/// Token catalog file name
pub const CATALOG_FILE: &str = "tokens.dict";
/// Posting store file name
pub const POSTINGS_FILE: &str = "tokens.postings";
/// Metadata file name; its presence marks a built index
pub const META_FILE: &str = "meta.json";
/// Directory holding spilled segments during a build
pub const SEGMENTS_DIR: &str = "segments";

/// Bytes following the token in a catalog entry (5-byte offset + 4-byte count)
pub const CATALOG_ENTRY_TAIL: usize = 9;

/// Hard upper bound for `max_token_len`
pub const MAX_TOKEN_LEN_LIMIT: usize = 255;

/// Languages the tokenizer collaborator can handle
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "da", "de", "el", "en", "es", "fi", "fr", "hu", "it", "ja", "nl", "no", "pt", "ro", "ru",
    "sv", "tr",
];

/// Languages with a stemmer
pub const STEMMING_LANGUAGES: &[&str] = &[
    "da", "de", "en", "es", "fi", "fr", "hu", "it", "nl", "no", "pt", "ro", "ru", "sv", "tr",
];

/// A single token occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Posting {
    pub pre: Pre,
    pub pos: Pos,
}

impl Posting {
    pub fn new(pre: Pre, pos: Pos) -> Self {
        Self { pre, pos }
    }
}

/// A normalized token handed over by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedToken {
    pub token: Vec<u8>,
    pub pre: Pre,
    pub pos: Pos,
}

impl IndexedToken {
    pub fn new(token: impl Into<Vec<u8>>, pre: Pre, pos: Pos) -> Self {
        Self {
            token: token.into(),
            pre,
            pos,
        }
    }
}

/// Catalog pointer into the posting store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Offset of the length-prefixed posting list
    pub offset: u64,
    /// Number of postings stored there
    pub count: u32,
}

/// A catalog token that satisfied a wildcard or fuzzy lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    pub token: Vec<u8>,
    pub entry: CatalogEntry,
}

/// Tokenizer options the index was built with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FtOptions {
    pub case_sensitive: bool,
    pub diacritics: bool,
    pub stemming: bool,
    /// ISO 639-1 language code
    pub language: Option<String>,
    pub stop_words: Option<String>,
}

/// Rejected tokenizer option combinations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("language '{0}' is not supported")]
    UnknownLanguage(String),

    #[error("stemming requires a language")]
    StemmingWithoutLanguage,

    #[error("no stemmer available for language '{0}'")]
    NoStemmer(String),

    #[error("tokenizer does not support the requested options: {0}")]
    Unsupported(String),
}

impl FtOptions {
    /// Check the language/stemmer combination
    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(lang) = &self.language {
            let lang = lang.to_lowercase();
            if !SUPPORTED_LANGUAGES.contains(&lang.as_str()) {
                return Err(OptionsError::UnknownLanguage(lang));
            }
            if self.stemming && !STEMMING_LANGUAGES.contains(&lang.as_str()) {
                return Err(OptionsError::NoStemmer(lang));
            }
        } else if self.stemming {
            return Err(OptionsError::StemmingWithoutLanguage);
        }
        Ok(())
    }
}

/// Configuration for the indexer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Tokens longer than this are never indexed
    pub max_token_len: usize,
    /// Number of tokens between two memory checks
    pub flush_check_interval: usize,
    /// Accumulated postings that trigger a segment spill
    pub flush_posting_limit: usize,
    /// Entries kept in the exact-lookup cache
    pub cache_size: usize,
    pub options: FtOptions,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_token_len: 96,
            flush_check_interval: 4096,
            flush_posting_limit: 4_000_000,
            cache_size: 10_000,
            options: FtOptions::default(),
        }
    }
}

impl IndexConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: IndexConfig =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Check numeric limits
    pub fn validate(&self) -> Result<()> {
        if self.max_token_len == 0 || self.max_token_len > MAX_TOKEN_LEN_LIMIT {
            anyhow::bail!(
                "max_token_len must be between 1 and {}, got {}",
                MAX_TOKEN_LEN_LIMIT,
                self.max_token_len
            );
        }
        if self.flush_check_interval == 0 {
            anyhow::bail!("flush_check_interval must be positive");
        }
        if self.flush_posting_limit == 0 {
            anyhow::bail!("flush_posting_limit must be positive");
        }
        Ok(())
    }
}

/// Index metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub built: bool,
    pub max_token_len: usize,
    pub token_count: u64,
    pub posting_count: u64,
    /// Number of spilled segments merged into the final files (0 = direct write)
    pub segments_merged: u32,
    pub options: FtOptions,
    pub created_at: u64,
}

impl IndexMeta {
    pub const VERSION: u32 = 1;

    /// Read meta.json from an index directory
    pub fn read(index_path: &Path) -> Result<Self> {
        let meta_path = index_path.join(META_FILE);
        let meta_file = fs::File::open(&meta_path)
            .with_context(|| format!("No built index at {}", index_path.display()))?;
        let meta: IndexMeta = serde_json::from_reader(meta_file)?;
        Ok(meta)
    }

    /// Write meta.json into an index directory
    pub fn write(&self, index_path: &Path) -> Result<()> {
        let meta_path = index_path.join(META_FILE);
        let file = fs::File::create(&meta_path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
