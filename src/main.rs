use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xftx::index::{self, IndexConfig, IndexReader, IndexedToken, TokenSource};
use xftx::query::PostingIter;
use xftx::utils::progress::BuildProgress;

#[derive(Parser)]
#[command(name = "xftx")]
#[command(about = "Build and query disk-based full-text token indexes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a token file (one `token<TAB>pre<TAB>pos` per line)
    Build {
        /// Index directory
        path: PathBuf,

        /// Token file
        #[arg(short, long)]
        input: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Suppress progress output
        #[arg(short, long)]
        silent: bool,
    },
    /// Look up one token
    Lookup {
        path: PathBuf,
        token: String,
    },
    /// Look up all tokens matching a wildcard pattern
    Wildcard {
        path: PathBuf,
        pattern: String,
    },
    /// Look up tokens within an edit distance
    Fuzzy {
        path: PathBuf,
        token: String,

        /// Maximum number of edits
        #[arg(short = 'k', long, default_value_t = 1)]
        errors: usize,
    },
    /// List indexed tokens with their posting counts
    Entries {
        path: PathBuf,

        /// Only tokens starting with this prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Show index statistics
    Stats {
        path: PathBuf,
    },
    /// Remove an index
    Drop {
        path: PathBuf,
    },
}

/// Tokens read from a tab-separated file
struct TsvTokenSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl TsvTokenSource {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl TokenSource for TsvTokenSource {
    fn next_token(&mut self) -> Result<Option<IndexedToken>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(token), Some(pre), Some(pos)) = (fields.next(), fields.next(), fields.next())
            else {
                anyhow::bail!("line {}: expected token, pre and pos", self.line_no);
            };
            let pre = pre
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid pre", self.line_no))?;
            let pos = pos
                .trim()
                .parse()
                .with_context(|| format!("line {}: invalid pos", self.line_no))?;
            return Ok(Some(IndexedToken::new(token.as_bytes(), pre, pos)));
        }
        Ok(None)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            path,
            input,
            config,
            silent,
        } => {
            let config = match config {
                Some(file) => IndexConfig::load(&file)?,
                None => IndexConfig::default(),
            };
            let source = TsvTokenSource::open(&input)?;
            let mut builder = index::IndexBuilder::new(&path, config, source)?;

            let progress = (!silent).then(|| BuildProgress::start("Scanning tokens..."));
            if let Some(progress) = progress.clone() {
                builder = builder.with_progress(move |scanned| progress.tokens(scanned));
            }
            let summary = builder.build()?;
            if let Some(progress) = progress {
                progress.finish("Index complete");
            }

            println!(
                "Indexed {} tokens ({} distinct, {} postings, {} segments merged)",
                summary.scanned, summary.index.tokens, summary.index.postings, summary.segments
            );
            if summary.skipped > 0 {
                println!("Skipped {} tokens outside the length limit", summary.skipped);
            }
        }
        Commands::Lookup { path, token } => {
            let reader = IndexReader::open(&path)?;
            print_matches(reader.search_exact(token.as_bytes()));
            reader.close();
        }
        Commands::Wildcard { path, pattern } => {
            let reader = IndexReader::open(&path)?;
            for term in reader.wildcard_lookup(&pattern)? {
                println!("# {} ({})", String::from_utf8_lossy(&term.token), term.entry.count);
            }
            print_matches(reader.search_wildcard(&pattern)?);
            reader.close();
        }
        Commands::Fuzzy { path, token, errors } => {
            let reader = IndexReader::open(&path)?;
            for term in reader.fuzzy_lookup(token.as_bytes(), errors) {
                println!("# {} ({})", String::from_utf8_lossy(&term.token), term.entry.count);
            }
            print_matches(reader.search_fuzzy(token.as_bytes(), errors));
            reader.close();
        }
        Commands::Entries { path, prefix } => {
            let reader = IndexReader::open(&path)?;
            for (token, count) in reader.entries(prefix.as_bytes()) {
                println!("{}\t{}", String::from_utf8_lossy(&token), count);
            }
            reader.close();
        }
        Commands::Stats { path } => {
            index::stats::show_stats(&path)?;
        }
        Commands::Drop { path } => {
            index::drop_index(&path)?;
            println!("Removed index at: {}", path.display());
        }
    }

    Ok(())
}

fn print_matches(mut hits: PostingIter) {
    let mut nodes = 0;
    while hits.more() {
        let positions: Vec<String> = hits.matches().iter().map(|p| p.to_string()).collect();
        if let Some(pre) = hits.pre() {
            println!("{}\t{}", pre, positions.join(","));
        }
        nodes += 1;
    }
    println!("{} matching nodes", nodes);
}
