//! Generate a SQLite index of synthetic documents for benchmarks.
//!
//! Usage:
//!     cargo run --release --bin generate-bench-index -- --documents 20000
//!
//! Default output: benches/bench_index.sqlite

use anyhow::{Context, Result};
use clap::Parser;
use lexis::{tokenize_text, DocKey, Index, IndexApi};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the SQLite database to create (replaced if present)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of documents to index
    #[arg(short, long, default_value_t = 10_000)]
    documents: usize,

    /// Seed for reproducible corpora
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

/// Filler vocabulary
const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit",
    "sed", "do", "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore",
    "magna", "aliqua", "enim", "ad", "minim", "veniam", "quis", "nostrud",
    "exercitation", "ullamco", "laboris", "nisi", "aliquip", "ex", "ea", "commodo",
    "consequat", "duis", "aute", "irure", "in", "reprehenderit", "voluptate",
    "velit", "esse", "cillum", "fugiat", "nulla", "pariatur", "excepteur", "sint",
    "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui", "officia",
    "deserunt", "mollit", "anim", "id", "est", "laborum",
];

/// Rarer words the benchmark queries look for
const KEYWORDS: &[&str] = &[
    "function", "error", "return", "import", "class", "async", "await", "struct",
    "enum", "interface", "protocol", "extension", "override", "private", "public",
];

fn generate_text(rng: &mut StdRng) -> String {
    let len = rng.gen_range(20..=300);
    let mut words: Vec<&str> = (0..len)
        .map(|_| *LOREM_WORDS.choose(rng).unwrap_or(&"lorem"))
        .collect();

    // Sprinkle searchable keywords
    let keyword_count = rng.gen_range(0..=3);
    for _ in 0..keyword_count {
        let at = rng.gen_range(0..=words.len());
        words.insert(at, *KEYWORDS.choose(rng).unwrap_or(&"error"));
    }
    words.join(" ")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("benches").join("bench_index.sqlite"));

    if output.exists() {
        std::fs::remove_file(&output).context("Failed to remove existing database")?;
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    println!("Generating benchmark index...");
    println!("Output: {}", output.display());

    let index = Index::open_sqlite(&output).context("Failed to open index")?;
    index.initialize().await?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut total_terms = 0usize;

    for i in 0..args.documents {
        let terms = tokenize_text(&generate_text(&mut rng));
        total_terms += terms.len();
        index
            .store(DocKey::from(i as u64 + 1), &terms)
            .await
            .with_context(|| format!("Failed to store document {}", i + 1))?;

        if (i + 1) % 1000 == 0 {
            println!("  Indexed {}/{} documents...", i + 1, args.documents);
        }
    }

    let stats = index.stats().await?;
    println!();
    println!("Index created: {}", output.display());
    println!("  Documents: {}", args.documents);
    println!("  Terms indexed: {}", total_terms);
    println!("  Vocabulary: {}", stats.lexicon);
    println!("  Wildcard n-grams: {}", stats.wildcards);
    println!("  Size: {:.2} MB", stats.size as f64 / 1024.0 / 1024.0);
    Ok(())
}
