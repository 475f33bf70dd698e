use anyhow::Result;
use clap::{Parser, ValueEnum};
use searcher::{SearchParams, Searcher};
use searchcore::config::MAX_EDIT_DISTANCE;
use searchcore::RetrievalMode;
use std::io::{BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Bm25,
    Probabilistic,
    And,
    Learned,
}

impl From<Mode> for RetrievalMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Bm25 => RetrievalMode::Bm25,
            Mode::Probabilistic => RetrievalMode::Bm25Probabilistic,
            Mode::And => RetrievalMode::Conjunctive,
            Mode::Learned => RetrievalMode::LearnedLinear,
        }
    }
}

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Ranking model
    #[arg(long, value_enum, default_value_t = Mode::Bm25)]
    mode: Mode,
    /// Number of results
    #[arg(long, default_value_t = 10)]
    k: usize,
    /// Largest edit distance accepted when correcting misspelled words
    #[arg(long, default_value_t = MAX_EDIT_DISTANCE)]
    max_edits: usize,
    /// Query text; when absent, queries are read one per line from stdin
    query: Vec<String>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Args::parse();
    let searcher = Searcher::open(&args.index)?.with_max_edits(args.max_edits);

    let run = |q: String| -> Result<String> {
        let response = searcher.search(&SearchParams { q, k: args.k, mode: args.mode.into() });
        Ok(serde_json::to_string(&response)?)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if !args.query.is_empty() {
        writeln!(out, "{}", run(args.query.join(" "))?)?;
        return Ok(());
    }
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(out, "{}", run(line)?)?;
    }
    Ok(())
}
