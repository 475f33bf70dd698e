use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchcore::config::{RankConfig, TrainerConfig, DAMPING, DEFAULT_TARGET_CLASS, RANK_MAX_ITERATIONS, SVM_C, WINDOW_SIZE};
use searchcore::persist::{load_all, load_judgments, save_all, IndexPaths};
use searchcore::stems::{EnglishStemmer, StemMap};
use searchcore::{authority_scores, train, IndexBuilder, SearchSnapshot, SearchError, Weights};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

mod source;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, rank and train a link-aware search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory, then rank it
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Tokens per co-occurrence window
        #[arg(long, default_value_t = WINDOW_SIZE)]
        window_size: usize,
        /// Leave authority scores at zero
        #[arg(long, default_value_t = false)]
        skip_rank: bool,
    },
    /// Recompute authority scores for an existing index
    Rank {
        #[arg(long)]
        index: String,
        /// Probability of jumping to a random document
        #[arg(long, default_value_t = DAMPING)]
        damping: f64,
        #[arg(long, default_value_t = RANK_MAX_ITERATIONS)]
        max_iterations: usize,
    },
    /// Rebuild the stem map from the index vocabulary
    Stems {
        #[arg(long)]
        index: String,
    },
    /// Fit ranking weights from graded relevance judgments (query, doc_id, grade)
    Train {
        #[arg(long)]
        index: String,
        #[arg(long)]
        judgments: String,
        /// Grade whose coefficients become the weights
        #[arg(long, default_value_t = DEFAULT_TARGET_CLASS)]
        target_class: i32,
        #[arg(long, default_value_t = SVM_C)]
        c: f64,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, window_size, skip_rank } => build_index(&input, &output, window_size, skip_rank),
        Commands::Rank { index, damping, max_iterations } => {
            let config = RankConfig { damping, max_iterations, ..RankConfig::default() };
            update_index(&index, |snapshot| rank(snapshot, &config))
        }
        Commands::Stems { index } => update_index(&index, |snapshot| {
            snapshot.stems = StemMap::build(snapshot.corpus.vocabulary(), &EnglishStemmer);
            tracing::info!(stems = snapshot.stems.len(), "stem map rebuilt");
            Ok(())
        }),
        Commands::Train { index, judgments, target_class, c } => {
            let config = TrainerConfig { target_class, c, ..TrainerConfig::default() };
            let judgments = load_judgments(Path::new(&judgments))?;
            update_index(&index, |snapshot| {
                snapshot.weights = train(&judgments, &snapshot.docs, &snapshot.corpus, &snapshot.anchors, &config)?;
                tracing::info!(weights = ?snapshot.weights.0, "ranking weights trained");
                Ok(())
            })
        }
    }
}

fn build_index(input: &str, output: &str, window_size: usize, skip_rank: bool) -> Result<()> {
    let docs = source::read_documents(Path::new(input))?;
    tracing::info!(documents = docs.len(), input, "read source documents");

    let out = IndexBuilder::default().with_window_size(window_size).build(docs);
    let report = out.report.clone();
    let mut snapshot = SearchSnapshot::from_build(out, Weights::default());
    if !skip_rank {
        rank(&mut snapshot, &RankConfig::default())?;
    }

    save_all(&IndexPaths::new(output), &snapshot)?;
    tracing::info!(output, report = %serde_json::to_string(&report)?, "index written");
    Ok(())
}

fn rank(snapshot: &mut SearchSnapshot, config: &RankConfig) -> Result<(), SearchError> {
    let scores = authority_scores(&snapshot.docs.link_graph(), config)?;
    snapshot.docs.assign_authority(&scores);
    Ok(())
}

/// Loads the index at `dir`, applies `job`, and writes every file back.
fn update_index<F>(dir: &str, job: F) -> Result<()>
where
    F: FnOnce(&mut SearchSnapshot) -> Result<(), SearchError>,
{
    let paths = IndexPaths::new(dir);
    let mut snapshot = load_all(&paths).with_context(|| format!("loading index from {dir}"))?;
    job(&mut snapshot)?;
    save_all(&paths, &snapshot)?;
    tracing::info!(index = dir, "index updated");
    Ok(())
}
