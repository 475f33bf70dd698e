use anyhow::{Context, Result};
use searchcore::SourceDocument;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every `.json` / `.jsonl` file under `input`, or `input` itself when it is a file.
pub fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn extension(p: &Path) -> Option<&str> {
    p.extension().and_then(|s| s.to_str())
}

pub fn read_documents(input: &Path) -> Result<Vec<SourceDocument>> {
    let mut docs = Vec::new();
    for file in input_files(input) {
        if extension(&file) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<SourceDocument>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SourceDocument>(&line) {
            Ok(doc) => docs.push(doc),
            Err(err) => tracing::warn!(file = %file.display(), line = n + 1, error = %err, "skipping unreadable document"),
        }
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<SourceDocument>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: serde_json::Value =
        serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => Vec::new(),
    };
    for v in values {
        match serde_json::from_value::<SourceDocument>(v) {
            Ok(doc) => docs.push(doc),
            Err(err) => tracing::warn!(file = %file.display(), error = %err, "skipping unreadable document"),
        }
    }
    Ok(())
}
