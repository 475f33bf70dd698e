//! Index exchange files.
//!
//! Every index part has a tab-separated form that other processes read, plus
//! a bincode snapshot of the whole bundle for fast startup. Readers accept
//! trailing empty fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::SearchError;
use crate::index::{DocTable, DocumentId, DocumentRecord, InvertedIndex, Posting, PostingList};
use crate::retrieval::{Weights, FEATURE_COUNT};
use crate::snapshot::SearchSnapshot;
use crate::stems::StemMap;
use crate::train::Judgment;
use crate::window::{WindowIndex, WindowPosting};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn now(num_docs: u32) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs, created_at, version: FORMAT_VERSION }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn corpus(&self) -> PathBuf { self.root.join("corpus_index.tsv") }
    pub fn anchors(&self) -> PathBuf { self.root.join("anchor_index.tsv") }
    pub fn docs(&self) -> PathBuf { self.root.join("doc_index.tsv") }
    pub fn linked_from(&self) -> PathBuf { self.root.join("linked_from_index.tsv") }
    pub fn authority(&self) -> PathBuf { self.root.join("authority_index.tsv") }
    pub fn stems(&self) -> PathBuf { self.root.join("stems.tsv") }
    pub fn windows(&self) -> PathBuf { self.root.join("window_index.tsv") }
    pub fn weights(&self) -> PathBuf { self.root.join("weights.tsv") }
    pub fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn clean_field(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// Splits a record into fields, dropping the line ending and trailing empty fields.
fn fields(line: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn parse_err(source: &str, line: usize, reason: impl Into<String>) -> SearchError {
    SearchError::Parse { file: source.to_string(), line, reason: reason.into() }
}

fn parse_field<T: std::str::FromStr>(source: &str, line: usize, value: &str, what: &str) -> Result<T, SearchError> {
    value.trim().parse().map_err(|_| parse_err(source, line, format!("bad {what} {value:?}")))
}

/// Reads non-empty records, passing 1-based line numbers along.
fn records<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)))
        .filter(|r| r.as_ref().map_or(true, |(_, l)| !l.trim().is_empty()))
}

// --- posting lists: term, idf, doc_count, (doc_id:frequency)* ---

pub fn write_postings<W: Write>(mut w: W, index: &InvertedIndex) -> std::io::Result<()> {
    for (term, list) in &index.terms {
        write!(w, "{}\t{}\t{}", clean_field(term), list.idf, list.document_count)?;
        for p in &list.postings {
            write!(w, "\t{}:{}", p.doc_id, p.frequency)?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn read_postings<R: BufRead>(reader: R, source: &str) -> Result<InvertedIndex, SearchError> {
    let mut index = InvertedIndex::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 3 {
            return Err(parse_err(source, n, "expected term, idf, doc_count"));
        }
        let idf: f64 = parse_field(source, n, f[1], "idf")?;
        let document_count: u32 = parse_field(source, n, f[2], "doc_count")?;
        let mut postings = Vec::with_capacity(f.len() - 3);
        for entry in f[3..].iter().filter(|e| !e.is_empty()) {
            let (doc, freq) = entry
                .rsplit_once(':')
                .ok_or_else(|| parse_err(source, n, format!("bad posting {entry:?}")))?;
            postings.push(Posting {
                doc_id: parse_field(source, n, doc, "doc id")?,
                frequency: parse_field(source, n, freq, "frequency")?,
            });
        }
        if postings.len() != document_count as usize {
            tracing::warn!(source, line = n, "posting count disagrees with doc_count");
        }
        index.terms.insert(f[0].to_string(), PostingList { idf, document_count, postings });
    }
    Ok(index)
}

// --- documents: doc_id, title, name, word_count, link_count, (linked_doc_id)* ---

pub fn write_docs<W: Write>(mut w: W, docs: &DocTable) -> std::io::Result<()> {
    for r in docs.iter() {
        write!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            r.id,
            clean_field(&r.title),
            clean_field(&r.display_name),
            r.word_count,
            r.outbound_links.len()
        )?;
        for link in &r.outbound_links {
            write!(w, "\t{link}")?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn read_docs<R: BufRead>(reader: R, source: &str) -> Result<Vec<DocumentRecord>, SearchError> {
    let mut out = Vec::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 5 {
            return Err(parse_err(source, n, "expected doc_id, title, name, word_count, link_count"));
        }
        let outbound_links = f[5..]
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| parse_field(source, n, l, "linked doc id"))
            .collect::<Result<Vec<DocumentId>, _>>()?;
        out.push(DocumentRecord {
            id: parse_field(source, n, f[0], "doc id")?,
            title: f[1].to_string(),
            display_name: f[2].to_string(),
            word_count: parse_field(source, n, f[3], "word_count")?,
            outbound_links,
            inbound_links: Vec::new(),
            authority_score: 0.0,
        });
    }
    Ok(out)
}

// --- inverse links: doc_id, inbound_count, (source_doc_id)* ---

pub fn write_linked_from<W: Write>(mut w: W, docs: &DocTable) -> std::io::Result<()> {
    for r in docs.iter().filter(|r| !r.inbound_links.is_empty()) {
        write!(w, "{}\t{}", r.id, r.inbound_links.len())?;
        for source in &r.inbound_links {
            write!(w, "\t{source}")?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn read_linked_from<R: BufRead>(reader: R, source: &str) -> Result<HashMap<DocumentId, Vec<DocumentId>>, SearchError> {
    let mut out = HashMap::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 2 {
            return Err(parse_err(source, n, "expected doc_id, inbound_count"));
        }
        let id: DocumentId = parse_field(source, n, f[0], "doc id")?;
        let sources = f[2..]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| parse_field(source, n, s, "source doc id"))
            .collect::<Result<Vec<DocumentId>, _>>()?;
        out.insert(id, sources);
    }
    Ok(out)
}

// --- authority: doc_id, score ---

pub fn write_authority<W: Write>(mut w: W, docs: &DocTable) -> std::io::Result<()> {
    for r in docs.iter() {
        writeln!(w, "{}\t{}", r.id, r.authority_score)?;
    }
    w.flush()
}

pub fn read_authority<R: BufRead>(reader: R, source: &str) -> Result<HashMap<DocumentId, f64>, SearchError> {
    let mut out = HashMap::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 2 {
            return Err(parse_err(source, n, "expected doc_id, score"));
        }
        out.insert(parse_field(source, n, f[0], "doc id")?, parse_field(source, n, f[1], "score")?);
    }
    Ok(out)
}

/// Joins the document, inverse-link and authority records into one table.
pub fn assemble_doc_table(
    records: Vec<DocumentRecord>,
    linked_from: HashMap<DocumentId, Vec<DocumentId>>,
    authority: HashMap<DocumentId, f64>,
) -> DocTable {
    let records = records
        .into_iter()
        .map(|mut r| {
            r.inbound_links = linked_from.get(&r.id).cloned().unwrap_or_default();
            r.authority_score = authority.get(&r.id).copied().unwrap_or(0.0);
            r
        })
        .collect();
    DocTable::new(records)
}

// --- stems: /stem, word* ---

pub fn write_stems<W: Write>(mut w: W, stems: &StemMap) -> std::io::Result<()> {
    for (stem, words) in stems.iter() {
        write!(w, "/{stem}")?;
        for word in words {
            write!(w, "\t{word}")?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn read_stems<R: BufRead>(reader: R, source: &str) -> Result<StemMap, SearchError> {
    let mut groups = std::collections::BTreeMap::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        let stem = f
            .first()
            .and_then(|s| s.strip_prefix('/'))
            .ok_or_else(|| parse_err(source, n, "stem must start with '/'"))?;
        let words: Vec<String> = f[1..].iter().filter(|w| !w.is_empty()).map(|w| w.to_string()).collect();
        groups.insert(stem.to_string(), words);
    }
    Ok(StemMap::from_groups(groups))
}

// --- windows: term, count, (doc_id:window:frequency)* ---

pub fn write_windows<W: Write>(mut w: W, windows: &WindowIndex) -> std::io::Result<()> {
    for (term, postings) in &windows.terms {
        write!(w, "{}\t{}", term, postings.len())?;
        for p in postings {
            write!(w, "\t{}:{}:{}", p.doc_id, p.window, p.frequency)?;
        }
        writeln!(w)?;
    }
    w.flush()
}

pub fn read_windows<R: BufRead>(reader: R, source: &str) -> Result<WindowIndex, SearchError> {
    let mut index = WindowIndex::default();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 2 {
            return Err(parse_err(source, n, "expected term, count"));
        }
        let mut postings = Vec::new();
        for entry in f[2..].iter().filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(3, ':');
            let (Some(doc), Some(window), Some(freq)) = (parts.next(), parts.next(), parts.next()) else {
                return Err(parse_err(source, n, format!("bad window posting {entry:?}")));
            };
            postings.push(WindowPosting {
                doc_id: parse_field(source, n, doc, "doc id")?,
                window: parse_field(source, n, window, "window")?,
                frequency: parse_field(source, n, freq, "frequency")?,
            });
        }
        index.terms.insert(f[0].to_string(), postings);
    }
    Ok(index)
}

// --- weights: a single row of f64 ---

pub fn write_weights<W: Write>(mut w: W, weights: &Weights) -> std::io::Result<()> {
    let row: Vec<String> = weights.0.iter().map(|x| x.to_string()).collect();
    writeln!(w, "{}", row.join("\t"))?;
    w.flush()
}

pub fn read_weights<R: BufRead>(reader: R, source: &str) -> Result<Weights, SearchError> {
    let Some(record) = records(reader).next() else {
        return Err(parse_err(source, 1, "empty weights file"));
    };
    let (n, line) = record?;
    let f = fields(&line);
    if f.len() != FEATURE_COUNT {
        return Err(parse_err(source, n, format!("expected {FEATURE_COUNT} weights, found {}", f.len())));
    }
    let mut weights = [0.0; FEATURE_COUNT];
    for (slot, value) in weights.iter_mut().zip(f) {
        *slot = parse_field(source, n, value, "weight")?;
    }
    Ok(Weights(weights))
}

// --- judgments: query, doc_id, grade ---

pub fn read_judgments<R: BufRead>(reader: R, source: &str) -> Result<Vec<Judgment>, SearchError> {
    let mut out = Vec::new();
    for record in records(reader) {
        let (n, line) = record?;
        let f = fields(&line);
        if f.len() < 3 {
            return Err(parse_err(source, n, "expected query, doc_id, grade"));
        }
        out.push(Judgment {
            query: f[0].trim().to_lowercase(),
            doc_id: parse_field(source, n, f[1], "doc id")?,
            grade: parse_field(source, n, f[2], "grade")?,
        });
    }
    Ok(out)
}

// --- file-level helpers ---

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(f))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(f))
}

fn source_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

pub fn save_index_files(paths: &IndexPaths, snapshot: &SearchSnapshot) -> Result<()> {
    write_postings(create(&paths.corpus())?, &snapshot.corpus)?;
    write_postings(create(&paths.anchors())?, &snapshot.anchors)?;
    write_docs(create(&paths.docs())?, &snapshot.docs)?;
    write_linked_from(create(&paths.linked_from())?, &snapshot.docs)?;
    write_authority(create(&paths.authority())?, &snapshot.docs)?;
    write_stems(create(&paths.stems())?, &snapshot.stems)?;
    write_windows(create(&paths.windows())?, &snapshot.windows)?;
    write_weights(create(&paths.weights())?, &snapshot.weights)?;
    Ok(())
}

/// Rebuilds a snapshot from the tab-separated files alone. Missing authority
/// or weights files fall back to zero scores and default weights.
pub fn load_index_files(paths: &IndexPaths) -> Result<SearchSnapshot> {
    let read = |path: PathBuf| -> Result<(BufReader<File>, String)> { Ok((open(&path)?, source_name(&path))) };

    let (r, s) = read(paths.corpus())?;
    let corpus = read_postings(r, &s)?;
    let (r, s) = read(paths.anchors())?;
    let anchors = read_postings(r, &s)?;
    let (r, s) = read(paths.docs())?;
    let records = read_docs(r, &s)?;
    let (r, s) = read(paths.linked_from())?;
    let linked_from = read_linked_from(r, &s)?;
    let authority = if paths.authority().exists() {
        let (r, s) = read(paths.authority())?;
        read_authority(r, &s)?
    } else {
        HashMap::new()
    };
    let (r, s) = read(paths.stems())?;
    let stems = read_stems(r, &s)?;
    let (r, s) = read(paths.windows())?;
    let windows = read_windows(r, &s)?;
    let weights = if paths.weights().exists() {
        let (r, s) = read(paths.weights())?;
        read_weights(r, &s)?
    } else {
        Weights::default()
    };
    let docs = assemble_doc_table(records, linked_from, authority);
    Ok(SearchSnapshot { corpus, anchors, docs, windows, stems, weights })
}

pub fn save_snapshot(paths: &IndexPaths, snapshot: &SearchSnapshot) -> Result<()> {
    let mut f = create(&paths.snapshot())?;
    let bytes = bincode::serialize(snapshot)?;
    f.write_all(&bytes)?;
    f.flush()?;
    Ok(())
}

pub fn load_snapshot(paths: &IndexPaths) -> Result<SearchSnapshot> {
    let mut f = open(&paths.snapshot())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    decode_snapshot(&buf).with_context(|| format!("decoding {}", paths.snapshot().display()))
}

/// Decodes snapshot bytes and restores the document lookup.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SearchSnapshot, SearchError> {
    let mut snapshot: SearchSnapshot = bincode::deserialize(bytes)?;
    snapshot.docs.rebuild_positions();
    Ok(snapshot)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Writes every exchange file, the snapshot and `meta.json`.
pub fn save_all(paths: &IndexPaths, snapshot: &SearchSnapshot) -> Result<()> {
    save_index_files(paths, snapshot)?;
    save_snapshot(paths, snapshot)?;
    save_meta(paths, &MetaFile::now(snapshot.docs.len() as u32))?;
    Ok(())
}

/// Prefers the snapshot and falls back to the tab-separated files.
pub fn load_all(paths: &IndexPaths) -> Result<SearchSnapshot> {
    if paths.snapshot().exists() {
        return load_snapshot(paths);
    }
    load_index_files(paths)
}

pub fn load_judgments(path: &Path) -> Result<Vec<Judgment>> {
    Ok(read_judgments(open(path)?, &source_name(path))?)
}
