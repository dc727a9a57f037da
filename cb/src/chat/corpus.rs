//! Retrieval corpus for the conversation agent
//!
//! [`KeywordIndex`] ranks paragraph-sized passages by query term overlap.
//! [`SharedCorpus`] lets a collaborator rebuild the index while the agent
//! keeps reading: readers take an `Arc` snapshot and never see a partial
//! index.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use eyre::Result;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::ingest;

/// Longest passage kept as one chunk, in bytes
const MAX_PASSAGE_LEN: usize = 1200;

/// Words shorter than this are ignored when matching
const MIN_TERM_LEN: usize = 3;

/// A retrievable piece of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub source: String,
    pub text: String,
}

/// Read-only retrieval seam
pub trait CorpusIndex: Send + Sync {
    /// Up to `top_k` passages relevant to `query`, best first
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Passage>;

    /// Number of passages indexed
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyIndex;

impl CorpusIndex for EmptyIndex {
    fn retrieve(&self, _query: &str, _top_k: usize) -> Vec<Passage> {
        Vec::new()
    }

    fn len(&self) -> usize {
        0
    }
}

/// In-memory keyword-overlap index
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    passages: Vec<(Passage, HashSet<String>)>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a document into passages and index them
    pub fn add_document(&mut self, source: &str, text: &str) {
        debug!(%source, text_len = text.len(), "KeywordIndex::add_document: called");
        for chunk in chunk_text(text) {
            let terms = terms(&chunk);
            self.passages.push((
                Passage {
                    source: source.to_string(),
                    text: chunk,
                },
                terms,
            ));
        }
    }

    /// Index every supported document under `dir`
    ///
    /// Unreadable or empty files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        debug!(?dir, "KeywordIndex::load_dir: called");
        if !dir.is_dir() {
            return Err(eyre::eyre!("Corpus directory not found: {}", dir.display()));
        }

        let mut index = Self::new();
        let mut documents = 0;
        for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || !ingest::is_supported(path) {
                continue;
            }
            match ingest::extract_text(path) {
                Ok(text) => {
                    let source = path.strip_prefix(dir).unwrap_or(path).display().to_string();
                    index.add_document(&source, &text);
                    documents += 1;
                }
                Err(e) => warn!(error = %e, "Skipping corpus document"),
            }
        }

        info!(%documents, passages = index.passages.len(), "Corpus loaded from {}", dir.display());
        Ok(index)
    }
}

impl CorpusIndex for KeywordIndex {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let query_terms = terms(query);
        if query_terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(idx, (_, terms))| (idx, terms.intersection(&query_terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();
        // Stable sort keeps document order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        debug!(matches = scored.len(), %top_k, "KeywordIndex::retrieve");
        scored
            .into_iter()
            .take(top_k)
            .map(|(idx, _)| self.passages[idx].0.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

/// Corpus handle that can be swapped atomically
#[derive(Clone)]
pub struct SharedCorpus {
    inner: Arc<RwLock<Arc<dyn CorpusIndex>>>,
}

impl SharedCorpus {
    pub fn new(index: Arc<dyn CorpusIndex>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(EmptyIndex))
    }

    /// Current index; unaffected by later swaps
    pub fn snapshot(&self) -> Arc<dyn CorpusIndex> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the index for all future snapshots
    pub fn replace(&self, index: Arc<dyn CorpusIndex>) {
        debug!(passages = index.len(), "SharedCorpus::replace: called");
        match self.inner.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }
}

impl Default for SharedCorpus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Lowercased alphanumeric words of at least MIN_TERM_LEN chars
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TERM_LEN)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Paragraphs, merged up to MAX_PASSAGE_LEN and split when longer
fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > MAX_PASSAGE_LEN {
            chunks.push(std::mem::take(&mut current));
        }
        if paragraph.len() > MAX_PASSAGE_LEN {
            chunks.extend(split_long(paragraph));
            continue;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split on whitespace into pieces no longer than MAX_PASSAGE_LEN
fn split_long(paragraph: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > MAX_PASSAGE_LEN {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index() -> KeywordIndex {
        let mut index = KeywordIndex::new();
        index.add_document("rust.md", "Ownership moves values.\n\nBorrowing lends references without moving.");
        index.add_document("go.md", "Goroutines are cheap threads.");
        index
    }

    #[test]
    fn test_retrieve_ranks_by_overlap() {
        let hits = index().retrieve("How does borrowing of references work?", 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "rust.md");
        assert!(hits[0].text.contains("Borrowing"));
    }

    #[test]
    fn test_short_paragraphs_merge_into_one_passage() {
        let idx = index();
        // rust.md paragraphs are short enough to share a passage
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_retrieve_no_terms() {
        assert!(index().retrieve("a an", 3).is_empty());
        assert!(index().retrieve("ownership", 0).is_empty());
        assert!(EmptyIndex.retrieve("ownership", 3).is_empty());
    }

    #[test]
    fn test_long_paragraph_is_split() {
        let long = "word ".repeat(600);
        let chunks = chunk_text(&long);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_PASSAGE_LEN));
    }

    #[test]
    fn test_load_dir_skips_unsupported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.md"), "Lifetimes annotate references.").unwrap();
        std::fs::create_dir_all(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/b.txt"), "Traits describe behavior.").unwrap();
        std::fs::write(temp.path().join("c.docx"), [0u8, 1, 2]).unwrap();
        std::fs::write(temp.path().join("d.txt"), "   ").unwrap();
        std::fs::write(temp.path().join("e.pdf"), [0u8, 1, 2]).unwrap();
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ownership.pdf");
        std::fs::copy(fixture, temp.path().join("f.pdf")).unwrap();

        let idx = KeywordIndex::load_dir(temp.path()).unwrap();

        assert_eq!(idx.len(), 3);
        assert_eq!(idx.retrieve("traits", 1)[0].source, format!("sub{}b.txt", std::path::MAIN_SEPARATOR));
        assert_eq!(idx.retrieve("ownership", 1)[0].source, "f.pdf");
    }

    #[test]
    fn test_shared_corpus_swap_is_atomic_for_snapshots() {
        let shared = SharedCorpus::empty();
        let before = shared.snapshot();

        shared.replace(Arc::new(index()));

        assert!(before.is_empty());
        assert_eq!(shared.snapshot().len(), 2);
    }
}
