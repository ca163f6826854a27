// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads `input.txt` from the data directory. The whole corpus
// is held in memory: character-level corpora are small, and the
// batcher needs random access to lay out its rows.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

/// File name of the corpus inside the data directory
pub const CORPUS_FILE: &str = "input.txt";

/// Loads the raw training text from a data directory.
pub struct CorpusLoader {
    dir: PathBuf,
}

impl CorpusLoader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Full path of the corpus file
    pub fn corpus_path(&self) -> PathBuf {
        self.dir.join(CORPUS_FILE)
    }

    /// Read the corpus as UTF-8 text
    pub fn load(&self) -> Result<String> {
        let path = self.corpus_path();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read corpus '{}'", path.display()))?;

        tracing::info!(
            "Loaded corpus '{}' ({} chars)",
            path.display(),
            text.chars().count()
        );
        Ok(text)
    }
}
