// ============================================================
// Layer 6 — Artifact Layout
// ============================================================
// Every file a run leaves behind, in one place:
//
//   save_dir/
//     config.json          ← TrainConfig snapshot (written once)
//     chars_vocab.json     ← Vocabulary (written once)
//     iterations.json      ← running iteration counter
//     checkpoint.json      ← index of completed checkpoints
//     model.ckpt-5.bin     ← weights at iteration 5
//     losses-5.json        ← losses for iterations 1..=5
//     model.ckpt-10.bin
//     losses-10.json
//     progress.csv         ← one row per batch
//
// Writes go through `write_atomic`: the bytes land in a hidden
// `.name.tmp` sibling first and are renamed over the target only
// once fully flushed, so a reader never sees a half-written file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

pub const CONFIG_FILE:     &str = "config.json";
pub const VOCAB_FILE:      &str = "chars_vocab.json";
pub const ITERATIONS_FILE: &str = "iterations.json";
pub const INDEX_FILE:      &str = "checkpoint.json";
pub const PROGRESS_FILE:   &str = "progress.csv";

const WEIGHTS_PREFIX: &str = "model.ckpt-";
const WEIGHTS_SUFFIX: &str = ".bin";
const LOSSES_PREFIX:  &str = "losses-";
const LOSSES_SUFFIX:  &str = ".json";

/// Resolves artifact paths inside one run directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn vocab(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    pub fn iterations(&self) -> PathBuf {
        self.dir.join(ITERATIONS_FILE)
    }

    pub fn index(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn progress(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE)
    }

    pub fn weights(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{WEIGHTS_PREFIX}{iteration}{WEIGHTS_SUFFIX}"))
    }

    pub fn losses(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("{LOSSES_PREFIX}{iteration}{LOSSES_SUFFIX}"))
    }
}

/// Extract the iteration tag from a loss-segment file name,
/// e.g. `losses-120.json` → `Some(120)`.
pub fn loss_tag(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(LOSSES_PREFIX)?
        .strip_suffix(LOSSES_SUFFIX)?
        .parse()
        .ok()
}

// ─── Checkpoint Index ─────────────────────────────────────────────────────────
/// Contents of `checkpoint.json`.
///
/// Written last in every save, so an iteration listed here has
/// all of its other artifacts on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointIndex {
    /// The current checkpoint
    pub latest: u64,
    /// Every completed checkpoint, ascending
    pub all: Vec<u64>,
}

impl CheckpointIndex {
    /// Index after recording one more checkpoint.
    pub fn with(mut self, iteration: u64) -> Self {
        if !self.all.contains(&iteration) {
            self.all.push(iteration);
            self.all.sort_unstable();
        }
        self.latest = iteration;
        self
    }

    pub fn first(iteration: u64) -> Self {
        Self { latest: iteration, all: vec![iteration] }
    }
}

// ─── Atomic Writes ────────────────────────────────────────────────────────────
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `bytes` to `path` via a temporary file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);

    let mut f = File::create(&tmp)
        .with_context(|| format!("Cannot create '{}'", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("Cannot flush '{}'", tmp.display()))?;
    drop(f);

    fs::rename(&tmp, path).with_context(|| {
        format!("Cannot move '{}' into place at '{}'", tmp.display(), path.display())
    })?;

    tracing::debug!("Wrote '{}' ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Serialise `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Cannot serialise '{}'", path.display()))?;
    write_atomic(path, &json)
}
