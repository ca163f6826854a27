// ============================================================
// Layer 6 — Resume Validator
// ============================================================
// Decides whether a previous run's directory can be resumed
// with the requested configuration and the current corpus.
//
// Checks, in order (the first failure wins):
//   1. the directory exists and is a directory
//   2. config.json exists and parses
//   3. chars_vocab.json exists and parses
//   4. iterations.json exists
//   5. checkpoint.json lists at least one checkpoint whose
//      weight file is on disk
//   6. model_kind, hidden_size, num_layers match the saved config
//   7. the vocabulary matches: same symbols AND same ids
//
// Nothing here touches model weights. Only after `validate`
// returns a ResumeHandle may the caller load a checkpoint.

use std::{fs, path::{Path, PathBuf}};

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::TrainError;
use crate::domain::vocab::Vocabulary;
use crate::infra::artifacts::{ArtifactLayout, CheckpointIndex};
use crate::infra::checkpoint::{CheckpointStore, LoadedCheckpoint};

/// Proof that a directory passed validation, plus what was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeHandle {
    dir:       PathBuf,
    latest:    u64,
    available: Vec<u64>,
}

impl ResumeHandle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Iteration of the current checkpoint
    pub fn latest(&self) -> u64 {
        self.latest
    }

    /// Every completed checkpoint, ascending
    pub fn available(&self) -> &[u64] {
        &self.available
    }

    /// Pick the checkpoint to resume from: `at` if given, else the latest.
    pub fn select(&self, at: Option<u64>) -> Result<u64, TrainError> {
        match at {
            None => Ok(self.latest),
            Some(k) if self.available.contains(&k) => Ok(k),
            Some(k) => Err(TrainError::MissingArtifact {
                artifact: "requested checkpoint",
                path:     ArtifactLayout::new(&self.dir).weights(k),
            }),
        }
    }

    /// Load the selected checkpoint's iteration counter and weights.
    pub fn load(&self, at: Option<u64>) -> Result<LoadedCheckpoint> {
        let iteration = self.select(at)?;
        CheckpointStore::open(&self.dir).load(iteration)
    }
}

/// Validates a resume directory against the requested run.
pub struct ResumeValidator {
    layout: ArtifactLayout,
}

impl ResumeValidator {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { layout: ArtifactLayout::new(dir) }
    }

    /// Run every check. Returns a handle only if all of them pass.
    pub fn validate(
        &self,
        requested: &TrainConfig,
        vocab:     &Vocabulary,
    ) -> Result<ResumeHandle, TrainError> {
        let dir = self.layout.dir();
        if !dir.is_dir() {
            return Err(TrainError::MissingArtifact {
                artifact: "resume directory",
                path:     dir.to_path_buf(),
            });
        }

        let saved_cfg:   TrainConfig = read_artifact(&self.layout.config(), "config snapshot")?;
        let saved_vocab: Vocabulary  = read_artifact(&self.layout.vocab(), "vocabulary")?;
        let counter:     u64         = read_artifact(&self.layout.iterations(), "iteration counter")?;
        let index = self.discover_checkpoint()?;

        if counter != index.latest {
            tracing::warn!(
                "iteration counter ({}) disagrees with checkpoint index ({}); using the index",
                counter,
                index.latest
            );
        }

        check_compatible(&saved_cfg, requested)?;
        vocab
            .check_against(&saved_vocab)
            .map_err(TrainError::VocabularyMismatch)?;

        tracing::info!(
            "Resume directory '{}' validated: {} checkpoint(s), latest at iteration {}",
            dir.display(),
            index.all.len(),
            index.latest
        );

        Ok(ResumeHandle {
            dir:       dir.to_path_buf(),
            latest:    index.latest,
            available: index.all,
        })
    }

    fn discover_checkpoint(&self) -> Result<CheckpointIndex, TrainError> {
        let path = self.layout.index();
        if !path.is_file() {
            return Err(TrainError::NoCheckpoint { dir: self.layout.dir().to_path_buf() });
        }

        let index: CheckpointIndex = read_artifact(&path, "checkpoint index")?;
        if index.all.is_empty() {
            return Err(TrainError::NoCheckpoint { dir: self.layout.dir().to_path_buf() });
        }

        let weights = self.layout.weights(index.latest);
        if !weights.is_file() {
            return Err(TrainError::MissingArtifact {
                artifact: "model checkpoint",
                path:     weights,
            });
        }
        Ok(index)
    }
}

/// Compare the fields that fix the model's shape.
pub fn check_compatible(saved: &TrainConfig, requested: &TrainConfig) -> Result<(), TrainError> {
    fn mismatch(field: &'static str, saved: impl ToString, requested: impl ToString) -> TrainError {
        TrainError::ConfigMismatch {
            field,
            saved:     saved.to_string(),
            requested: requested.to_string(),
        }
    }

    if saved.model_kind != requested.model_kind {
        return Err(mismatch("model_kind", saved.model_kind, requested.model_kind));
    }
    if saved.hidden_size != requested.hidden_size {
        return Err(mismatch("hidden_size", saved.hidden_size, requested.hidden_size));
    }
    if saved.num_layers != requested.num_layers {
        return Err(mismatch("num_layers", saved.num_layers, requested.num_layers));
    }
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, artifact: &'static str) -> Result<T, TrainError> {
    if !path.is_file() {
        return Err(TrainError::MissingArtifact { artifact, path: path.to_path_buf() });
    }
    let corrupt = |reason: String| TrainError::CorruptArtifact {
        artifact,
        path: path.to_path_buf(),
        reason,
    };
    let s = fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
    serde_json::from_str(&s).map_err(|e| corrupt(e.to_string()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model_kind::ModelKind;
    use crate::domain::vocab::VocabMismatch;
    use crate::infra::checkpoint::CheckpointRecord;
    use tempfile::TempDir;

    fn vocab() -> Vocabulary {
        Vocabulary::from_chars(vec!['a', 'b', 'c'])
    }

    /// A directory holding one complete run with checkpoints at 5 and 10.
    fn saved_run(cfg: &TrainConfig) -> TempDir {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        store.save_config(cfg).unwrap();
        store.save_vocabulary(&vocab()).unwrap();
        for k in [5u64, 10] {
            store
                .save(&CheckpointRecord { iteration: k, weights: vec![k as u8], losses: vec![0.0; 5] })
                .unwrap();
        }
        dir
    }

    #[test]
    fn test_valid_directory_yields_latest_checkpoint() {
        let cfg    = TrainConfig::default();
        let dir    = saved_run(&cfg);
        let handle = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap();

        assert_eq!(handle.latest(), 10);
        assert_eq!(handle.available(), &[5, 10]);
        assert_eq!(handle.load(None).unwrap().weights, vec![10]);
        assert_eq!(handle.load(Some(5)).unwrap().iteration, 5);
    }

    #[test]
    fn test_missing_directory() {
        let dir     = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = ResumeValidator::new(&missing)
            .validate(&TrainConfig::default(), &vocab())
            .unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "resume directory", .. }));
    }

    #[test]
    fn test_file_instead_of_directory() {
        let dir  = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let err = ResumeValidator::new(&file)
            .validate(&TrainConfig::default(), &vocab())
            .unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "resume directory", .. }));
    }

    #[test]
    fn test_missing_config_snapshot() {
        let cfg = TrainConfig::default();
        let dir = saved_run(&cfg);
        fs::remove_file(dir.path().join("config.json")).unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "config snapshot", .. }));
    }

    #[test]
    fn test_unparseable_config_snapshot() {
        let cfg = TrainConfig::default();
        let dir = saved_run(&cfg);
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::CorruptArtifact { artifact: "config snapshot", .. }));
    }

    #[test]
    fn test_missing_vocabulary() {
        let cfg = TrainConfig::default();
        let dir = saved_run(&cfg);
        fs::remove_file(dir.path().join("chars_vocab.json")).unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "vocabulary", .. }));
    }

    #[test]
    fn test_missing_iteration_counter() {
        let cfg = TrainConfig::default();
        let dir = saved_run(&cfg);
        fs::remove_file(dir.path().join("iterations.json")).unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "iteration counter", .. }));
    }

    #[test]
    fn test_no_checkpoint_is_distinct_from_missing_directory() {
        let cfg   = TrainConfig::default();
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        store.save_config(&cfg).unwrap();
        store.save_vocabulary(&vocab()).unwrap();
        fs::write(dir.path().join("iterations.json"), "0").unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::NoCheckpoint { .. }));
    }

    #[test]
    fn test_indexed_checkpoint_without_weights() {
        let cfg = TrainConfig::default();
        let dir = saved_run(&cfg);
        fs::remove_file(dir.path().join("model.ckpt-10.bin")).unwrap();

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap_err();
        assert!(matches!(err, TrainError::MissingArtifact { artifact: "model checkpoint", .. }));
    }

    #[test]
    fn test_hidden_size_mismatch_alone_is_rejected() {
        let saved = TrainConfig::default();
        let dir   = saved_run(&saved);
        let requested = TrainConfig { hidden_size: saved.hidden_size * 2, ..saved.clone() };

        let err = ResumeValidator::new(dir.path()).validate(&requested, &vocab()).unwrap_err();
        match err {
            TrainError::ConfigMismatch { field, .. } => assert_eq!(field, "hidden_size"),
            other => panic!("expected ConfigMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_model_kind_and_layer_mismatches_are_named() {
        let saved = TrainConfig::default();

        let other_kind = TrainConfig { model_kind: ModelKind::Gru, ..saved.clone() };
        assert!(matches!(
            check_compatible(&saved, &other_kind),
            Err(TrainError::ConfigMismatch { field: "model_kind", .. })
        ));

        let other_layers = TrainConfig { num_layers: saved.num_layers + 1, ..saved.clone() };
        assert!(matches!(
            check_compatible(&saved, &other_layers),
            Err(TrainError::ConfigMismatch { field: "num_layers", .. })
        ));
    }

    #[test]
    fn test_non_shape_fields_may_change() {
        let saved = TrainConfig::default();
        let requested = TrainConfig {
            batch_size:    saved.batch_size * 2,
            num_epochs:    saved.num_epochs + 3,
            learning_rate: saved.learning_rate / 2.0,
            ..saved.clone()
        };
        assert!(check_compatible(&saved, &requested).is_ok());
    }

    #[test]
    fn test_permuted_vocabulary_is_rejected() {
        let cfg      = TrainConfig::default();
        let dir      = saved_run(&cfg);
        let permuted = Vocabulary::from_chars(vec!['b', 'a', 'c']);

        let err = ResumeValidator::new(dir.path()).validate(&cfg, &permuted).unwrap_err();
        assert!(matches!(err, TrainError::VocabularyMismatch(VocabMismatch::IdAssignment)));
    }

    #[test]
    fn test_unknown_requested_checkpoint() {
        let cfg    = TrainConfig::default();
        let dir    = saved_run(&cfg);
        let handle = ResumeValidator::new(dir.path()).validate(&cfg, &vocab()).unwrap();

        assert!(matches!(
            handle.select(Some(7)),
            Err(TrainError::MissingArtifact { artifact: "requested checkpoint", .. })
        ));
    }
}
