// ============================================================
// Layer 5 — Character Model
// ============================================================
// The built-in Model implementation: a factorised bigram cell.
//
//   logits = E[x] · W + b
//     E : vocab_size  × hidden_size   (embedding)
//     W : hidden_size × vocab_size    (projection)
//     b : vocab_size                  (bias)
//
// One step = softmax cross-entropy over every (input, target)
// pair in the batch, gradients averaged, clipped by global norm
// at `grad_clip`, then a plain SGD update at the given rate.
//
// Weight blob format (JSON):
//   { model_kind, vocab_size, hidden_size, num_layers, params }
// The header fields are checked on restore, so a blob from a
// differently shaped model is rejected instead of mis-loaded.

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::StepError;
use crate::domain::model_kind::ModelKind;
use crate::domain::traits::{Batch, Model};

const INIT_SCALE: f32 = 0.08;

/// Serialised form of a CharModel's weights.
#[derive(Debug, Serialize, Deserialize)]
struct WeightsBlob {
    model_kind:  ModelKind,
    vocab_size:  usize,
    hidden_size: usize,
    num_layers:  usize,
    params:      Vec<f32>,
}

pub struct CharModel {
    kind:        ModelKind,
    vocab_size:  usize,
    hidden_size: usize,
    num_layers:  usize,
    grad_clip:   f32,
    /// [ E | W | b ] in one flat buffer
    params:      Vec<f32>,
    out_offset:  usize,
    bias_offset: usize,
}

impl CharModel {
    pub fn new(
        kind:        ModelKind,
        vocab_size:  usize,
        hidden_size: usize,
        num_layers:  usize,
        grad_clip:   f64,
        seed:        u64,
    ) -> Self {
        let embed_len = vocab_size * hidden_size;
        let out_len   = hidden_size * vocab_size;
        let total     = embed_len + out_len + vocab_size;

        let mut rng = StdRng::seed_from_u64(seed);
        let params: Vec<f32> = (0..total)
            .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
            .collect();

        Self {
            kind,
            vocab_size,
            hidden_size,
            num_layers,
            grad_clip: grad_clip as f32,
            params,
            out_offset:  embed_len,
            bias_offset: embed_len + out_len,
        }
    }

    /// Build the model described by a run configuration.
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self::new(
            cfg.model_kind,
            cfg.vocab_size,
            cfg.hidden_size,
            cfg.num_layers,
            cfg.gradient_clip,
            cfg.seed,
        )
    }

    fn check_batch(&self, batch: &Batch) -> Result<(), StepError> {
        if batch.inputs.len() != batch.targets.len() {
            return Err(StepError::ShapeMismatch {
                inputs:  batch.inputs.len(),
                targets: batch.targets.len(),
            });
        }
        if batch.inputs.is_empty() {
            return Err(StepError::EmptyBatch);
        }
        if let Some(&id) = batch
            .inputs
            .iter()
            .chain(batch.targets.iter())
            .find(|&&id| id >= self.vocab_size)
        {
            return Err(StepError::TokenOutOfRange { id, vocab_size: self.vocab_size });
        }
        Ok(())
    }

    /// Softmax probabilities for one input token
    fn probabilities(&self, token: usize) -> Vec<f32> {
        let emb = &self.params[token * self.hidden_size..(token + 1) * self.hidden_size];
        let mut logits: Vec<f32> = (0..self.vocab_size)
            .map(|j| {
                let mut sum = self.params[self.bias_offset + j];
                for (h, e) in emb.iter().enumerate() {
                    sum += e * self.params[self.out_offset + h * self.vocab_size + j];
                }
                sum
            })
            .collect();

        let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mut exp_sum = 0.0f32;
        for l in logits.iter_mut() {
            *l = (*l - max).exp();
            exp_sum += *l;
        }
        for l in logits.iter_mut() {
            *l /= exp_sum;
        }
        logits
    }

    /// Mean cross-entropy of a batch, without updating weights.
    pub fn loss(&self, batch: &Batch) -> Result<f64, StepError> {
        self.check_batch(batch)?;
        let total: f64 = batch
            .pairs()
            .map(|(x, y)| -(self.probabilities(x)[y].max(1e-9) as f64).ln())
            .sum();
        Ok(total / batch.inputs.len() as f64)
    }

    /// Mean loss and averaged gradients over a batch
    fn loss_and_grads(&self, batch: &Batch) -> (f64, Vec<f32>) {
        let mut grads = vec![0.0f32; self.params.len()];
        let mut loss  = 0.0f64;

        for (x, y) in batch.pairs() {
            let probs     = self.probabilities(x);
            let emb_start = x * self.hidden_size;
            loss -= (probs[y].max(1e-9) as f64).ln();

            for (j, p) in probs.iter().enumerate() {
                let g = p - if j == y { 1.0 } else { 0.0 };
                grads[self.bias_offset + j] += g;
                for h in 0..self.hidden_size {
                    let out_idx = self.out_offset + h * self.vocab_size + j;
                    grads[out_idx]       += self.params[emb_start + h] * g;
                    grads[emb_start + h] += self.params[out_idx] * g;
                }
            }
        }

        let n = batch.inputs.len() as f32;
        for g in grads.iter_mut() {
            *g /= n;
        }
        (loss / batch.inputs.len() as f64, grads)
    }
}

/// Scale `grads` down so their global L2 norm is at most `max_norm`.
fn clip_by_global_norm(grads: &mut [f32], max_norm: f32) -> f32 {
    let norm = grads.iter().map(|g| g * g).sum::<f32>().sqrt();
    if max_norm > 0.0 && norm > max_norm {
        let scale = max_norm / norm;
        for g in grads.iter_mut() {
            *g *= scale;
        }
    }
    norm
}

impl Model for CharModel {
    fn step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f64, StepError> {
        self.check_batch(batch)?;

        let (loss, mut grads) = self.loss_and_grads(batch);
        if !loss.is_finite() {
            return Err(StepError::NonFiniteLoss(loss));
        }

        clip_by_global_norm(&mut grads, self.grad_clip);

        let lr = learning_rate as f32;
        for (p, g) in self.params.iter_mut().zip(grads.iter()) {
            *p -= lr * g;
        }
        Ok(loss)
    }

    fn snapshot_weights(&self) -> Result<Vec<u8>> {
        let blob = WeightsBlob {
            model_kind:  self.kind,
            vocab_size:  self.vocab_size,
            hidden_size: self.hidden_size,
            num_layers:  self.num_layers,
            params:      self.params.clone(),
        };
        serde_json::to_vec(&blob).context("Cannot serialise model weights")
    }

    fn restore_weights(&mut self, blob: &[u8]) -> Result<()> {
        let saved: WeightsBlob =
            serde_json::from_slice(blob).context("Cannot parse model weights")?;

        if saved.model_kind != self.kind
            || saved.vocab_size != self.vocab_size
            || saved.hidden_size != self.hidden_size
            || saved.num_layers != self.num_layers
        {
            bail!(
                "checkpoint was written by a {} model ({} symbols, hidden {}, {} layers), \
                 not a {} model ({} symbols, hidden {}, {} layers)",
                saved.model_kind, saved.vocab_size, saved.hidden_size, saved.num_layers,
                self.kind, self.vocab_size, self.hidden_size, self.num_layers,
            );
        }
        if saved.params.len() != self.params.len() {
            bail!(
                "checkpoint holds {} parameters, model expects {}",
                saved.params.len(),
                self.params.len()
            );
        }

        self.params = saved.params;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> CharModel {
        CharModel::new(ModelKind::Lstm, 3, 4, 2, 5.0, 7)
    }

    fn batch(inputs: Vec<usize>, targets: Vec<usize>) -> Batch {
        let seq_length = inputs.len();
        Batch { inputs, targets, batch_size: 1, seq_length }
    }

    #[test]
    fn test_initial_loss_is_near_uniform() {
        let m = model();
        let loss = m.loss(&batch(vec![0, 1, 2], vec![1, 2, 0])).unwrap();
        // ln(3) ≈ 1.0986 for a near-zero initialisation
        assert!((loss - 3f64.ln()).abs() < 0.1, "loss was {loss}");
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let mut m = model();
        let b = batch(vec![0, 1, 2, 0, 1, 2], vec![1, 2, 0, 1, 2, 0]);

        let first = m.step(&b, 0.5).unwrap();
        let mut last = first;
        for _ in 0..100 {
            last = m.step(&b, 0.5).unwrap();
        }
        assert!(last < first, "loss did not drop: {first} → {last}");
    }

    #[test]
    fn test_out_of_range_token_is_a_step_error() {
        let mut m = model();
        let err = m.step(&batch(vec![0, 3], vec![1, 2]), 0.1).unwrap_err();
        assert_eq!(err, StepError::TokenOutOfRange { id: 3, vocab_size: 3 });
    }

    #[test]
    fn test_shape_mismatch_is_a_step_error() {
        let mut m = model();
        let b = Batch { inputs: vec![0, 1], targets: vec![1], batch_size: 1, seq_length: 2 };
        assert_eq!(
            m.step(&b, 0.1).unwrap_err(),
            StepError::ShapeMismatch { inputs: 2, targets: 1 }
        );
    }

    #[test]
    fn test_snapshot_restores_identical_behaviour() {
        let mut trained = model();
        let b = batch(vec![0, 1, 2], vec![1, 2, 0]);
        for _ in 0..10 {
            trained.step(&b, 0.5).unwrap();
        }
        let blob = trained.snapshot_weights().unwrap();

        let mut fresh = CharModel::new(ModelKind::Lstm, 3, 4, 2, 5.0, 99);
        fresh.restore_weights(&blob).unwrap();
        assert_eq!(fresh.params, trained.params);
    }

    #[test]
    fn test_restore_rejects_other_shape() {
        let blob = model().snapshot_weights().unwrap();
        let mut wider = CharModel::new(ModelKind::Lstm, 3, 8, 2, 5.0, 7);
        let err = wider.restore_weights(&blob).unwrap_err();
        assert!(err.to_string().contains("hidden 4"));
    }

    #[test]
    fn test_clip_scales_to_max_norm() {
        let mut g = vec![3.0f32, 4.0];
        let norm  = clip_by_global_norm(&mut g, 1.0);
        assert!((norm - 5.0).abs() < 1e-6);
        assert!((g[0] - 0.6).abs() < 1e-6);
        assert!((g[1] - 0.8).abs() < 1e-6);
    }
}
