// ============================================================
// Layer 4 — Character Batcher
// ============================================================
// Implements the BatchSource trait over an encoded corpus.
//
// Layout:
//   1. Truncate the token stream to a whole number of batches:
//        n = num_batches * batch_size * seq_length
//   2. Targets are inputs shifted left by one; the final target
//      wraps around to the first input token
//   3. Split the stream into `batch_size` contiguous rows
//   4. Batch b is column-slice b of every row:
//
//        row 0: [ b0 | b1 | b2 | ... ]
//        row 1: [ b0 | b1 | b2 | ... ]
//        ...
//
//   Consecutive batches therefore continue each row's text,
//   which is what a recurrent model expects.

use crate::domain::error::TrainError;
use crate::domain::traits::{Batch, BatchSource};

/// Fixed-shape batches over one encoded corpus.
#[derive(Debug, Clone)]
pub struct CharBatcher {
    inputs:      Vec<usize>,
    targets:     Vec<usize>,
    batch_size:  usize,
    seq_length:  usize,
    num_batches: usize,
    cursor:      usize,
}

impl CharBatcher {
    /// Build batches from already-encoded token ids.
    ///
    /// Fails with `EmptyCorpus` if not even one batch fits.
    pub fn new(tokens: &[usize], batch_size: usize, seq_length: usize) -> Result<Self, TrainError> {
        let per_batch   = batch_size * seq_length;
        let num_batches = if per_batch == 0 { 0 } else { tokens.len() / per_batch };

        if num_batches == 0 {
            return Err(TrainError::EmptyCorpus { batch_size, seq_length });
        }

        let inputs: Vec<usize> = tokens[..num_batches * per_batch].to_vec();
        let mut targets = Vec::with_capacity(inputs.len());
        targets.extend_from_slice(&inputs[1..]);
        targets.push(inputs[0]);

        tracing::debug!(
            "Batcher ready: {} batches of {}x{} ({} tokens dropped)",
            num_batches,
            batch_size,
            seq_length,
            tokens.len() - inputs.len()
        );

        Ok(Self { inputs, targets, batch_size, seq_length, num_batches, cursor: 0 })
    }

    /// Gather column-slice `b` of every row
    fn slice(&self, data: &[usize], b: usize) -> Vec<usize> {
        let row_len = self.num_batches * self.seq_length;
        let mut out = Vec::with_capacity(self.batch_size * self.seq_length);
        for row in 0..self.batch_size {
            let start = row * row_len + b * self.seq_length;
            out.extend_from_slice(&data[start..start + self.seq_length]);
        }
        out
    }
}

impl BatchSource for CharBatcher {
    fn num_batches(&self) -> usize {
        self.num_batches
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn next_batch(&mut self) -> Option<Batch> {
        if self.cursor >= self.num_batches {
            return None;
        }
        let b = self.cursor;
        self.cursor += 1;

        Some(Batch {
            inputs:     self.slice(&self.inputs, b),
            targets:    self.slice(&self.targets, b),
            batch_size: self.batch_size,
            seq_length: self.seq_length,
        })
    }
}
