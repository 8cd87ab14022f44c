/// Mini-batch scheduling and the train/dev split
use std::iter::FusedIterator;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Number of batches one pass over `num_examples` produces
///
/// The last batch of an epoch may be short, so this is `ceil(N / B)`.
pub fn batches_per_epoch(num_examples: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    (num_examples + batch_size - 1) / batch_size
}

/// Shuffle once and hold out the tail as the dev set
///
/// The dev set is the last `round(dev_fraction * N)` elements after the
/// shuffle; everything before it is the training set.
pub fn train_dev_split<T, R: Rng>(
    mut data: Vec<T>,
    dev_fraction: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    data.shuffle(rng);

    let dev_len = ((dev_fraction * data.len() as f64).round() as usize).min(data.len());
    let dev = data.split_off(data.len() - dev_len);

    (data, dev)
}

/// Lazy sequence of mini-batches over `num_epochs` passes of a dataset
///
/// Each epoch starts from a fresh permutation when shuffling is enabled, then
/// is cut into consecutive chunks of `batch_size`; the final chunk of an epoch
/// holds the remainder. The iterator is single-pass.
pub struct BatchIter<'a, T, R = StdRng> {
    data: &'a [T],
    batch_size: usize,
    num_epochs: usize,
    shuffle: bool,
    rng: R,
    order: Vec<usize>,
    epoch: usize,
    cursor: usize,
    emitted: usize,
}

impl<'a, T> BatchIter<'a, T, StdRng> {
    /// Batches in dataset order, for prediction
    pub fn sequential(data: &'a [T], batch_size: usize, num_epochs: usize) -> Self {
        Self::new(data, batch_size, num_epochs, false, StdRng::seed_from_u64(0))
    }
}

impl<'a, T, R: Rng> BatchIter<'a, T, R> {
    /// Create new batch iterator
    pub fn new(data: &'a [T], batch_size: usize, num_epochs: usize, shuffle: bool, rng: R) -> Self {
        let mut iter = Self {
            data,
            batch_size,
            num_epochs,
            shuffle,
            rng,
            order: Vec::new(),
            epoch: 0,
            cursor: 0,
            emitted: 0,
        };
        if iter.total_batches() > 0 {
            iter.start_epoch();
        }
        iter
    }

    /// Batches over the whole run: `num_epochs * ceil(N / B)`
    pub fn total_batches(&self) -> usize {
        self.num_epochs * batches_per_epoch(self.data.len(), self.batch_size)
    }

    fn start_epoch(&mut self) {
        self.order = (0..self.data.len()).collect();
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }
}

impl<'a, T, R: Rng> Iterator for BatchIter<'a, T, R> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.total_batches() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let data = self.data;
        let batch: Vec<&'a T> = self.order[self.cursor..end]
            .iter()
            .map(|&idx| &data[idx])
            .collect();

        self.cursor = end;
        self.emitted += 1;

        if self.cursor == self.order.len() {
            self.epoch += 1;
            if self.epoch < self.num_epochs {
                self.start_epoch();
            }
        }

        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_batches() - self.emitted;
        (remaining, Some(remaining))
    }
}

impl<'a, T, R: Rng> ExactSizeIterator for BatchIter<'a, T, R> {}

impl<'a, T, R: Rng> FusedIterator for BatchIter<'a, T, R> {}
