//! Mergeable streaming quantile sketch.
//!
//! Log-bucketed relative-error sketch: a positive value `v` is counted in bin
//! `k = ceil(ln v / ln γ)` with `γ = (1 + α) / (1 - α)`, and every value in a
//! bin is represented by `2γ^k / (γ + 1)`, which is within `α` of the true
//! value. Memory is bounded by `max_bins`; past that the lowest bins collapse
//! into one, so accuracy degrades only at the low tail.
//!
//! Merging adds bin counts, so the merged sketch does not depend on the order
//! of inserts or merges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default relative accuracy (0.5%).
pub const DEFAULT_RELATIVE_ACCURACY: f64 = 0.005;

/// Default bin budget; at 0.5% this spans eight orders of magnitude.
pub const DEFAULT_MAX_BINS: usize = 2048;

/// Values at or below this are counted as zero.
const MIN_POSITIVE_VALUE: f64 = 1e-9;

/// Snapshot of the percentiles reported for a bucket or window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileSketch {
    relative_accuracy: f64,
    max_bins: usize,
    bins: BTreeMap<i32, u64>,
    zero_count: u64,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for QuantileSketch {
    fn default() -> Self {
        Self::new(DEFAULT_RELATIVE_ACCURACY, DEFAULT_MAX_BINS)
    }
}

impl QuantileSketch {
    /// `relative_accuracy` is clamped to `(0, 0.5]`; `max_bins` to at least 16.
    pub fn new(relative_accuracy: f64, max_bins: usize) -> Self {
        let relative_accuracy = if relative_accuracy.is_finite() {
            relative_accuracy.clamp(1e-4, 0.5)
        } else {
            DEFAULT_RELATIVE_ACCURACY
        };
        Self {
            relative_accuracy,
            max_bins: max_bins.max(16),
            bins: BTreeMap::new(),
            zero_count: 0,
            count: 0,
            sum: 0.0,
            min: 0.0,
            max: 0.0,
        }
    }

    fn gamma(&self) -> f64 {
        (1.0 + self.relative_accuracy) / (1.0 - self.relative_accuracy)
    }

    fn key(&self, value: f64) -> i32 {
        (value.ln() / self.gamma().ln()).ceil() as i32
    }

    fn bin_value(&self, key: i32) -> f64 {
        let gamma = self.gamma();
        2.0 * gamma.powi(key) / (gamma + 1.0)
    }

    /// Add one observation. Non-finite values are ignored; negatives count
    /// as zero.
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let value = value.max(0.0);

        if value <= MIN_POSITIVE_VALUE {
            self.zero_count += 1;
        } else {
            let key = self.key(value);
            *self.bins.entry(key).or_insert(0) += 1;
            self.collapse();
        }

        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Fold `other` into `self`.
    ///
    /// Both sketches should share a relative accuracy; the result keeps
    /// `self`'s parameters.
    pub fn merge(&mut self, other: &QuantileSketch) {
        if other.count == 0 {
            return;
        }
        for (key, count) in &other.bins {
            *self.bins.entry(*key).or_insert(0) += count;
        }
        self.collapse();

        if self.count == 0 {
            self.min = other.min;
            self.max = other.max;
        } else {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.zero_count += other.zero_count;
        self.count += other.count;
        self.sum += other.sum;
    }

    /// Fold the lowest bins together until the bin budget holds.
    fn collapse(&mut self) {
        while self.bins.len() > self.max_bins {
            let Some((_, lowest)) = self.bins.pop_first() else {
                return;
            };
            match self.bins.first_entry() {
                Some(mut next) => *next.get_mut() += lowest,
                None => return,
            }
        }
    }

    /// Estimated `q`-quantile, `q` in `[0, 1]`. `None` when empty.
    ///
    /// Returns the representative value of the bin holding the observation
    /// of rank `floor(q * (count - 1))`, clamped to the observed range.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.count == 0 || q.is_nan() {
            return None;
        }
        let q = q.clamp(0.0, 1.0);
        let rank = q * (self.count - 1) as f64;

        let mut cumulative = self.zero_count;
        if cumulative as f64 > rank {
            return Some(self.min.max(0.0));
        }
        for (key, count) in &self.bins {
            cumulative += count;
            if cumulative as f64 > rank {
                return Some(self.bin_value(*key).clamp(self.min, self.max));
            }
        }
        Some(self.max)
    }

    pub fn percentiles(&self) -> Option<Percentiles> {
        Some(Percentiles {
            p50: self.quantile(0.50)?,
            p95: self.quantile(0.95)?,
            p99: self.quantile(0.99)?,
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Number of non-empty bins (memory footprint).
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn relative_accuracy(&self) -> f64 {
        self.relative_accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const QUANTILES: [f64; 3] = [0.5, 0.95, 0.99];

    fn exact_quantile(sorted: &[f64], q: f64) -> f64 {
        let rank = (q * (sorted.len() - 1) as f64).floor() as usize;
        sorted[rank]
    }

    fn assert_within(sketch: &QuantileSketch, data: &[f64], tolerance: f64) {
        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for q in QUANTILES {
            let exact = exact_quantile(&sorted, q);
            let estimate = sketch.quantile(q).unwrap();
            let rel = (estimate - exact).abs() / exact;
            assert!(
                rel <= tolerance,
                "q={q} exact={exact} estimate={estimate} rel={rel}"
            );
        }
    }

    fn sketch_of(data: &[f64]) -> QuantileSketch {
        let mut sketch = QuantileSketch::default();
        for v in data {
            sketch.insert(*v);
        }
        sketch
    }

    fn uniform(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n).map(|_| rng.gen_range(1.0..300.0)).collect()
    }

    fn log_normal(rng: &mut StdRng, n: usize, mu: f64, sigma: f64) -> Vec<f64> {
        // Box-Muller
        (0..n)
            .map(|_| {
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen_range(0.0..1.0);
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                (mu + sigma * z).exp()
            })
            .collect()
    }

    fn bimodal(rng: &mut StdRng, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                if i % 5 == 0 {
                    rng.gen_range(120.0..180.0)
                } else {
                    rng.gen_range(2.0..8.0)
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_sketch() {
        let sketch = QuantileSketch::default();
        assert!(sketch.quantile(0.5).is_none());
        assert!(sketch.percentiles().is_none());
        assert!(sketch.mean().is_none());
    }

    #[test]
    fn test_single_value_is_exact() {
        let mut sketch = QuantileSketch::default();
        sketch.insert(47.0);
        for q in QUANTILES {
            assert_eq!(sketch.quantile(q), Some(47.0));
        }
        assert_eq!(sketch.mean(), Some(47.0));
    }

    #[test]
    fn test_zero_values() {
        let mut sketch = QuantileSketch::default();
        for _ in 0..10 {
            sketch.insert(0.0);
        }
        sketch.insert(10.0);
        assert_eq!(sketch.quantile(0.5), Some(0.0));
        let top = sketch.quantile(1.0).unwrap();
        assert!((top - 10.0).abs() <= 10.0 * DEFAULT_RELATIVE_ACCURACY);
        sketch.insert(f64::NAN);
        assert_eq!(sketch.count(), 11);
    }

    #[test]
    fn test_uniform_accuracy() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = uniform(&mut rng, 20_000);
        assert_within(&sketch_of(&data), &data, 0.01);
    }

    #[test]
    fn test_log_normal_accuracy() {
        let mut rng = StdRng::seed_from_u64(11);
        let data = log_normal(&mut rng, 20_000, 3.0, 1.0);
        assert_within(&sketch_of(&data), &data, 0.01);
    }

    #[test]
    fn test_bimodal_accuracy() {
        let mut rng = StdRng::seed_from_u64(13);
        let data = bimodal(&mut rng, 20_000);
        assert_within(&sketch_of(&data), &data, 0.01);
    }

    #[test]
    fn test_merge_disjoint_datasets() {
        let mut rng = StdRng::seed_from_u64(17);
        let parts = [
            uniform(&mut rng, 5_000),
            log_normal(&mut rng, 5_000, 2.5, 0.8),
            bimodal(&mut rng, 5_000),
        ];

        let mut merged = QuantileSketch::default();
        for part in &parts {
            merged.merge(&sketch_of(part));
        }
        let all: Vec<f64> = parts.concat();
        assert_eq!(merged.count(), all.len() as u64);
        assert_within(&merged, &all, 0.01);
    }

    #[test]
    fn test_merge_commutative_and_associative() {
        let mut rng = StdRng::seed_from_u64(23);
        let a = sketch_of(&uniform(&mut rng, 1_000));
        let b = sketch_of(&log_normal(&mut rng, 1_000, 1.0, 1.5));
        let c = sketch_of(&bimodal(&mut rng, 1_000));

        let mut ab_c = a.clone();
        ab_c.merge(&b);
        ab_c.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);

        let mut c_b_a = c.clone();
        c_b_a.merge(&b);
        c_b_a.merge(&a);

        for q in [0.1, 0.5, 0.9, 0.95, 0.99] {
            assert_eq!(ab_c.quantile(q), a_bc.quantile(q));
            assert_eq!(ab_c.quantile(q), c_b_a.quantile(q));
        }
        assert_eq!(ab_c.count(), 3_000);
    }

    #[test]
    fn test_insertion_order_independent() {
        let mut rng = StdRng::seed_from_u64(29);
        let mut data = log_normal(&mut rng, 5_000, 3.0, 1.2);
        let forward = sketch_of(&data);
        data.shuffle(&mut rng);
        let shuffled = sketch_of(&data);
        for q in QUANTILES {
            assert_eq!(forward.quantile(q), shuffled.quantile(q));
        }
    }

    #[test]
    fn test_bounded_bins() {
        let mut sketch = QuantileSketch::new(DEFAULT_RELATIVE_ACCURACY, 64);
        for i in 1..=100_000u32 {
            sketch.insert(f64::from(i) * 0.01);
        }
        assert!(sketch.bin_count() <= 64);
        assert_eq!(sketch.count(), 100_000);
        // High quantiles are unaffected by low-end collapse.
        let p99 = sketch.quantile(0.99).unwrap();
        assert!((p99 - 990.0).abs() / 990.0 <= 0.01);
    }
}
