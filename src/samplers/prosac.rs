//! PROSAC sampler: progressively grows the subset of high-quality points.

use crate::core::Sampler;
use crate::utils::UniformRandomGenerator;

/// Number of samples after which PROSAC behaves like uniform sampling.
pub const DEFAULT_RANSAC_CONVERGENCE_ITERATIONS: usize = 100_000;

/// PROSAC sampler: progressively grows the subset of high-quality points.
///
/// Correspondences are ordered once by decreasing quality score. The k-th
/// sample always contains the newest point of the current prefix plus
/// `m - 1` points drawn from the rest of the prefix; the prefix grows
/// following the PROSAC growth function until it spans every point, from
/// which on sampling is uniform.
pub struct ProsacSampler {
    rng: UniformRandomGenerator<usize>,
    ordering: Vec<usize>,
    growth_function: Vec<usize>,
    sample_size: Option<usize>,
    point_number: usize,
    ransac_convergence_iterations: usize,
    kth_sample_number: usize,
    subset_size: usize,
}

impl ProsacSampler {
    /// Sampler over correspondences with the given quality scores.
    pub fn new(quality_scores: &[f64]) -> Self {
        Self::with_rng(quality_scores, UniformRandomGenerator::new())
    }

    /// Construct from a fixed RNG seed (useful for tests).
    pub fn from_seed(quality_scores: &[f64], seed: u64) -> Self {
        Self::with_rng(quality_scores, UniformRandomGenerator::from_seed(seed))
    }

    pub fn with_seed(quality_scores: &[f64], seed: Option<u64>) -> Self {
        Self::with_rng(quality_scores, UniformRandomGenerator::with_seed(seed))
    }

    fn with_rng(quality_scores: &[f64], rng: UniformRandomGenerator<usize>) -> Self {
        let mut ordering: Vec<usize> = (0..quality_scores.len()).collect();
        // Stable, so equal scores keep their input order.
        ordering.sort_by(|&a, &b| quality_scores[b].total_cmp(&quality_scores[a]));
        Self {
            rng,
            ordering,
            growth_function: Vec::new(),
            sample_size: None,
            point_number: 0,
            ransac_convergence_iterations: DEFAULT_RANSAC_CONVERGENCE_ITERATIONS,
            kth_sample_number: 1,
            subset_size: 0,
        }
    }

    pub fn set_ransac_convergence_iterations(&mut self, iterations: usize) {
        self.ransac_convergence_iterations = iterations.max(1);
        self.sample_size = None;
    }

    /// Correspondence indices ordered by decreasing quality.
    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    /// Size of the prefix the next sample is drawn from.
    pub fn subset_size(&self) -> usize {
        self.subset_size
    }

    fn initialize(&mut self, point_number: usize, sample_size: usize) {
        self.point_number = point_number;
        self.sample_size = Some(sample_size);
        self.growth_function.clear();
        self.growth_function.resize(point_number, 0);

        // T_m: expected number of samples drawn only from the first m points.
        let mut t_n = self.ransac_convergence_iterations as f64;
        for i in 0..sample_size {
            t_n *= (sample_size - i) as f64 / (point_number - i) as f64;
        }

        let mut t_n_prime: usize = 1;
        for i in 0..point_number {
            if i < sample_size {
                self.growth_function[i] = t_n_prime;
                continue;
            }
            let t_n_plus1 = (i + 1) as f64 * t_n / (i + 1 - sample_size) as f64;
            self.growth_function[i] = t_n_prime + ((t_n_plus1 - t_n).ceil() as usize);
            t_n = t_n_plus1;
            t_n_prime = self.growth_function[i];
        }

        self.kth_sample_number = 1;
        self.subset_size = sample_size;
    }

    fn increment_iteration_number(&mut self) {
        self.kth_sample_number += 1;

        if self.kth_sample_number > self.ransac_convergence_iterations {
            self.subset_size = self.point_number;
        } else if self.subset_size < self.point_number
            && self.kth_sample_number > self.growth_function[self.subset_size - 1]
        {
            self.subset_size += 1;
        }
    }
}

impl Sampler for ProsacSampler {
    fn sample(
        &mut self,
        point_count: usize,
        sample_size: usize,
        out_indices: &mut [usize],
    ) -> bool {
        if sample_size == 0
            || point_count == 0
            || sample_size > point_count
            || point_count != self.ordering.len()
            || out_indices.len() < sample_size
        {
            return false;
        }

        if self.sample_size != Some(sample_size) || self.point_number != point_count {
            self.initialize(point_count, sample_size);
        }

        let out = &mut out_indices[..sample_size];
        if self.subset_size >= point_count {
            // Converged: plain uniform sampling over every point.
            self.rng.gen_unique(out, 0, point_count - 1);
        } else {
            // The newest point of the prefix plus m - 1 points before it.
            let newest = self.subset_size - 1;
            out[0] = newest;
            if sample_size > 1 {
                self.rng.gen_unique(&mut out[1..], 0, newest - 1);
            }
        }
        for idx in out.iter_mut() {
            *idx = self.ordering[*idx];
        }

        self.increment_iteration_number();
        true
    }

    fn reset(&mut self) {
        self.sample_size = None;
        self.kth_sample_number = 1;
    }
}
