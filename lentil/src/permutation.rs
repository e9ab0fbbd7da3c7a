//! Empirical p-values against a label-permutation null.

use crate::common::*;
use crate::grouping::Grouping;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressDrawTarget};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Which tail of the null distribution counts as extreme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alternative {
    /// null values `>=` the observed value
    #[default]
    Greater,
    /// null values `<=` the observed value
    Less,
    /// twice the smaller one-sided p-value, capped at one
    TwoSided,
}

#[derive(Debug, Clone)]
pub struct PermutationTest {
    pub n_perms: usize,
    pub seed: u64,
    pub alternative: Alternative,
    pub verbose: bool,
}

impl Default for PermutationTest {
    fn default() -> Self {
        Self {
            n_perms: 1000,
            seed: 1337,
            alternative: Alternative::Greater,
            verbose: false,
        }
    }
}

/// Per-cell tallies of null values on either side of the observed one
#[derive(Debug, Clone, PartialEq)]
struct NullCounts {
    greater: Vec<u32>,
    less: Vec<u32>,
}

impl NullCounts {
    fn zeros(nn: usize) -> Self {
        Self {
            greater: vec![0; nn],
            less: vec![0; nn],
        }
    }

    fn add(&mut self, observed: &[f32], null: &[f32]) {
        for (i, (&obs, &x)) in observed.iter().zip(null.iter()).enumerate() {
            if x >= obs {
                self.greater[i] += 1;
            }
            if x <= obs {
                self.less[i] += 1;
            }
        }
    }

    fn merge(mut self, other: NullCounts) -> Self {
        self.greater
            .iter_mut()
            .zip(other.greater)
            .for_each(|(a, b)| *a += b);
        self.less
            .iter_mut()
            .zip(other.less)
            .for_each(|(a, b)| *a += b);
        self
    }
}

impl PermutationTest {
    /// Empirical p-value for each cell of `observed`,
    /// `(#extreme null values + 1) / (n_perms + 1)`.
    ///
    /// * `grouping`: the true labels; shuffles preserve group sizes
    /// * `observed`: statistic under the true labels
    /// * `statistic`: the same statistic recomputed from shuffled labels
    ///
    /// Permutation `i` draws from its own generator seeded with
    /// `seed + i` rather than from one generator advanced across all
    /// permutations, so the result does not depend on the thread count.
    /// The same `seed` still reproduces the same p-values, but they differ
    /// from a sequential single-stream shuffle with that seed.
    pub fn pvalues<F>(
        &self,
        grouping: &Grouping,
        observed: &[f32],
        statistic: F,
    ) -> anyhow::Result<Vec<f32>>
    where
        F: Fn(&[usize]) -> anyhow::Result<Vec<f32>> + Sync,
    {
        let nn = observed.len();

        let pb = ProgressBar::new(self.n_perms as u64);
        if !self.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let counts = (0..self.n_perms)
            .into_par_iter()
            .progress_with(pb.clone())
            .try_fold(
                || NullCounts::zeros(nn),
                |mut acc, i| -> anyhow::Result<NullCounts> {
                    let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                    let labels = grouping.shuffled_labels(&mut rng);
                    let null = statistic(&labels)?;
                    if null.len() != nn {
                        anyhow::bail!(
                            "permuted statistic has {} values, expected {}",
                            null.len(),
                            nn
                        );
                    }
                    acc.add(observed, &null);
                    Ok(acc)
                },
            )
            .try_reduce(|| NullCounts::zeros(nn), |a, b| Ok(a.merge(b)))?;

        pb.finish_and_clear();

        let denom = (self.n_perms + 1) as f32;
        let pvalues = observed
            .iter()
            .enumerate()
            .map(|(i, obs)| {
                if !obs.is_finite() {
                    return 1.0;
                }
                let p_greater = (counts.greater[i] + 1) as f32 / denom;
                let p_less = (counts.less[i] + 1) as f32 / denom;
                match self.alternative {
                    Alternative::Greater => p_greater,
                    Alternative::Less => p_less,
                    Alternative::TwoSided => (2.0 * p_greater.min(p_less)).min(1.0),
                }
            })
            .collect();

        Ok(pvalues)
    }
}
