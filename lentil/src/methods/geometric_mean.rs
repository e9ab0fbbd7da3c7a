use super::*;

/// Geometric mean of ligand and receptor means, tested against shuffled labels
pub struct GeometricMean;

fn lr_gmeans(stats: &GroupStats, candidates: &[Candidate]) -> Vec<f32> {
    pairwise(&stats.means, candidates, |l, r| (l * r).sqrt())
}

impl ScoringFn for GeometricMean {
    fn score(&self, input: &ScoreInput) -> MethodScores {
        MethodScores {
            magnitude: Some(lr_gmeans(input.stats, input.candidates)),
            ..Default::default()
        }
    }

    fn permutation_statistic(
        &self,
        stats: &GroupStats,
        candidates: &[Candidate],
    ) -> Option<Vec<f32>> {
        Some(lr_gmeans(stats, candidates))
    }
}
