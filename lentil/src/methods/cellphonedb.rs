use super::*;

/// Mean of ligand and receptor means, tested against shuffled labels
pub struct CellPhoneDb;

fn lr_means(stats: &GroupStats, candidates: &[Candidate]) -> Vec<f32> {
    pairwise(&stats.means, candidates, |l, r| (l + r) / 2.0)
}

impl ScoringFn for CellPhoneDb {
    fn score(&self, input: &ScoreInput) -> MethodScores {
        MethodScores {
            magnitude: Some(lr_means(input.stats, input.candidates)),
            ..Default::default()
        }
    }

    fn permutation_statistic(
        &self,
        stats: &GroupStats,
        candidates: &[Candidate],
    ) -> Option<Vec<f32>> {
        Some(lr_means(stats, candidates))
    }
}
