use super::*;

/// SingleCellSignalR's LRscore, `sqrt(LR) / (sqrt(LR) + mu)` with `mu`
/// the mean of the expression matrix
pub struct SingleCellSignalR;

impl ScoringFn for SingleCellSignalR {
    fn score(&self, input: &ScoreInput) -> MethodScores {
        let mu = input.mat_mean;
        let lrscore = pairwise(&input.stats.means, input.candidates, |l, r| {
            let lr_sqrt = (l * r).sqrt();
            if lr_sqrt + mu > 0.0 {
                lr_sqrt / (lr_sqrt + mu)
            } else {
                0.0
            }
        });
        let nn = input.candidates.len();

        MethodScores {
            magnitude: Some(lrscore),
            specificity: None,
            extra: vec![("mat_mean".into(), vec![mu; nn])],
        }
    }
}
