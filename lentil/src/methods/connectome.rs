use super::*;

/// Product of means for strength, mean of z-scores for specificity
pub struct Connectome;

impl ScoringFn for Connectome {
    fn required_stats(&self) -> StatSet {
        StatSet {
            zscores: true,
            ..Default::default()
        }
    }

    fn score(&self, input: &ScoreInput) -> MethodScores {
        let expr_prod = pairwise(&input.stats.means, input.candidates, |l, r| l * r);
        let scaled_weight = input
            .stats
            .zscores
            .as_ref()
            .map(|z| pairwise(z, input.candidates, |l, r| (l + r) / 2.0));

        MethodScores {
            magnitude: Some(expr_prod),
            specificity: scaled_weight,
            ..Default::default()
        }
    }
}
