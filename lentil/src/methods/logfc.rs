use super::*;

/// Average of one-vs-rest log2 fold changes
pub struct LogFc;

impl ScoringFn for LogFc {
    fn required_stats(&self) -> StatSet {
        StatSet {
            logfc: true,
            ..Default::default()
        }
    }

    fn score(&self, input: &ScoreInput) -> MethodScores {
        MethodScores {
            specificity: input
                .stats
                .logfc
                .as_ref()
                .map(|lfc| pairwise(lfc, input.candidates, |l, r| (l + r) / 2.0)),
            ..Default::default()
        }
    }
}
