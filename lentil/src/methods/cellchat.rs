use super::*;

/// Hill-type interaction probability of trimean expression,
/// `LR / (kh + LR)`, tested against shuffled labels
pub struct CellChat;

const KH: f32 = 0.5;

fn lr_probs(stats: &GroupStats, candidates: &[Candidate]) -> Option<Vec<f32>> {
    stats.trimean.as_ref().map(|tri| {
        pairwise(tri, candidates, |l, r| {
            let lr = l * r;
            lr / (KH + lr)
        })
    })
}

impl ScoringFn for CellChat {
    fn required_stats(&self) -> StatSet {
        StatSet {
            trimean: true,
            ..Default::default()
        }
    }

    fn score(&self, input: &ScoreInput) -> MethodScores {
        MethodScores {
            magnitude: lr_probs(input.stats, input.candidates),
            ..Default::default()
        }
    }

    fn permutation_statistic(
        &self,
        stats: &GroupStats,
        candidates: &[Candidate],
    ) -> Option<Vec<f32>> {
        lr_probs(stats, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn probability_is_bounded() {
        let x = Mat::from_row_slice(2, 4, &[0., 1., 4., 4., 2., 2., 0., 0.]);
        let stats = GroupStats::compute(&x, &[0, 0, 1, 1], 2, CellChat.required_stats(), 2.0);
        let candidates = [
            Candidate {
                source: 1,
                target: 0,
                ligand: 0,
                receptor: 1,
            },
            Candidate {
                source: 0,
                target: 1,
                ligand: 0,
                receptor: 1,
            },
        ];
        let probs = lr_probs(&stats, &candidates).unwrap();
        // ligand trimean in group 1 is 1, receptor trimean in group 0 is 0.5
        assert_abs_diff_eq!(probs[0], 0.5 / (KH + 0.5));
        assert_abs_diff_eq!(probs[1], 0.0);
        assert!(probs.iter().all(|&p| (0.0..1.0).contains(&p)));
    }
}
