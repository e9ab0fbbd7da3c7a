use super::*;

/// Product of means, and the product of each side's share of its
/// total mean across groups
pub struct Natmi;

impl ScoringFn for Natmi {
    fn score(&self, input: &ScoreInput) -> MethodScores {
        let means = &input.stats.means;
        let sums: Vec<f32> = means.row_iter().map(|row| row.sum()).collect();
        let share = |x: f32, s: f32| if s > 0.0 { x / s } else { 0.0 };

        let expr_prod = pairwise(means, input.candidates, |l, r| l * r);

        let mut ligand_sums = Vec::with_capacity(input.candidates.len());
        let mut receptor_sums = Vec::with_capacity(input.candidates.len());
        let mut spec_weight = Vec::with_capacity(input.candidates.len());

        for c in input.candidates {
            let (ls, rs) = (sums[c.ligand], sums[c.receptor]);
            ligand_sums.push(ls);
            receptor_sums.push(rs);
            spec_weight.push(share(c.ligand_of(means), ls) * share(c.receptor_of(means), rs));
        }

        MethodScores {
            magnitude: Some(expr_prod),
            specificity: Some(spec_weight),
            extra: vec![
                ("ligand_means_sums".into(), ligand_sums),
                ("receptor_means_sums".into(), receptor_sums),
            ],
        }
    }
}
