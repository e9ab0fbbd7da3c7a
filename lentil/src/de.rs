//! One-vs-rest differential expression used by `ligand_*` / `receptor_*`
//! supplementary columns.

use crate::common::*;
use crate::grouping::Grouping;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// statistics a differential expression test may report
pub const DE_STATS: [&str; 4] = ["scores", "logfoldchanges", "pvals", "pvals_adj"];

/// `gene x group` matrices keyed by statistic name
#[derive(Debug, Clone)]
pub struct DeResult {
    pub gene_names: Vec<Box<str>>,
    pub stats: HashMap<Box<str>, Mat>,
}

impl DeResult {
    pub fn get(&self, stat: &str) -> Option<&Mat> {
        self.stats.get(stat)
    }
}

/// Rank genes of each group against all other cells
pub trait DifferentialExpression: Sync {
    /// * `x`: `gene x cell`, aligned with `grouping.labels()`
    /// * `gene_names`: row names of `x`
    /// * `grouping`: group of each column
    /// * `de_method`: name of the test
    fn rank_genes_groups(
        &self,
        x: &Mat,
        gene_names: &[Box<str>],
        grouping: &Grouping,
        de_method: &str,
    ) -> anyhow::Result<DeResult>;

    /// statistics available in [`DeResult::stats`]
    fn stat_names(&self) -> &[&'static str] {
        &DE_STATS
    }
}

/// Benjamini-Hochberg adjusted p-values, in input order
pub fn p_adjust_bh(pvals: &[f64]) -> Vec<f64> {
    let n = pvals.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| pvals[b].total_cmp(&pvals[a]));

    let mut ret = vec![1.0; n];
    let mut running = 1.0_f64;
    for (i, &g) in order.iter().enumerate() {
        let rank = (n - i) as f64;
        running = running.min(pvals[g] * n as f64 / rank);
        ret[g] = running.min(1.0);
    }
    ret
}

struct Moments {
    n: f64,
    mean: f64,
    var: f64,
}

fn moments<I: Iterator<Item = f64>>(values: I) -> Moments {
    let (mut n, mut s, mut ss) = (0.0, 0.0, 0.0);
    for v in values {
        n += 1.0;
        s += v;
        ss += v * v;
    }
    let mean = if n > 0.0 { s / n } else { 0.0 };
    let var = if n > 1.0 {
        ((ss - n * mean * mean) / (n - 1.0)).max(0.0)
    } else {
        0.0
    };
    Moments { n, mean, var }
}

/// Welch's t-test of each group against the rest, with `t-test` and
/// `t-test_overestim_var` flavours
#[derive(Debug, Clone, Copy, Default)]
pub struct OneVsRestTTest;

impl DifferentialExpression for OneVsRestTTest {
    fn rank_genes_groups(
        &self,
        x: &Mat,
        gene_names: &[Box<str>],
        grouping: &Grouping,
        de_method: &str,
    ) -> anyhow::Result<DeResult> {
        let overestimate_var = match de_method {
            "t-test" => false,
            "t-test_overestim_var" => true,
            _ => anyhow::bail!(
                "unsupported differential expression method `{}`; \
                 use `t-test` or `t-test_overestim_var`",
                de_method
            ),
        };

        let labels = grouping.labels();
        if x.ncols() != labels.len() {
            anyhow::bail!("{} columns for {} labelled cells", x.ncols(), labels.len());
        }
        if x.nrows() != gene_names.len() {
            anyhow::bail!("{} rows for {} gene names", x.nrows(), gene_names.len());
        }

        let ngenes = x.nrows();
        let ngroups = grouping.num_groups();

        let mut scores = Mat::zeros(ngenes, ngroups);
        let mut lfc = Mat::zeros(ngenes, ngroups);
        let mut pvals = Mat::from_element(ngenes, ngroups, 1.0);
        let mut pvals_adj = Mat::from_element(ngenes, ngroups, 1.0);

        for k in 0..ngroups {
            let mut pv_k = Vec::with_capacity(ngenes);
            for g in 0..ngenes {
                let x_g = x.row(g);
                let group = moments(
                    x_g.iter()
                        .zip(labels)
                        .filter(|(_, l)| **l == k)
                        .map(|(&v, _)| v as f64),
                );
                let rest = moments(
                    x_g.iter()
                        .zip(labels)
                        .filter(|(_, l)| **l != k)
                        .map(|(&v, _)| v as f64),
                );

                // over-estimated variance divides the rest's variance by the group size
                let n_rest_var = if overestimate_var { group.n } else { rest.n };

                let (t, p) = if group.n > 1.0 && rest.n > 1.0 {
                    let a = group.var / group.n;
                    let b = rest.var / n_rest_var.max(1.0);
                    let se = (a + b).sqrt();
                    if se > 0.0 {
                        let t = (group.mean - rest.mean) / se;
                        let df = (a + b).powi(2)
                            / (a.powi(2) / (group.n - 1.0) + b.powi(2) / (rest.n - 1.0));
                        let dist = StudentsT::new(0.0, 1.0, df.max(1.0))?;
                        (t, 2.0 * dist.sf(t.abs()))
                    } else {
                        (0.0, 1.0)
                    }
                } else {
                    (0.0, 1.0)
                };

                scores[(g, k)] = t as f32;
                lfc[(g, k)] = ((group.mean.exp_m1() + 1e-9).log2()
                    - (rest.mean.exp_m1() + 1e-9).log2()) as f32;
                pvals[(g, k)] = p as f32;
                pv_k.push(p);
            }

            for (g, p) in p_adjust_bh(&pv_k).into_iter().enumerate() {
                pvals_adj[(g, k)] = p as f32;
            }
        }

        let mut stats = HashMap::default();
        stats.insert("scores".into(), scores);
        stats.insert("logfoldchanges".into(), lfc);
        stats.insert("pvals".into(), pvals);
        stats.insert("pvals_adj".into(), pvals_adj);

        Ok(DeResult {
            gene_names: gene_names.to_vec(),
            stats,
        })
    }
}
