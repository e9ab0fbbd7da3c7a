//! Per-cell expression of ligand/receptor entities (genes or complexes)
//! and their per-group summary statistics.

use crate::common::*;
use crate::resource::subunits;

/// Entities (genes or complexes) x cells.
///
/// A complex is expressed in a cell at the level of its weakest
/// subunit: `x(complex, j) = min_s x(s, j)`.
#[derive(Debug, Clone)]
pub struct EntityMatrix {
    pub names: Vec<Box<str>>,
    pub mat: Mat,
}

impl EntityMatrix {
    /// * `entities`: gene or complex names; every subunit must be in `gene_names`
    /// * `gene_names`: row names of `gene_mat`
    /// * `gene_mat`: `gene x cell` expression
    /// * `cells`: columns of `gene_mat` in scope
    pub fn aggregate(
        entities: &[Box<str>],
        gene_names: &[Box<str>],
        gene_mat: &Mat,
        cells: &[usize],
    ) -> anyhow::Result<Self> {
        let gene_pos: HashMap<&str, usize> = gene_names
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_ref(), i))
            .collect();

        let rows = entities
            .iter()
            .map(|e| {
                subunits(e)
                    .into_iter()
                    .map(|u| {
                        gene_pos
                            .get(u)
                            .copied()
                            .ok_or_else(|| anyhow::anyhow!("unresolved subunit `{}` in `{}`", u, e))
                    })
                    .collect::<anyhow::Result<Vec<usize>>>()
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut mat = Mat::zeros(entities.len(), cells.len());
        for (jj, &j) in cells.iter().enumerate() {
            let x_j = gene_mat.column(j);
            for (e, subunit_rows) in rows.iter().enumerate() {
                mat[(e, jj)] = subunit_rows
                    .iter()
                    .map(|&i| x_j[i])
                    .fold(f32::INFINITY, f32::min);
            }
        }

        Ok(Self {
            names: entities.to_vec(),
            mat,
        })
    }

    pub fn num_entities(&self) -> usize {
        self.names.len()
    }
}

/// Which optional statistics to compute; means and proportions are
/// always there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatSet {
    pub zscores: bool,
    pub logfc: bool,
    pub trimean: bool,
}

impl StatSet {
    pub fn union(self, other: StatSet) -> StatSet {
        StatSet {
            zscores: self.zscores || other.zscores,
            logfc: self.logfc || other.logfc,
            trimean: self.trimean || other.trimean,
        }
    }

    /// the flag that makes `stat` available, if it is an optional one
    pub fn with_stat(self, stat: &str) -> StatSet {
        let mut ret = self;
        match stat {
            "zscores" => ret.zscores = true,
            "logfc" => ret.logfc = true,
            "trimean" => ret.trimean = true,
            _ => {}
        }
        ret
    }
}

/// names of the per-group entity statistics
pub const ENTITY_STATS: [&str; 5] = ["means", "props", "zscores", "logfc", "trimean"];

/// `entity x group` summaries under one labelling of the cells
#[derive(Debug, Clone)]
pub struct GroupStats {
    /// mean expression
    pub means: Mat,
    /// fraction of cells with non-zero expression
    pub props: Mat,
    /// group mean of cell-wise standardized expression
    pub zscores: Option<Mat>,
    /// one-vs-rest log2 fold change on the de-logged scale
    pub logfc: Option<Mat>,
    /// Tukey's trimean of max-scaled expression
    pub trimean: Option<Mat>,
}

impl GroupStats {
    /// * `x`: `entity x cell`
    /// * `labels`: group index of each cell
    /// * `ngroups`: number of groups
    /// * `need`: optional statistics
    /// * `base`: base of the log transformation applied to `x`
    pub fn compute(x: &Mat, labels: &[usize], ngroups: usize, need: StatSet, base: f32) -> Self {
        let ne = x.nrows();
        let mut sums = Mat::zeros(ne, ngroups);
        let mut nnz = Mat::zeros(ne, ngroups);
        let mut sizes = vec![0_f32; ngroups];

        for (j, &k) in labels.iter().enumerate() {
            sizes[k] += 1.0;
            let x_j = x.column(j);
            for (e, &x_ej) in x_j.iter().enumerate() {
                sums[(e, k)] += x_ej;
                if x_ej != 0.0 {
                    nnz[(e, k)] += 1.0;
                }
            }
        }

        let mut means = sums;
        let mut props = nnz;
        for (k, &n_k) in sizes.iter().enumerate() {
            let denom = n_k.max(1.0);
            let mut mean_k = means.column_mut(k);
            mean_k /= denom;
            let mut prop_k = props.column_mut(k);
            prop_k /= denom;
        }

        let zscores = need.zscores.then(|| standardized_means(x, &means));
        let logfc = need.logfc.then(|| one_vs_rest_log2fc(x, labels, &sizes, base));
        let trimean = need.trimean.then(|| group_trimeans(x, labels, ngroups));

        Self {
            means,
            props,
            zscores,
            logfc,
            trimean,
        }
    }

    /// Look up a statistic by name
    pub fn get(&self, stat: &str) -> Option<&Mat> {
        match stat {
            "means" => Some(&self.means),
            "props" => Some(&self.props),
            "zscores" => self.zscores.as_ref(),
            "logfc" => self.logfc.as_ref(),
            "trimean" => self.trimean.as_ref(),
            _ => None,
        }
    }
}

/// `(mean_k - mu) / sd` for each entity, with `mu` and `sd` over all cells
fn standardized_means(x: &Mat, means: &Mat) -> Mat {
    let nn = x.ncols() as f32;
    let mut ret = means.clone();
    for e in 0..x.nrows() {
        let x_e = x.row(e);
        let mu = x_e.sum() / nn.max(1.0);
        let ss = x_e.iter().map(|&v| (v - mu).powi(2)).sum::<f32>();
        let sd = (ss / (nn - 1.0).max(1.0)).sqrt();
        for k in 0..means.ncols() {
            ret[(e, k)] = if sd > 0.0 {
                (means[(e, k)] - mu) / sd
            } else {
                0.0
            };
        }
    }
    ret
}

/// `log2(mean(base^x - 1 | group) + eps) - log2(mean(base^x - 1 | rest) + eps)`
fn one_vs_rest_log2fc(x: &Mat, labels: &[usize], sizes: &[f32], base: f32) -> Mat {
    const EPS: f32 = 1e-9;
    let ln_base = base.ln();
    let ngroups = sizes.len();
    let ntot: f32 = sizes.iter().sum();

    let mut sums = Mat::zeros(x.nrows(), ngroups);
    for (j, &k) in labels.iter().enumerate() {
        for (e, &x_ej) in x.column(j).iter().enumerate() {
            sums[(e, k)] += (x_ej * ln_base).exp_m1();
        }
    }

    let mut ret = Mat::zeros(x.nrows(), ngroups);
    for e in 0..x.nrows() {
        let total: f32 = sums.row(e).sum();
        for k in 0..ngroups {
            let n_rest = ntot - sizes[k];
            let crit = sums[(e, k)] / sizes[k].max(1.0);
            let rest = if n_rest > 0.0 {
                (total - sums[(e, k)]) / n_rest
            } else {
                0.0
            };
            ret[(e, k)] = (crit + EPS).log2() - (rest + EPS).log2();
        }
    }
    ret
}

/// `(q1 + 2 * median + q3) / 4` within each group after scaling the
/// whole matrix by its maximum
fn group_trimeans(x: &Mat, labels: &[usize], ngroups: usize) -> Mat {
    let xmax = x.max();
    let scale = if xmax > 0.0 { 1.0 / xmax } else { 1.0 };

    let mut members: Vec<Vec<usize>> = vec![vec![]; ngroups];
    labels
        .iter()
        .enumerate()
        .for_each(|(j, &k)| members[k].push(j));

    let mut ret = Mat::zeros(x.nrows(), ngroups);
    let mut buf = vec![];
    for e in 0..x.nrows() {
        for (k, cells) in members.iter().enumerate() {
            buf.clear();
            buf.extend(cells.iter().map(|&j| x[(e, j)] * scale));
            buf.sort_by(|a, b| a.total_cmp(b));
            ret[(e, k)] = (quantile_sorted(&buf, 0.25)
                + 2.0 * quantile_sorted(&buf, 0.5)
                + quantile_sorted(&buf, 0.75))
                / 4.0;
        }
    }
    ret
}

/// linear interpolation between closest ranks
fn quantile_sorted(sorted: &[f32], q: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f32;
    let lb = pos.floor() as usize;
    let ub = pos.ceil() as usize;
    let w = pos - lb as f32;
    sorted[lb] * (1.0 - w) + sorted[ub] * w
}
