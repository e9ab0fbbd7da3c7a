//! Score every ligand-receptor pair across all ordered pairs of cell
//! groups within one dataset.

use crate::common::*;
use crate::data::{ExprData, MatrixSource};
use crate::de::{DifferentialExpression, OneVsRestTTest, DE_STATS};
use crate::grouping::Grouping;
use crate::method_meta::{MethodMeta, ScoreColumn};
use crate::methods::{Candidate, ScoreInput};
use crate::permutation::PermutationTest;
use crate::resource::{subunits, Resource};
use crate::stats::{EntityMatrix, GroupStats, StatSet, ENTITY_STATS};
use crate::table::{LrRow, LrTable};

/// What happens to interactions that fail the `expr_prop` threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LrPolicy {
    /// drop them
    #[default]
    DetectedOnly,
    /// keep them, but give them the worst magnitude and specificity
    /// observed among detected interactions
    AllWithWorstScore,
}

impl LrPolicy {
    pub fn from_return_all(return_all_lrs: bool) -> Self {
        if return_all_lrs {
            LrPolicy::AllWithWorstScore
        } else {
            LrPolicy::DetectedOnly
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoreArgs {
    /// minimum fraction of expressing cells for the ligand in the source
    /// and the receptor in the target; `0` disables the filter
    pub expr_prop: f32,
    /// groups with fewer cells are excluded
    pub min_cells: usize,
    /// base of the log transformation of the expression matrix
    pub base: f32,
    /// extra `ligand_*` / `receptor_*` columns
    pub supp_columns: Vec<Box<str>>,
    pub lr_policy: LrPolicy,
    pub source: MatrixSource,
    /// test behind differential expression supplementary columns
    pub de_method: Box<str>,
    pub verbose: bool,
    pub n_perms: usize,
    pub seed: u64,
}

impl Default for ScoreArgs {
    fn default() -> Self {
        Self {
            expr_prop: 0.1,
            min_cells: 5,
            base: std::f32::consts::E,
            supp_columns: vec![],
            lr_policy: LrPolicy::DetectedOnly,
            source: MatrixSource::X,
            de_method: "t-test".into(),
            verbose: false,
            n_perms: 1000,
            seed: 1337,
        }
    }
}

/// Side of an interaction a column refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ligand,
    Receptor,
}

/// Where the values of a `ligand_*` / `receptor_*` column come from
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnSource {
    Entity(Side, Box<str>),
    De(Side, Box<str>),
}

fn parse_side_column(name: &str) -> Option<(Side, &str)> {
    if let Some(stat) = name.strip_prefix("ligand_") {
        Some((Side::Ligand, stat))
    } else {
        name.strip_prefix("receptor_")
            .map(|stat| (Side::Receptor, stat))
    }
}

fn column_source(name: &str) -> Option<ColumnSource> {
    let (side, stat) = parse_side_column(name)?;
    if ENTITY_STATS.contains(&stat) {
        Some(ColumnSource::Entity(side, stat.into()))
    } else if DE_STATS.contains(&stat) {
        Some(ColumnSource::De(side, stat.into()))
    } else {
        None
    }
}

/// Scores one dataset with one method
pub struct InteractionScorer<'a> {
    method: &'a MethodMeta,
    args: ScoreArgs,
    de: &'a dyn DifferentialExpression,
}

impl<'a> InteractionScorer<'a> {
    pub fn new(method: &'a MethodMeta, args: ScoreArgs) -> Self {
        Self {
            method,
            args,
            de: &OneVsRestTTest,
        }
    }

    /// Use another differential expression provider for supplementary columns
    pub fn with_de(mut self, de: &'a dyn DifferentialExpression) -> Self {
        self.de = de;
        self
    }

    pub fn method(&self) -> &MethodMeta {
        self.method
    }

    /// The same scorer with its own progress bars on or off
    pub fn with_verbose(&self, verbose: bool) -> InteractionScorer<'a> {
        InteractionScorer {
            method: self.method,
            args: ScoreArgs {
                verbose,
                ..self.args.clone()
            },
            de: self.de,
        }
    }

    /// Columns of the result table, in order
    fn output_columns(&self) -> Vec<Box<str>> {
        let mut columns: Vec<Box<str>> = vec![
            "ligand_means".into(),
            "ligand_props".into(),
            "receptor_means".into(),
            "receptor_props".into(),
        ];
        let mut push = |c: &str| {
            if !columns.iter().any(|x| x.as_ref() == c) {
                columns.push(c.into());
            }
        };
        self.method.complex_cols.iter().for_each(|c| push(c));
        self.method.add_cols.iter().for_each(|c| push(c));
        self.method.score_columns().iter().for_each(|c| push(&c.name));
        self.args.supp_columns.iter().for_each(|c| push(c));
        columns
    }

    /// Fail before any computation on a misconfigured method or request
    fn validate(&self) -> anyhow::Result<()> {
        let meta = self.method;
        if meta.permute && meta.specificity.is_none() {
            anyhow::bail!(
                "{} requires permutations but declares no specificity column",
                meta.method_name
            );
        }
        if meta.magnitude.is_none() && meta.specificity.is_none() {
            anyhow::bail!("{} declares neither magnitude nor specificity", meta.method_name);
        }
        if self.args.n_perms == 0 && meta.permute {
            anyhow::bail!("{} needs at least one permutation", meta.method_name);
        }

        let method_cols: Vec<&str> = meta
            .add_cols
            .iter()
            .chain(meta.complex_cols.iter())
            .map(|c| c.as_ref())
            .chain(meta.score_columns().iter().map(|c| c.name.as_ref()))
            .collect();

        for col in self.args.supp_columns.iter() {
            if method_cols.contains(&col.as_ref()) {
                continue;
            }
            match column_source(col) {
                Some(ColumnSource::De(_, stat)) => {
                    if !self.de.stat_names().contains(&stat.as_ref()) {
                        anyhow::bail!(
                            "`{}` is not provided by the differential expression test",
                            col
                        );
                    }
                }
                Some(ColumnSource::Entity(..)) => {}
                None => anyhow::bail!(
                    "unsupported supplementary column `{}`; \
                     expected ligand_* or receptor_* of {:?} or {:?}",
                    col,
                    ENTITY_STATS,
                    DE_STATS
                ),
            }
        }
        Ok(())
    }

    /// optional statistics needed by the method, its extra columns and
    /// the supplementary columns
    fn required_stats(&self) -> StatSet {
        let columns = self
            .method
            .add_cols
            .iter()
            .chain(self.args.supp_columns.iter())
            .filter_map(|c| match column_source(c) {
                Some(ColumnSource::Entity(_, stat)) => Some(stat),
                _ => None,
            })
            .fold(StatSet::default(), |need, stat| need.with_stat(&stat));
        self.method.fun().required_stats().union(columns)
    }

    /// Score all interactions of `resource` across ordered pairs of
    /// `groupby` groups.
    ///
    /// * `data`: expression data
    /// * `groupby`: annotation key with cell groups
    /// * `resource`: ligand-receptor pairs
    pub fn run(
        &self,
        data: &ExprData,
        groupby: &str,
        resource: &Resource,
    ) -> anyhow::Result<LrTable> {
        self.validate()?;

        let args = &self.args;
        let meta = self.method;
        let columns = self.output_columns();

        let (levels, codes) = data.categories_coerced(groupby)?;

        let (gene_names, gene_mat) = data.matrix(&args.source)?;
        if gene_mat.iter().any(|&x| x < 0.0) {
            warn!("negative expression values; make sure that normalized counts are passed");
        }

        let grouping = Grouping::from_categories(&levels, &codes, args.min_cells);
        let resource = resource.resolve(gene_names);

        if resource.is_empty() || grouping.num_groups() == 0 {
            info!(
                "{} resolved pairs over {} groups; nothing to score",
                resource.len(),
                grouping.num_groups()
            );
            return Ok(LrTable::new(columns));
        }

        info!(
            "{}: {} pairs, {} groups, {} cells",
            meta.method_name,
            resource.len(),
            grouping.num_groups(),
            grouping.num_cells()
        );

        // entities in order of first appearance
        let mut entities: Vec<Box<str>> = vec![];
        let mut entity_pos: HashMap<Box<str>, usize> = HashMap::default();
        for name in resource
            .pairs()
            .iter()
            .flat_map(|p| [p.ligand.clone(), p.receptor.clone()])
        {
            if !entity_pos.contains_key(&name) {
                entity_pos.insert(name.clone(), entities.len());
                entities.push(name);
            }
        }

        let entity = EntityMatrix::aggregate(&entities, gene_names, gene_mat, grouping.cells())?;

        let need = self.required_stats();
        let ngroups = grouping.num_groups();
        let stats = GroupStats::compute(&entity.mat, grouping.labels(), ngroups, need, args.base);

        // ordered group pairs x interactions
        let mut candidates = vec![];
        let mut detected = vec![];
        for source in 0..ngroups {
            for target in 0..ngroups {
                for pair in resource.pairs() {
                    let c = Candidate {
                        source,
                        target,
                        ligand: entity_pos[&pair.ligand],
                        receptor: entity_pos[&pair.receptor],
                    };
                    let is_detected = c.ligand_of(&stats.props) >= args.expr_prop
                        && c.receptor_of(&stats.props) >= args.expr_prop;

                    if is_detected || args.lr_policy == LrPolicy::AllWithWorstScore {
                        candidates.push(c);
                        detected.push(is_detected);
                    }
                }
            }
        }

        if candidates.is_empty() {
            info!("no interaction passed the expression proportion threshold");
            return Ok(LrTable::new(columns));
        }

        let mat_mean = if grouping.num_cells() > 0 && !gene_names.is_empty() {
            grouping
                .cells()
                .iter()
                .map(|&j| gene_mat.column(j).sum() as f64)
                .sum::<f64>() as f32
                / (grouping.num_cells() * gene_names.len()) as f32
        } else {
            0.0
        };

        let fun = meta.fun();
        let mut scores = fun.score(&ScoreInput {
            stats: &stats,
            candidates: &candidates,
            mat_mean,
        });

        if meta.permute {
            let observed = fun.permutation_statistic(&stats, &candidates).ok_or_else(|| {
                anyhow::anyhow!("{} has no statistic to permute", meta.method_name)
            })?;

            let test = PermutationTest {
                n_perms: args.n_perms,
                seed: args.seed,
                alternative: meta.alternative,
                verbose: args.verbose,
            };

            info!("{} permutations...", args.n_perms);
            let pvalues = test.pvalues(&grouping, &observed, |labels| {
                let null_stats = GroupStats::compute(&entity.mat, labels, ngroups, need, args.base);
                fun.permutation_statistic(&null_stats, &candidates)
                    .ok_or_else(|| anyhow::anyhow!("missing permutation statistic"))
            })?;
            scores.specificity = Some(pvalues);
        }

        // worst-score substitution for undetected interactions
        if args.lr_policy == LrPolicy::AllWithWorstScore {
            if let (Some(col), Some(values)) = (&meta.magnitude, scores.magnitude.as_mut()) {
                assign_worst(col, values, &detected);
            }
            if let (Some(col), Some(values)) = (&meta.specificity, scores.specificity.as_mut()) {
                assign_worst(col, values, &detected);
            }
        }

        // column-wise values in output order
        let mut named: Vec<(Box<str>, Vec<f32>)> = vec![];
        if let (Some(col), Some(values)) = (&meta.magnitude, scores.magnitude) {
            named.push((col.name.clone(), values));
        }
        if let (Some(col), Some(values)) = (&meta.specificity, scores.specificity) {
            named.push((col.name.clone(), values));
        }
        named.extend(scores.extra);

        let de_table = self.de_lookup(&grouping, gene_names, gene_mat, &entity)?;

        let mut values_by_column: Vec<Vec<f32>> = Vec::with_capacity(columns.len());
        for col in columns.iter() {
            if let Some((_, values)) = named.iter().find(|(n, _)| n == col) {
                values_by_column.push(values.clone());
                continue;
            }
            let values: Vec<f32> = match column_source(col) {
                Some(ColumnSource::Entity(side, stat)) => {
                    let mat = stats.get(&stat).ok_or_else(|| {
                        anyhow::anyhow!("statistic `{}` was not computed", stat)
                    })?;
                    candidates.iter().map(|c| side_value(side, c, mat)).collect()
                }
                Some(ColumnSource::De(side, stat)) => {
                    let lookup = de_table.as_ref().ok_or_else(|| {
                        anyhow::anyhow!("no differential expression for `{}`", col)
                    })?;
                    let mat = lookup.stats.get(&stat).ok_or_else(|| {
                        anyhow::anyhow!(
                            "`{}` is not provided by the differential expression test",
                            stat
                        )
                    })?;
                    candidates
                        .iter()
                        .map(|c| lookup.value(side, c, mat))
                        .collect()
                }
                None => anyhow::bail!("{} does not produce column `{}`", meta.method_name, col),
            };
            values_by_column.push(values);
        }

        let group_names = grouping.names();
        let mut table = LrTable::new(columns);
        for (i, c) in candidates.iter().enumerate() {
            table.push(LrRow {
                sample: None,
                source: group_names[c.source].clone(),
                target: group_names[c.target].clone(),
                ligand_complex: entities[c.ligand].clone(),
                receptor_complex: entities[c.receptor].clone(),
                values: values_by_column.iter().map(|v| v[i]).collect(),
            })?;
        }
        table.sort_rows();

        info!("{} interactions scored", table.len());
        Ok(table)
    }

    /// Differential expression of the representative subunit of each
    /// entity, only when a supplementary column asks for it
    fn de_lookup(
        &self,
        grouping: &Grouping,
        gene_names: &[Box<str>],
        gene_mat: &Mat,
        entity: &EntityMatrix,
    ) -> anyhow::Result<Option<DeLookup>> {
        let wanted = self
            .args
            .supp_columns
            .iter()
            .any(|c| matches!(column_source(c), Some(ColumnSource::De(..))));
        if !wanted {
            return Ok(None);
        }

        info!("differential expression with `{}`", self.args.de_method);
        let x = gene_mat.select_columns(grouping.cells().iter());
        let de = self
            .de
            .rank_genes_groups(&x, gene_names, grouping, &self.args.de_method)?;

        let gene_pos: HashMap<&str, usize> = de
            .gene_names
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_ref(), i))
            .collect();

        // subunit with the lowest group mean stands for a complex
        let ngroups = grouping.num_groups();
        let gene_stats = GroupStats::compute(
            &x,
            grouping.labels(),
            ngroups,
            StatSet::default(),
            self.args.base,
        );
        let mut representative = vec![vec![0_usize; ngroups]; entity.num_entities()];
        for (e, name) in entity.names.iter().enumerate() {
            let rows: Vec<usize> = subunits(name)
                .iter()
                .map(|u| {
                    gene_pos.get(u).copied().ok_or_else(|| {
                        anyhow::anyhow!("`{}` missing from differential expression", u)
                    })
                })
                .collect::<anyhow::Result<_>>()?;
            for (k, rep) in representative[e].iter_mut().enumerate() {
                *rep = rows
                    .iter()
                    .copied()
                    .min_by(|&a, &b| gene_stats.means[(a, k)].total_cmp(&gene_stats.means[(b, k)]))
                    .unwrap_or(0);
            }
        }

        Ok(Some(DeLookup {
            stats: de.stats,
            representative,
        }))
    }
}

struct DeLookup {
    stats: HashMap<Box<str>, Mat>,
    /// entity x group -> gene row
    representative: Vec<Vec<usize>>,
}

impl DeLookup {
    fn value(&self, side: Side, c: &Candidate, mat: &Mat) -> f32 {
        let (e, k) = match side {
            Side::Ligand => (c.ligand, c.source),
            Side::Receptor => (c.receptor, c.target),
        };
        mat[(self.representative[e][k], k)]
    }
}

fn side_value(side: Side, c: &Candidate, mat: &Mat) -> f32 {
    match side {
        Side::Ligand => c.ligand_of(mat),
        Side::Receptor => c.receptor_of(mat),
    }
}

/// Overwrite undetected entries with the least favourable detected value
fn assign_worst(col: &ScoreColumn, values: &mut [f32], detected: &[bool]) {
    let detected_values = values
        .iter()
        .zip(detected)
        .filter(|(v, d)| **d && !v.is_nan())
        .map(|(&v, _)| v);

    let worst = if col.ascending {
        detected_values.fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v))))
    } else {
        detected_values.fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.min(v))))
    };

    if let Some(worst) = worst {
        values
            .iter_mut()
            .zip(detected)
            .filter(|(_, d)| !**d)
            .for_each(|(v, _)| *v = worst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObsColumn;
    use crate::de::DeResult;
    use crate::permutation::Alternative;
    use approx::assert_abs_diff_eq;

    #[test]
    fn side_columns_are_classified() {
        assert_eq!(
            column_source("ligand_means"),
            Some(ColumnSource::Entity(Side::Ligand, "means".into()))
        );
        assert_eq!(
            column_source("receptor_pvals"),
            Some(ColumnSource::De(Side::Receptor, "pvals".into()))
        );
        assert_eq!(column_source("lr_means"), None);
        assert_eq!(column_source("ligand_foo"), None);
    }

    #[test]
    fn worst_value_follows_direction() {
        let pvals = ScoreColumn::new("cellphone_pvals", true);
        let mut values = vec![0.01, 0.2, 0.0, 0.5];
        assign_worst(&pvals, &mut values, &[true, true, false, false]);
        assert_eq!(values, vec![0.01, 0.2, 0.2, 0.2]);

        let means = ScoreColumn::new("lr_means", false);
        let mut values = vec![3.0, 1.5, 9.0];
        assign_worst(&means, &mut values, &[true, true, false]);
        assert_eq!(values, vec![3.0, 1.5, 1.5]);
    }

    #[test]
    fn supplementary_columns_are_checked_upfront() {
        let registry = crate::method_meta::MethodRegistry::builtin();
        let meta = registry.get("natmi").unwrap();
        let args = ScoreArgs {
            supp_columns: vec!["ligand_whatever".into()],
            ..Default::default()
        };
        assert!(InteractionScorer::new(meta, args).validate().is_err());

        let args = ScoreArgs {
            supp_columns: vec!["ligand_pvals".into(), "receptor_zscores".into()],
            ..Default::default()
        };
        let scorer = InteractionScorer::new(meta, args);
        assert!(scorer.validate().is_ok());
        assert!(scorer.required_stats().zscores);

        // the method's own statistics are kept alongside the requested ones
        let args = ScoreArgs {
            supp_columns: vec!["receptor_logfc".into()],
            ..Default::default()
        };
        let scorer = InteractionScorer::new(registry.get("connectome").unwrap(), args);
        let need = scorer.required_stats();
        assert!(need.zscores && need.logfc && !need.trimean);
    }

    /// Reports the gene index as the p-value of every group
    struct GeneIndexDe;

    impl DifferentialExpression for GeneIndexDe {
        fn rank_genes_groups(
            &self,
            x: &Mat,
            gene_names: &[Box<str>],
            grouping: &Grouping,
            _de_method: &str,
        ) -> anyhow::Result<DeResult> {
            let pvals = Mat::from_fn(x.nrows(), grouping.num_groups(), |g, _| g as f32);
            let mut stats = HashMap::default();
            stats.insert("pvals".into(), pvals);
            Ok(DeResult {
                gene_names: gene_names.to_vec(),
                stats,
            })
        }

        fn stat_names(&self) -> &[&'static str] {
            &["pvals"]
        }
    }

    fn two_groups() -> ExprData {
        let genes: Vec<Box<str>> = vec!["A".into(), "B".into(), "C".into()];
        let cells: Vec<Box<str>> = (0..20).map(|j| format!("c{}", j).into_boxed_str()).collect();
        let x = Mat::from_fn(3, 20, |g, j| match (g, j < 10) {
            (0, true) => 4.0,
            (1, false) => 4.0,
            _ => 0.5 + (j % 3) as f32 * 0.1,
        });
        let mut data = ExprData::new(x, genes, cells).unwrap();
        let groups: Vec<&str> = (0..20).map(|j| if j < 10 { "a" } else { "b" }).collect();
        data.set_obs("cell_type", ObsColumn::text(&groups)).unwrap();
        data
    }

    #[test]
    fn injected_de_provider_fills_side_columns() {
        let registry = crate::method_meta::MethodRegistry::builtin();
        let args = ScoreArgs {
            supp_columns: vec!["ligand_pvals".into(), "receptor_pvals".into()],
            ..Default::default()
        };
        let resource = Resource::from_pairs(&[("A", "B"), ("C", "A")]);
        let data = two_groups();

        let scorer = InteractionScorer::new(registry.get("natmi").unwrap(), args.clone())
            .with_de(&GeneIndexDe);
        let table = scorer.run(&data, "cell_type", &resource).unwrap();
        assert!(!table.is_empty());

        let ligand = table.column_index("ligand_pvals").unwrap();
        let receptor = table.column_index("receptor_pvals").unwrap();
        let index = |name: &str| ["A", "B", "C"].iter().position(|&g| g == name).unwrap() as f32;
        for row in table.rows() {
            assert_eq!(row.values[ligand], index(row.ligand_complex.as_ref()));
            assert_eq!(row.values[receptor], index(row.receptor_complex.as_ref()));
        }

        // a statistic the provider does not report is rejected upfront
        let args = ScoreArgs {
            supp_columns: vec!["ligand_scores".into()],
            ..args
        };
        let scorer = InteractionScorer::new(registry.get("natmi").unwrap(), args)
            .with_de(&GeneIndexDe);
        let err = scorer.run(&data, "cell_type", &resource).unwrap_err();
        assert!(err.to_string().contains("ligand_scores"));
    }

    #[test]
    fn sidedness_follows_the_method() {
        let registry = crate::method_meta::MethodRegistry::builtin();
        let greater = registry.get("cellphonedb").unwrap().clone();
        let less = greater.clone().with_alternative(Alternative::Less);
        let two_sided = greater.clone().with_alternative(Alternative::TwoSided);

        let args = ScoreArgs {
            n_perms: 200,
            min_cells: 2,
            ..Default::default()
        };
        let resource = Resource::from_pairs(&[("A", "B")]);
        let data = two_groups();
        let pvals = |meta: &MethodMeta| {
            let table = InteractionScorer::new(meta, args.clone())
                .run(&data, "cell_type", &resource)
                .unwrap();
            table
                .rows()
                .iter()
                .find(|r| r.source.as_ref() == "a" && r.target.as_ref() == "b")
                .map(|r| r.values[table.column_index("cellphone_pvals").unwrap()])
                .unwrap()
        };

        // A is up in `a` and B is up in `b`
        let p_greater = pvals(&greater);
        let p_less = pvals(&less);
        assert!(p_greater < 0.05);
        assert!(p_less > 0.95);
        assert_abs_diff_eq!(
            pvals(&two_sided),
            (2.0 * p_greater.min(p_less)).min(1.0),
            epsilon = 1e-6
        );
    }
}
