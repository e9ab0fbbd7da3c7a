//! Post-processing of result tables for display: label filters, top-N
//! interactions, predicate filters and `-log10` rescaling.

use crate::common::*;
use crate::table::LrTable;

use num_traits::Float;
use std::cmp::Ordering;

/// Which group column a label filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelType {
    Source,
    Target,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Source => "source",
            LabelType::Target => "target",
        }
    }
}

/// Keep rows whose source (or target) is one of `labels`. Every label
/// must occur in the table.
pub fn filter_labels<S: AsRef<str>>(
    table: &mut LrTable,
    labels: &[S],
    label_type: LabelType,
) -> anyhow::Result<()> {
    let label_of = |row: &crate::table::LrRow| -> Box<str> {
        match label_type {
            LabelType::Source => row.source.clone(),
            LabelType::Target => row.target.clone(),
        }
    };

    let present: HashSet<Box<str>> = table.rows().iter().map(label_of).collect();
    let missing: Vec<&str> = labels
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| !present.contains(*l))
        .collect();

    if !missing.is_empty() {
        anyhow::bail!(
            "{:?} not found in the `{}` column",
            missing,
            label_type.as_str()
        );
    }

    let wanted: HashSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
    table.retain(|row| wanted.contains(label_of(row).as_ref()));
    Ok(())
}

/// Aggregate a column per interaction, minimum if `ascending`, maximum
/// otherwise, and return interactions best first. NaN values are
/// skipped; interactions without a value come last.
pub fn aggregate_scores(
    table: &LrTable,
    column: &str,
    ascending: bool,
) -> anyhow::Result<Vec<(String, f32)>> {
    let i = table.column_index(column)?;

    let mut scores: HashMap<String, f32> = HashMap::default();
    for row in table.rows() {
        let v = row.values[i];
        let score = scores.entry(row.interaction()).or_insert(f32::NAN);
        if v.is_nan() {
            continue;
        }
        *score = if score.is_nan() {
            v
        } else if ascending {
            score.min(v)
        } else {
            score.max(v)
        };
    }

    let mut ret: Vec<(String, f32)> = scores.into_iter().collect();
    ret.sort_by(|(a_name, a), (b_name, b)| {
        let by_score = match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if ascending => a.total_cmp(b),
            (false, false) => b.total_cmp(a),
        };
        by_score.then_with(|| a_name.cmp(b_name))
    });
    Ok(ret)
}

/// Keep all rows of the `n` best interactions by their aggregated `column`
pub fn top_n(table: &mut LrTable, column: &str, n: usize, ascending: bool) -> anyhow::Result<()> {
    let top: HashSet<String> = aggregate_scores(table, column, ascending)?
        .into_iter()
        .take(n)
        .map(|(name, _)| name)
        .collect();
    table.retain(|row| top.contains(&row.interaction()));
    Ok(())
}

/// Keep all rows of every interaction with at least one row whose
/// `column` value satisfies `pred`
pub fn filter_by<F>(table: &mut LrTable, column: &str, pred: F) -> anyhow::Result<()>
where
    F: Fn(f32) -> bool,
{
    let i = table.column_index(column)?;
    let relevant: HashSet<String> = table
        .rows()
        .iter()
        .filter(|row| pred(row.values[i]))
        .map(|row| row.interaction())
        .collect();
    table.retain(|row| relevant.contains(&row.interaction()));
    Ok(())
}

/// `-log10(x + eps)`
pub fn inverse_scores<T: Float>(x: T) -> T {
    -(x + T::epsilon()).log10()
}

/// `-log10` a column in place, at double precision
pub fn inverse_column(table: &mut LrTable, column: &str) -> anyhow::Result<()> {
    table.map_column(column, |v| inverse_scores(v as f64) as f32)
}

fn require_column(table: &LrTable, what: &str, column: Option<&str>) -> anyhow::Result<Box<str>> {
    let column = column.ok_or_else(|| anyhow::anyhow!("`{}` must be provided", what))?;
    table.column_index(column)?;
    Ok(column.into())
}

/// What goes into a source-faceted dotplot
#[derive(Clone, Copy, Default)]
pub struct DotplotArgs<'a> {
    /// column mapped to the colour of the dots
    pub colour: Option<&'a str>,
    /// column mapped to the size of the dots
    pub size: Option<&'a str>,
    pub source_labels: Option<&'a [&'a str]>,
    pub target_labels: Option<&'a [&'a str]>,
    /// keep the `top_n` interactions by `orderby`
    pub top_n: Option<usize>,
    pub orderby: Option<&'a str>,
    pub orderby_ascending: Option<bool>,
    /// keep interactions where the column passes the predicate somewhere
    pub filter_by: Option<(&'a str, &'a (dyn Fn(f32) -> bool + Sync))>,
    pub inverse_colour: bool,
    pub inverse_size: bool,
}

/// Source/target filters shared by both dotplots
fn prep_table(
    table: &LrTable,
    colour: Option<&str>,
    size: Option<&str>,
    source_labels: Option<&[&str]>,
    target_labels: Option<&[&str]>,
) -> anyhow::Result<(LrTable, Box<str>, Box<str>)> {
    let colour = require_column(table, "colour", colour)?;
    let size = require_column(table, "size", size)?;

    let mut ret = table.clone();
    if let Some(labels) = source_labels {
        filter_labels(&mut ret, labels, LabelType::Source)?;
    }
    if let Some(labels) = target_labels {
        filter_labels(&mut ret, labels, LabelType::Target)?;
    }
    Ok((ret, colour, size))
}

fn apply_inverse(
    table: &mut LrTable,
    colour: &str,
    size: &str,
    inverse_colour: bool,
    inverse_size: bool,
) -> anyhow::Result<()> {
    if inverse_colour {
        inverse_column(table, colour)?;
    }
    // the same column may serve both aesthetics
    if inverse_size && !(inverse_colour && colour == size) {
        inverse_column(table, size)?;
    }
    Ok(())
}

/// Rows to draw in a dotplot of interactions by source and target
pub fn prep_dotplot(table: &LrTable, args: &DotplotArgs) -> anyhow::Result<LrTable> {
    let (mut ret, colour, size) = prep_table(
        table,
        args.colour,
        args.size,
        args.source_labels,
        args.target_labels,
    )?;

    if let Some((column, pred)) = args.filter_by {
        filter_by(&mut ret, column, pred)?;
    }

    if let Some(n) = args.top_n {
        let orderby = args
            .orderby
            .ok_or_else(|| anyhow::anyhow!("`orderby` must be provided with `top_n`"))?;
        let ascending = args
            .orderby_ascending
            .ok_or_else(|| anyhow::anyhow!("`orderby_ascending` must be provided with `top_n`"))?;
        top_n(&mut ret, orderby, n, ascending)?;
    }

    apply_inverse(&mut ret, &colour, &size, args.inverse_colour, args.inverse_size)?;
    Ok(ret)
}

/// What goes into a dotplot of interactions faceted by sample
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleDotplotArgs<'a> {
    pub colour: Option<&'a str>,
    pub size: Option<&'a str>,
    pub source_labels: Option<&'a [&'a str]>,
    pub target_labels: Option<&'a [&'a str]>,
    pub ligand_complex: Option<&'a [&'a str]>,
    pub receptor_complex: Option<&'a [&'a str]>,
    pub inverse_colour: bool,
    pub inverse_size: bool,
}

/// Rows to draw in a by-sample dotplot; the table must carry samples
pub fn prep_dotplot_by_sample(
    table: &LrTable,
    args: &SampleDotplotArgs,
) -> anyhow::Result<LrTable> {
    if table.sample_key().is_none() {
        anyhow::bail!("the table has no sample column; score it by sample first");
    }

    let (mut ret, colour, size) = prep_table(
        table,
        args.colour,
        args.size,
        args.source_labels,
        args.target_labels,
    )?;

    if let Some(ligands) = args.ligand_complex {
        ret.retain(|row| ligands.contains(&row.ligand_complex.as_ref()));
    }
    if let Some(receptors) = args.receptor_complex {
        ret.retain(|row| receptors.contains(&row.receptor_complex.as_ref()));
    }

    apply_inverse(&mut ret, &colour, &size, args.inverse_colour, args.inverse_size)?;
    Ok(ret)
}
