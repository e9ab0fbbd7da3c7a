//! Repeat the interaction scoring independently within each sample.

use crate::common::*;
use crate::data::ExprData;
use crate::grouping::partition_by_membership;
use crate::resource::Resource;
use crate::scorer::InteractionScorer;
use crate::table::LrTable;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// How much a by-sample run reports while it works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Off,
    /// one tick per sample
    Progress,
    /// one tick per sample and every sample run's own progress
    Full,
}

/// Score every sample on its own cells and stack the results, each row
/// tagged with its sample. Samples run in category order; the first
/// failing sample aborts the whole run.
///
/// * `scorer`: configured single-dataset scorer
/// * `data`: expression data; a text `sample_key` becomes categorical in place
/// * `sample_key`: annotation with sample labels
/// * `groupby`: annotation with cell groups
/// * `resource`: ligand-receptor pairs
/// * `verbosity`: progress reporting
pub fn by_sample(
    scorer: &InteractionScorer,
    data: &mut ExprData,
    sample_key: &str,
    groupby: &str,
    resource: &Resource,
    verbosity: Verbosity,
) -> anyhow::Result<LrTable> {
    data.require_obs(sample_key)?;
    data.require_obs(groupby)?;
    data.ensure_categorical(sample_key)?;

    let (samples, codes) = data.categories(sample_key)?;
    let samples = samples.to_vec();
    let sample_cells = partition_by_membership(codes);

    let scorer = scorer.with_verbose(verbosity == Verbosity::Full);

    let pb = ProgressBar::new(samples.len() as u64).with_style(
        ProgressStyle::with_template("{msg} {bar:40} {pos}/{len} samples ({eta})")?
            .progress_chars("##-"),
    );
    if verbosity == Verbosity::Off {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut tables = Vec::with_capacity(samples.len());
    for (s, sample) in samples.iter().enumerate() {
        pb.set_message(format!("Now running: {}", sample));

        let cells = sample_cells.get(&s).map(|c| c.as_slice()).unwrap_or(&[]);
        debug!("sample `{}`: {} cells", sample, cells.len());

        let sample_data = data.subset_cells(cells);
        let table = scorer
            .run(&sample_data, groupby, resource)
            .map_err(|e| anyhow::anyhow!("sample `{}`: {}", sample, e))?;

        tables.push((sample.clone(), table));
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("scored {} samples by `{}`", samples.len(), sample_key);
    LrTable::concat_samples(sample_key, tables)
}
