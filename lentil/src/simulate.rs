use crate::common::*;
use crate::data::{ExprData, ObsColumn};
use crate::resource::{LrPair, Resource};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

pub struct SimArgs {
    pub groups: usize,
    pub cells_per_group: usize,
    pub samples: usize,
    /// genes without any planted signal
    pub background_genes: usize,
    /// ligand-receptor pairs with planted signal
    pub planted_pairs: usize,
    /// Poisson rate of background expression
    pub base_rate: f64,
    /// Poisson rate of a planted gene in its group
    pub planted_rate: f64,
    pub rseed: u64,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            groups: 3,
            cells_per_group: 30,
            samples: 1,
            background_genes: 20,
            planted_pairs: 4,
            base_rate: 0.3,
            planted_rate: 5.0,
            rseed: 42,
        }
    }
}

pub struct SimOut {
    /// log1p counts with `cell_type` and `sample` annotations
    pub data: ExprData,
    /// planted pairs followed by background decoys
    pub resource: Resource,
    /// (source, target, pair) of every planted interaction
    pub planted: Vec<(Box<str>, Box<str>, LrPair)>,
}

pub const GROUP_KEY: &str = "cell_type";
pub const SAMPLE_KEY: &str = "sample";

/// Generate a dataset with planted ligand-receptor signal
///
/// Planted pair `k` has its ligand up in group `k % G` and its receptor
/// up in group `(k + 1) % G`; the receptor of pair 0 is a two-subunit
/// complex.
///
/// ```text
/// Y(g,j) ~ Poisson( planted_rate if g is up in group(j) else base_rate )
/// X(g,j) = ln(1 + Y(g,j))
/// ```
pub fn generate_lr_data(args: &SimArgs) -> anyhow::Result<SimOut> {
    if args.groups == 0 || args.cells_per_group == 0 {
        anyhow::bail!("need at least one group with at least one cell");
    }

    let ngroups = args.groups;
    let nsamples = args.samples.max(1);
    let ncells = ngroups * args.cells_per_group;

    let mut gene_names: Vec<Box<str>> = vec![];
    // gene index -> group where it is up
    let mut up_in: Vec<Option<usize>> = vec![];
    let mut pairs = vec![];
    let mut planted = vec![];

    let group_names: Vec<Box<str>> = (0..ngroups)
        .map(|k| format!("ct{}", k).into_boxed_str())
        .collect();

    for k in 0..args.planted_pairs {
        let source = k % ngroups;
        let target = (k + 1) % ngroups;

        let ligand: Box<str> = format!("L{}", k).into();
        gene_names.push(ligand.clone());
        up_in.push(Some(source));

        let receptor: Box<str> = if k == 0 {
            for unit in ["R0A", "R0B"] {
                gene_names.push(unit.into());
                up_in.push(Some(target));
            }
            format!("R0A{}R0B", COMPLEX_SEP).into()
        } else {
            let name: Box<str> = format!("R{}", k).into();
            gene_names.push(name.clone());
            up_in.push(Some(target));
            name
        };

        let pair = LrPair {
            ligand,
            receptor,
        };
        planted.push((
            group_names[source].clone(),
            group_names[target].clone(),
            pair.clone(),
        ));
        pairs.push(pair);
    }

    for g in 0..args.background_genes {
        gene_names.push(format!("G{}", g).into());
        up_in.push(None);
    }

    // decoys between consecutive background genes
    for g in (0..args.background_genes.saturating_sub(1)).step_by(2) {
        pairs.push(LrPair::new(&format!("G{}", g), &format!("G{}", g + 1)));
    }

    let labels: Vec<usize> = (0..ncells).map(|j| j % ngroups).collect();
    let samples: Vec<usize> = (0..ncells).map(|j| (j / ngroups) % nsamples).collect();

    let high = Poisson::new(args.planted_rate).map_err(|e| anyhow::anyhow!("{}", e))?;
    let low = Poisson::new(args.base_rate).map_err(|e| anyhow::anyhow!("{}", e))?;

    let ngenes = gene_names.len();
    let columns: Vec<Vec<f32>> = (0..ncells)
        .into_par_iter()
        .map(|j| {
            let mut rng = StdRng::seed_from_u64(args.rseed.wrapping_add(j as u64));
            up_in
                .iter()
                .map(|up| {
                    let y: f64 = if *up == Some(labels[j]) {
                        high.sample(&mut rng)
                    } else {
                        low.sample(&mut rng)
                    };
                    (y as f32).ln_1p()
                })
                .collect()
        })
        .collect();
    let x = Mat::from_iterator(ngenes, ncells, columns.into_iter().flatten());

    let cell_names: Vec<Box<str>> = (0..ncells)
        .map(|j| format!("cell{}", j).into_boxed_str())
        .collect();

    let mut data = ExprData::new(x, gene_names, cell_names)?;

    let sample_names: Vec<Box<str>> = (0..nsamples)
        .map(|s| format!("s{}", s + 1).into_boxed_str())
        .collect();
    let group_text: Vec<&str> = labels.iter().map(|&k| group_names[k].as_ref()).collect();
    let sample_text: Vec<&str> = samples.iter().map(|&s| sample_names[s].as_ref()).collect();
    data.set_obs(GROUP_KEY, ObsColumn::categorical(&group_text, &group_names)?)?;
    data.set_obs(SAMPLE_KEY, ObsColumn::categorical(&sample_text, &sample_names)?)?;

    info!(
        "simulated {} genes x {} cells, {} groups, {} samples, {} planted pairs",
        ngenes,
        ncells,
        ngroups,
        nsamples,
        planted.len()
    );

    Ok(SimOut {
        data,
        resource: Resource::new(pairs),
        planted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planted_genes_are_up_in_their_group() {
        let sim = generate_lr_data(&SimArgs {
            samples: 2,
            ..Default::default()
        })
        .unwrap();

        let data = &sim.data;
        assert_eq!(data.num_cells(), 90);
        assert_eq!(sim.planted.len(), 4);
        assert_eq!(sim.resource.pairs()[0].receptor.as_ref(), "R0A_R0B");

        let (levels, codes) = data.categories(SAMPLE_KEY).unwrap();
        assert_eq!(levels.len(), 2);
        assert!(codes.iter().any(|&s| s == 1));

        let (_, x) = data.matrix(&Default::default()).unwrap();
        let (_, groups) = data.categories(GROUP_KEY).unwrap();
        let mean_in = |g: usize, k: usize| {
            let v: Vec<f32> = (0..x.ncols())
                .filter(|&j| groups[j] == k)
                .map(|j| x[(g, j)])
                .collect();
            v.iter().sum::<f32>() / v.len() as f32
        };
        // L0 is up in ct0 and not in ct1
        assert!(mean_in(0, 0) > 2.0 * mean_in(0, 1));

        let again = generate_lr_data(&SimArgs {
            samples: 2,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(again.data.matrix(&Default::default()).unwrap().1, x);
    }
}
