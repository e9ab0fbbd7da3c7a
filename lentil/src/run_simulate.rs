use lentil::aggregate::{inverse_column, top_n};
use lentil::by_sample::{by_sample, Verbosity};
use lentil::common::*;
use lentil::method_meta::MethodRegistry;
use lentil::scorer::{InteractionScorer, LrPolicy, ScoreArgs};
use lentil::simulate::{generate_lr_data, SimArgs, GROUP_KEY, SAMPLE_KEY};

use clap::{ArgAction, Args};
use rayon::ThreadPoolBuilder;
use std::io::{BufWriter, Write};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, default_value_t = 3, help = "Number of cell groups")]
    groups: usize,

    #[arg(long, default_value_t = 30, help = "Cells per group")]
    cells_per_group: usize,

    #[arg(long, default_value_t = 1, help = "Number of samples")]
    samples: usize,

    #[arg(long, default_value_t = 20, help = "Genes without planted signal")]
    background_genes: usize,

    #[arg(long, default_value_t = 4, help = "Planted ligand-receptor pairs")]
    planted_pairs: usize,

    #[arg(long, default_value_t = 42, help = "Random seed of the simulation")]
    rseed: u64,

    #[arg(
        long,
        short = 'm',
        default_value = "cellphonedb",
        help = "Scoring method (see `lentil methods`)"
    )]
    method: String,

    #[arg(long, default_value_t = 1000, help = "Number of permutations")]
    n_perms: usize,

    #[arg(long, default_value_t = 1337, help = "Random seed of the permutations")]
    seed: u64,

    #[arg(
        long,
        default_value_t = 0.1,
        help = "Minimum fraction of expressing cells",
        long_help = "Minimum fraction of cells expressing the ligand in the source \n\
		     and the receptor in the target. 0 keeps everything."
    )]
    expr_prop: f32,

    #[arg(long, default_value_t = 5, help = "Minimum number of cells per group")]
    min_cells: usize,

    #[arg(
        long,
        default_value_t = false,
        help = "Keep undetected interactions with the worst scores"
    )]
    return_all_lrs: bool,

    #[arg(
        long,
        value_delimiter(','),
        help = "Supplementary columns, e.g., ligand_pvals,receptor_zscores"
    )]
    supp_columns: Vec<Box<str>>,

    #[arg(long, default_value_t = false, help = "Score every sample on its own")]
    by_sample: bool,

    #[arg(long, help = "Keep only the top N interactions")]
    top_n: Option<usize>,

    #[arg(
        long,
        help = "Column to rank interactions by",
        long_help = "Column to rank interactions by with --top-n. \n\
		     Defaults to the method's specificity, else its magnitude."
    )]
    orderby: Option<Box<str>>,

    #[arg(long, help = "Smaller `orderby` values are better")]
    orderby_ascending: Option<bool>,

    #[arg(long, value_delimiter(','), help = "Columns to -log10 transform")]
    inverse: Vec<Box<str>>,

    #[arg(
        long,
        default_value_t = 16,
        help = "Maximum number of threads",
        long_help = "Maximum number of threads to use for parallel processing. \n\
		     Choose the right number in HPC environments."
    )]
    max_threads: usize,

    #[arg(
        long,
        short,
        action = ArgAction::Count,
        help = "Verbosity; repeat (-vv) to show every sample's progress",
        long_help = "Verbosity. -v logs and shows progress bars; \n\
		     -vv also shows the progress of each sample with --by-sample."
    )]
    verbose: u8,
}

impl SimulateArgs {
    fn verbosity(&self) -> Verbosity {
        match self.verbose {
            0 => Verbosity::Off,
            1 => Verbosity::Progress,
            _ => Verbosity::Full,
        }
    }
}

/// Simulate a dataset, score it and print the result table to stdout
pub fn run_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    if args.verbose > 0 {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let max_threads = num_cpus::get().min(args.max_threads).max(1);
    ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());

    let registry = MethodRegistry::builtin();
    let method = registry.get(&args.method)?;
    info!("{}", method.describe());

    let mut sim = generate_lr_data(&SimArgs {
        groups: args.groups,
        cells_per_group: args.cells_per_group,
        samples: args.samples,
        background_genes: args.background_genes,
        planted_pairs: args.planted_pairs,
        rseed: args.rseed,
        ..Default::default()
    })?;

    for (source, target, pair) in sim.planted.iter() {
        info!(
            "planted: {} -> {} ({} -> {})",
            pair.ligand, pair.receptor, source, target
        );
    }

    let scorer = InteractionScorer::new(
        method,
        ScoreArgs {
            expr_prop: args.expr_prop,
            min_cells: args.min_cells,
            supp_columns: args.supp_columns.clone(),
            lr_policy: LrPolicy::from_return_all(args.return_all_lrs),
            verbose: args.verbosity() != Verbosity::Off,
            n_perms: args.n_perms,
            seed: args.seed,
            ..Default::default()
        },
    );

    let mut table = if args.by_sample {
        by_sample(
            &scorer,
            &mut sim.data,
            SAMPLE_KEY,
            GROUP_KEY,
            &sim.resource,
            args.verbosity(),
        )?
    } else {
        scorer.run(&sim.data, GROUP_KEY, &sim.resource)?
    };

    if let Some(n) = args.top_n {
        let default_order = method.specificity.as_ref().or(method.magnitude.as_ref());
        let orderby = match (&args.orderby, default_order) {
            (Some(col), _) => col.clone(),
            (None, Some(col)) => col.name.clone(),
            (None, None) => anyhow::bail!("`--orderby` must be provided with `--top-n`"),
        };
        let ascending = match (args.orderby_ascending, default_order) {
            (Some(asc), _) => asc,
            (None, Some(col)) if args.orderby.is_none() => col.ascending,
            _ => anyhow::bail!("`--orderby-ascending` must be provided with `--orderby`"),
        };
        top_n(&mut table, &orderby, n, ascending)?;
    }

    for col in args.inverse.iter() {
        inverse_column(&mut table, col)?;
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    table.write_tsv(&mut out)?;
    out.flush()?;

    info!("done");
    Ok(())
}
