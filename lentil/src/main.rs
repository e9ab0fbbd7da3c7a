mod run_simulate;

use crate::run_simulate::*;
use lentil::method_meta::MethodRegistry;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available scoring methods
    Methods,

    /// Simulate single-cell data with planted ligand-receptor
    /// interactions and score them
    Simulate(SimulateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Methods => {
            print!("{}", MethodRegistry::builtin().show_methods());
        }
        Commands::Simulate(args) => {
            run_simulate(args.clone())?;
        }
    }

    Ok(())
}
