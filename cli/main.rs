#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::Parser;
use mutgather::pipeline;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "mutgather",
    version,
    about = "Merge cross-validated mutation classifier outputs and estimate AUCs",
    long_about = "Collects the per-task, per-fold outputs of a mutation classifier run, \
                 checks them for completeness and consistency, merges them into run-wide \
                 tables and computes AUC views with bootstrap confidence intervals."
)]
struct Cli {
    /// Run directory containing `setup/` and `output/`
    #[arg(value_name = "RUN_DIR")]
    run_dir: PathBuf,

    /// Only merge the outputs of these task ids
    #[arg(long, value_name = "ID", num_args = 1..)]
    task_ids: Option<Vec<usize>>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli { run_dir, task_ids } = Cli::parse();
    let requested: Option<BTreeSet<usize>> = task_ids.map(|ids| ids.into_iter().collect());

    eprintln!("> Gathering classifier outputs from {}", run_dir.display());
    if let Some(tasks) = &requested {
        eprintln!("> Restricting to tasks {tasks:?}");
    }

    let start = Instant::now();
    match pipeline::run(&run_dir, requested.as_ref()) {
        Ok(outcome) => {
            eprintln!(
                "> Merged {} mutation types across {} folds in {:.2?}",
                outcome.mutation_types,
                outcome.folds,
                start.elapsed()
            );
            for path in &outcome.artifacts {
                eprintln!(">   {}", path.display());
            }
            eprintln!("> AUC summary: {}", outcome.summary.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
