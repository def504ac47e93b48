use bayes_mapper::io::{read_tree, write_tree};
use bayes_mapper::{BranchLengthStyle, MapperConfig, MapperError, TreeFormat, TreeIndex, reconcile};
use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use std::time::Instant;

/// Label the internal branches of an ML tree with "bootstrap/posterior"
/// pairs taken from a Bayesian tree of the same taxa.
#[derive(Parser, Debug)]
#[command(
    name = "bayes-mapper",
    version,
    about = "Map Bayesian posterior probabilities onto ML bootstrap trees"
)]
struct Args {
    /// Path to the ML tree (bootstrap supports)
    #[arg(short = 'm', long = "ml-tree")]
    ml_tree: PathBuf,

    /// Path to the Bayesian tree (posterior probabilities)
    #[arg(short = 'b', long = "bayes-tree")]
    bayes_tree: PathBuf,

    /// Format of both input trees and of the output
    #[arg(short = 'f', long = "tree-format", value_enum, default_value_t = TreeFormat::Newick)]
    tree_format: TreeFormat,

    /// Output path for the relabelled ML tree (".gz" compresses)
    #[arg(short = 'o', long = "out")]
    out: PathBuf,

    /// Minimum bootstrap value (0-100) for a branch to keep its label
    #[arg(long = "min-bp", default_value_t = 0, allow_negative_numbers = true)]
    min_bp: i64,

    /// Minimum posterior probability (0-1) for a branch to keep its label
    #[arg(long = "min-pp", default_value_t = 0.0, allow_negative_numbers = true)]
    min_pp: f64,

    /// How branch lengths are written: scientific (1.000000e-01) | plain (0.1)
    #[arg(long = "branch-length-format", value_enum, default_value_t = BranchLengthStyle::Scientific)]
    branch_length_format: BranchLengthStyle,

    /// Quiet mode: only warnings and errors are logged
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

/// `-v/--version` instead of clap's `-V`.
fn command() -> clap::Command {
    Args::command().disable_version_flag(true).arg(
        Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Print version"),
    )
}

fn parse_args() -> Args {
    let mut cmd = command();
    if std::env::args_os().len() <= 1 {
        // help on stdout, exit 0
        if let Err(e) = cmd.print_help() {
            eprintln!("{e}");
            std::process::exit(1);
        }
        std::process::exit(0);
    }
    let matches = cmd.try_get_matches().unwrap_or_else(|e| e.exit());
    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .format_timestamp(None)
        .init();
}

fn run(config: &MapperConfig) -> Result<(), MapperError> {
    let t0 = Instant::now();
    let mut ml = read_tree(&config.ml_tree, config.format)?;
    log::info!(
        "Reading ML tree {:?} ({} taxa) {:.3}s",
        config.ml_tree,
        ml.leaf_names().len(),
        t0.elapsed().as_secs_f64()
    );

    let t1 = Instant::now();
    let bayes = read_tree(&config.bayes_tree, config.format)?;
    log::info!(
        "Reading Bayesian tree {:?} ({} taxa) {:.3}s",
        config.bayes_tree,
        bayes.leaf_names().len(),
        t1.elapsed().as_secs_f64()
    );

    let t2 = Instant::now();
    let index = TreeIndex::build(&bayes);
    log::info!(
        "Indexing {} Bayesian bipartitions {:.3}s",
        index.len(),
        t2.elapsed().as_secs_f64()
    );

    let t3 = Instant::now();
    let summary = reconcile(&mut ml, &index, &config.thresholds);
    log::info!(
        "Reconciling {:.3}s: {} labelled, {} matched, {} unmatched, {} below thresholds, {} skipped",
        t3.elapsed().as_secs_f64(),
        summary.annotated,
        summary.matched,
        summary.unmatched,
        summary.filtered,
        summary.skipped
    );

    let t4 = Instant::now();
    write_tree(&ml, &config.out, config.format, config.branch_lengths)?;
    log::info!("Writing to output {:?} {:.3}s", config.out, t4.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    let args = parse_args();
    init_logging(args.quiet);

    let result = MapperConfig::new(
        args.ml_tree,
        args.bayes_tree,
        args.tree_format,
        args.out,
        args.min_bp,
        args.min_pp,
        args.branch_length_format,
    )
    .and_then(|config| run(&config));

    if let Err(e) = result {
        eprintln!("bayes-mapper: {e}");
        std::process::exit(e.exit_code());
    }
}
