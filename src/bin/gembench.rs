//! Solves an MDP file (or a generated MDP) and writes the optimal policy.
//!
//! Usage: gembench -m /path/to/model.POMDP -s vi|spvi [-t secs] [-o out.txt]

use std::process;

use log::{error, info};
use tracing_subscriber::filter::LevelFilter;

use mdp_solvers::mdp::{load_cassandra, random, DenseMdp, MdpDescription};
use mdp_solvers::output::save_solution;
use mdp_solvers::solvers::{SolveStatus, SolverConfig, SolverKind};
use mdp_solvers::timing::{measure_elapsed_time, Stopwatch};

/// Discount used for `-r` generated MDPs.
const RANDOM_DISCOUNT: f64 = 0.95;
const RANDOM_BRANCHING: usize = 8;

struct Args {
    mdp_file: Option<String>,
    random: Option<(usize, usize, u64)>,
    solver: Option<String>,
    output: Option<String>,
    max_time_secs: u64,
    parallel: bool,
    level: LevelFilter,
    help: bool,
}

fn print_usage() {
    println!("Example Usage:  gembench -m /path/to/my/foo.pomdp -s solver_name -o output_filename");
    println!("  -t Maximum time to try and solve an MDP, in seconds (0 = no limit)");
    println!("  -m Filename of the MDP to solve");
    println!("  -r <states>:<actions>[:seed] Solve a generated random MDP instead of a file");
    println!("  -s Name of the solver to use {{vi, spvi}}");
    println!("  -o Filename of the output to write");
    println!("  -p Run backup sweeps in parallel (RAYON_NUM_THREADS sets the thread count)");
    println!("  -v Verbose (per-iteration) logging, -q warnings only");
    println!("  --help [-h] print this help message");
    println!();
}

fn value_after(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Option {flag} requires a value");
        process::exit(1);
    })
}

fn parse_random_size(size: &str) -> Option<(usize, usize, u64)> {
    let parts: Vec<&str> = size.split(':').collect();
    match parts.as_slice() {
        [ns, na] => Some((ns.parse().ok()?, na.parse().ok()?, 0)),
        [ns, na, seed] => Some((ns.parse().ok()?, na.parse().ok()?, seed.parse().ok()?)),
        _ => None,
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        mdp_file: None,
        random: None,
        solver: None,
        output: None,
        max_time_secs: 0,
        parallel: false,
        level: LevelFilter::INFO,
        help: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-m" => {
                i += 1;
                parsed.mdp_file = Some(value_after(&args, i, "-m"));
            }
            "-r" => {
                i += 1;
                let size = value_after(&args, i, "-r");
                parsed.random = Some(parse_random_size(&size).unwrap_or_else(|| {
                    eprintln!("Invalid -r value: {size} (expected <states>:<actions>[:seed])");
                    process::exit(1);
                }));
            }
            "-s" => {
                i += 1;
                parsed.solver = Some(value_after(&args, i, "-s"));
            }
            "-o" => {
                i += 1;
                parsed.output = Some(value_after(&args, i, "-o"));
            }
            "-t" => {
                i += 1;
                let value = value_after(&args, i, "-t");
                parsed.max_time_secs = value.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid -t value: {value}");
                    process::exit(1);
                });
            }
            "-p" => parsed.parallel = true,
            "-v" => parsed.level = LevelFilter::DEBUG,
            "-q" => parsed.level = LevelFilter::WARN,
            "-h" | "--help" => parsed.help = true,
            other => {
                eprintln!("Ignoring unknown option: {other}");
            }
        }
        i += 1;
    }
    parsed
}

fn main() {
    let args = parse_args();
    tracing_subscriber::fmt()
        .with_max_level(args.level)
        .with_target(false)
        .init();

    if args.help || args.solver.is_none() {
        print_usage();
        return;
    }
    let solver_name = args.solver.as_deref().unwrap_or_default();
    if let Some(path) = &args.mdp_file {
        println!("MDP Name = {path}");
    }
    println!("Solver Name = {solver_name}");
    if args.max_time_secs != 0 {
        println!("Max Solver Time = {} [s]", args.max_time_secs);
    }

    let kind: SolverKind = match solver_name.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{solver_name} solver not supported: {e}");
            process::exit(1);
        }
    };

    let loaded = match (&args.mdp_file, args.random) {
        (Some(path), _) => load_cassandra(path).map(|mdp| (mdp, path.clone())),
        (None, Some((ns, na, seed))) => {
            random::generate(ns, na, RANDOM_DISCOUNT, RANDOM_BRANCHING, seed)
                .map(|mdp| (mdp, format!("random({ns}x{na}, seed {seed})")))
        }
        (None, None) => {
            print_usage();
            return;
        }
    };
    let (mdp, mdp_name): (DenseMdp, String) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("failed to load MDP: {e}");
            process::exit(1);
        }
    };
    println!("MDP file parsing complete: {mdp_name}");

    info!("Ns={}, Na={}", mdp.num_states(), mdp.num_actions());

    let solver = kind.build::<f32>(SolverConfig::default().parallel(args.parallel));
    let stopwatch = Stopwatch::start();
    let start = stopwatch.timestamp();
    let solution = match solver.solve(&mdp, args.max_time_secs) {
        Ok(solution) => solution,
        Err(e) => {
            error!("solver {} failed: {e}", solver.name());
            process::exit(1);
        }
    };

    match solution.status {
        SolveStatus::Completed => println!(
            "Solver={}, MDP={} (Ns={},Na={}), Time={:.6}[s], Iterations={}",
            solver.name(),
            mdp_name,
            mdp.num_states(),
            mdp.num_actions(),
            measure_elapsed_time(&start, &stopwatch.timestamp()),
            solution.iterations
        ),
        SolveStatus::TimedOut => println!(
            "Solver={}, MDP={}, Halted after {} [s]",
            solver.name(),
            mdp_name,
            args.max_time_secs
        ),
    }

    if let Some(path) = &args.output {
        if let Err(e) = save_solution(path, &solution) {
            eprintln!("Unable to store output in {path}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_random_size() {
        assert_eq!(parse_random_size("100:4"), Some((100, 4, 0)));
        assert_eq!(parse_random_size("100:4:9"), Some((100, 4, 9)));
        assert_eq!(parse_random_size("100"), None);
        assert_eq!(parse_random_size("a:4"), None);
    }
}
