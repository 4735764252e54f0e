//! Sable Benchmark CLI
//!
//! Command-line interface for running the dispatch micro-benchmarks with
//! individual optimizations switched on or off.

use benchmarks::{micro, runner};
use clap::Parser as ClapParser;
use core_types::OptimizationFlags;
use std::process;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Only run benchmarks whose name contains this text
    #[arg(help = "Substring filter on benchmark names")]
    filter: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Runs per benchmark, averaged
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Entries per send site before it goes generic
    #[arg(long)]
    cache_size: Option<usize>,

    /// Dispatch every send through full lookup
    #[arg(long)]
    no_inline_caching: bool,

    /// Never install specialized arithmetic nodes
    #[arg(long)]
    no_eager_specialization: bool,

    /// Keep control-structure blocks as real closures
    #[arg(long)]
    no_block_inlining: bool,

    /// Invoke getters, setters and constant methods normally
    #[arg(long)]
    no_trivial_inlining: bool,

    /// Look up every global read in the globals table
    #[arg(long)]
    no_global_caching: bool,

    /// Check slot kinds on every local read
    #[arg(long)]
    no_specialized_variables: bool,
}

impl Cli {
    /// Flags from the environment, overridden by command-line switches
    fn flags(&self) -> OptimizationFlags {
        let mut flags = OptimizationFlags::from_env();
        if let Some(size) = self.cache_size {
            flags = flags.with_inline_cache_size(size);
        }
        if self.no_inline_caching {
            flags = flags.with_inline_caching(false);
        }
        if self.no_eager_specialization {
            flags = flags.with_eager_specialization(false);
        }
        if self.no_block_inlining {
            flags = flags.with_block_inlining(false);
        }
        if self.no_trivial_inlining {
            flags = flags.with_trivial_method_inlining(false);
        }
        if self.no_global_caching {
            flags = flags.with_global_caching(false);
        }
        if self.no_specialized_variables {
            flags = flags.with_specialized_variables(false);
        }
        flags
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let flags = cli.flags();
    log::info!("running with {:?}", flags);

    let benchmarks: Vec<_> = micro::create_benchmarks()
        .into_iter()
        .filter(|b| cli.filter.as_ref().map_or(true, |f| b.name.contains(f.as_str())))
        .collect();
    if benchmarks.is_empty() {
        eprintln!("Error: No benchmark matches the filter");
        process::exit(1);
    }

    if !cli.json {
        println!("Running {} micro-benchmark(s)...\n", benchmarks.len());
    }
    let results: Vec<_> = benchmarks
        .iter()
        .map(|b| b.run_multiple(flags, cli.iterations))
        .collect();

    if cli.json {
        match runner::format_results_json(&results) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error formatting JSON: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", runner::format_results(&results));

        // Summary statistics
        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;
        let total_time: f64 = results.iter().map(|r| r.duration_ms).sum();

        println!("\nSummary:");
        println!("  Total benchmarks: {}", results.len());
        println!("  Successful: {}", successful);
        println!("  Failed: {}", failed);
        println!("  Total time: {:.2} ms ({:.2} s)", total_time, total_time / 1000.0);

        if failed > 0 {
            process::exit(1);
        }
    }
}
