//! Benchmark runner and result types
//!
//! Provides infrastructure for running benchmarks and collecting results.

use core_types::{OptimizationFlags, ProgramDefinitionError};
use interpreter::{RuntimeError, Value, VM};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Failure while preparing or running a workload
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The workload's methods could not be compiled
    #[error("compile error: {0}")]
    Compile(#[from] ProgramDefinitionError),
    /// The workload raised a guest error
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    /// The workload finished with an unexpected answer
    #[error("expected {expected}, got {actual}")]
    WrongAnswer {
        /// Answer the workload should produce
        expected: String,
        /// Answer it produced
        actual: String,
    },
}

/// Code run by a benchmark: builds its classes in the VM and performs
/// `size` units of work
pub type Workload = fn(&VM, u64) -> Result<Value, WorkloadError>;

/// A single benchmark test
#[derive(Clone)]
pub struct Benchmark {
    /// Name of the benchmark
    pub name: String,
    /// Description of what the benchmark tests
    pub description: String,
    /// Units of work per run
    pub size: u64,
    /// Code to execute
    pub workload: Workload,
}

impl std::fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

/// Result of running a benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Name of the benchmark
    pub name: String,
    /// Description of the benchmark
    pub description: String,
    /// Duration in milliseconds
    pub duration_ms: f64,
    /// Units of work per second (if applicable)
    pub ops_per_sec: Option<f64>,
    /// Whether the benchmark completed successfully
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
}

impl Benchmark {
    /// Run this benchmark once in a fresh VM
    ///
    /// # Arguments
    /// * `flags` - Optimizations enabled in the VM
    ///
    /// # Returns
    /// A `BenchmarkResult` containing timing and success information
    pub fn run(&self, flags: OptimizationFlags) -> BenchmarkResult {
        let vm = VM::with_flags(flags);
        let start = Instant::now();

        let result = (self.workload)(&vm, self.size);

        let duration = start.elapsed();
        let duration_ms = duration.as_secs_f64() * 1000.0;
        log::debug!("{} finished in {:.2} ms: {:?}", self.name, duration_ms, result);

        match result {
            Ok(_) => BenchmarkResult {
                name: self.name.clone(),
                description: self.description.clone(),
                duration_ms,
                ops_per_sec: (duration.as_secs_f64() > 0.0)
                    .then(|| self.size as f64 / duration.as_secs_f64()),
                success: true,
                error: None,
            },
            Err(e) => BenchmarkResult {
                name: self.name.clone(),
                description: self.description.clone(),
                duration_ms,
                ops_per_sec: None,
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Run this benchmark multiple times and return average
    ///
    /// # Arguments
    /// * `flags` - Optimizations enabled in each VM
    /// * `iterations` - Number of times to run the benchmark
    ///
    /// # Returns
    /// A `BenchmarkResult` with averaged timing information
    pub fn run_multiple(&self, flags: OptimizationFlags, iterations: usize) -> BenchmarkResult {
        let iterations = iterations.max(1);
        let mut total_duration_ms = 0.0;
        let mut last_result = self.run(flags);

        for run in 0..iterations {
            if run > 0 {
                last_result = self.run(flags);
            }
            if !last_result.success {
                return last_result;
            }
            total_duration_ms += last_result.duration_ms;
        }

        last_result.duration_ms = total_duration_ms / iterations as f64;
        last_result.ops_per_sec = (last_result.duration_ms > 0.0)
            .then(|| self.size as f64 * 1000.0 / last_result.duration_ms);
        last_result
    }
}

/// Suite of benchmarks
pub struct BenchmarkSuite {
    /// Name of the suite
    pub name: String,
    /// Benchmarks in this suite
    pub benchmarks: Vec<Benchmark>,
}

impl BenchmarkSuite {
    /// Create a new benchmark suite
    pub fn new(name: String) -> Self {
        Self {
            name,
            benchmarks: Vec::new(),
        }
    }

    /// Add a benchmark to this suite
    pub fn add(&mut self, benchmark: Benchmark) {
        self.benchmarks.push(benchmark);
    }

    /// Run all benchmarks in this suite
    pub fn run(&self, flags: OptimizationFlags) -> Vec<BenchmarkResult> {
        self.benchmarks.iter().map(|b| b.run(flags)).collect()
    }

    /// Run all benchmarks multiple times and average
    pub fn run_multiple(&self, flags: OptimizationFlags, iterations: usize) -> Vec<BenchmarkResult> {
        self.benchmarks
            .iter()
            .map(|b| b.run_multiple(flags, iterations))
            .collect()
    }
}

/// Fail with [`WorkloadError::WrongAnswer`] unless `actual` is `expected`
pub fn check_answer(actual: Value, expected: Value) -> Result<Value, WorkloadError> {
    if actual == expected {
        Ok(actual)
    } else {
        Err(WorkloadError::WrongAnswer {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Format benchmark results as a human-readable table
pub fn format_results(results: &[BenchmarkResult]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{:<35} {:<15} {:<15} {:<10}\n",
        "Benchmark", "Duration (ms)", "Ops/sec", "Status"
    ));
    output.push_str(&format!("{}\n", "=".repeat(80)));

    for result in results {
        let status = if result.success { "✓ PASS" } else { "✗ FAIL" };
        let rate = result
            .ops_per_sec
            .map(|r| format!("{:.0}", r))
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<35} {:>13.2} ms {:>15} {:<10}\n",
            result.name, result.duration_ms, rate, status
        ));

        if let Some(error) = &result.error {
            output.push_str(&format!("  Error: {}\n", error));
        }
    }

    output
}

/// Format benchmark results as JSON
pub fn format_results_json(results: &[BenchmarkResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
