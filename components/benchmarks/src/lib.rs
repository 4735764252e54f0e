//! Benchmark infrastructure for the Sable interpreter
//!
//! This crate provides benchmarking tools to measure how the dispatch
//! optimizations pay off. It includes:
//!
//! - Micro-benchmarks for monomorphic, polymorphic and megamorphic sends
//! - Workloads for trivial getters, arithmetic loops and non-local return
//! - Benchmark runner with timing and result formatting
//!
//! # Examples
//!
//! ```rust,no_run
//! use benchmarks::micro;
//! use core_types::OptimizationFlags;
//!
//! let results = micro::run_all(OptimizationFlags::default());
//! for result in results {
//!     println!("{}: {:.2}ms", result.name, result.duration_ms);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod micro;
pub mod runner;

pub use runner::{Benchmark, BenchmarkResult, BenchmarkSuite, WorkloadError};
