use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "slotcell workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the atomic cell benchmarks against the lock-based baselines
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

const BENCH: &str = "atomic_cell_benchmark";
const BASELINE: &str = "mutex_arc";
const CRITERION_DIR: &str = "target/criterion";
const REPORT_PATH: &str = "benchmark_results/report.md";

/// `benchmark.json` as written by criterion; only throughput is needed.
#[derive(Deserialize)]
struct BenchmarkMeta {
    throughput: Option<ThroughputMeta>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
enum ThroughputMeta {
    Elements(f64),
    Bytes(f64),
    BytesDecimal(f64),
}

/// `estimates.json` as written by criterion.
#[derive(Deserialize)]
struct Estimates {
    mean: Estimate,
}

#[derive(Deserialize)]
struct Estimate {
    point_estimate: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running {BENCH}...");
    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.env("CARGO_INCREMENTAL", "0")
        .args(["bench", "--bench", BENCH]);

    // Criterion arguments go after --
    cmd.arg("--");
    if quick {
        cmd.args(["--measurement-time", "0.1", "--noplot", "--sample-size", "10"]);
    }

    let status = cmd
        .status()
        .with_context(|| format!("Failed to run cargo bench for {BENCH}"))?;
    if !status.success() {
        anyhow::bail!("Benchmark {BENCH} failed");
    }

    println!("Finished {BENCH} in {:.2?}", start.elapsed());
    Ok(())
}

/// Ops/s keyed by group, then by implementation.
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");

    let criterion_dir = Path::new(CRITERION_DIR);
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results)?;

    let report_path = Path::new(REPORT_PATH);
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = fs::File::create(report_path)
        .with_context(|| format!("Failed to create {}", report_path.display()))?;

    writeln!(file, "# Atomic Cell Benchmark Report")?;
    for (group, impls) in &results {
        writeln!(file)?;
        writeln!(file, "## {group}")?;
        writeln!(file)?;
        writeln!(file, "| Implementation | Ops/s | vs {BASELINE} |")?;
        writeln!(file, "|---|---|---|")?;

        let baseline = impls.get(BASELINE).copied().unwrap_or(0.0);
        for (name, ops) in impls {
            let rel = if baseline > 0.0 { ops / baseline } else { 0.0 };
            writeln!(file, "| {name} | {} | **{rel:.2}x** |", format_ops(*ops))?;
        }
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn format_ops(ops: f64) -> String {
    if ops > 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops > 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{ops:.0}")
    }
}

// Layout: target/criterion/<group>/<implementation>/new/{estimates,benchmark}.json
fn collect_results(dir: &Path, results: &mut Results) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_results(&path, results)?;
            continue;
        }
        if path.file_name().and_then(|s| s.to_str()) != Some("estimates.json") {
            continue;
        }

        let Some(run_dir) = path.parent() else { continue };
        if run_dir.file_name().and_then(|s| s.to_str()) != Some("new") {
            continue;
        }
        let Some(impl_dir) = run_dir.parent() else { continue };
        let Some(group_dir) = impl_dir.parent() else { continue };
        let (Some(name), Some(group)) = (dir_name(impl_dir), dir_name(group_dir)) else {
            continue;
        };
        if name == "report" || group == "report" {
            continue;
        }

        let estimates: Estimates = read_json(&path)?;
        let meta: BenchmarkMeta = read_json(&run_dir.join("benchmark.json"))?;
        let elements = match meta.throughput {
            Some(ThroughputMeta::Elements(n)) => n,
            _ => 1.0,
        };

        let time_ns = estimates.mean.point_estimate;
        if time_ns > 0.0 {
            results
                .entry(group)
                .or_default()
                .insert(name, elements * 1e9 / time_ns);
        }
    }

    Ok(())
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
