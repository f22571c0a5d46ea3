//! Carbonshift Simulation Engine CLI
//!
//! Runs one scheduling policy over a generated job stream and reports
//! per-model emissions and deadline violations.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carbonshift_simulation_engine::config::{IntensitySource, PolicyConfig, RunConfig};
use carbonshift_simulation_engine::simulator::SimulationResult;

#[derive(Parser, Debug)]
#[command(name = "carbonshift-sim")]
#[command(about = "Simulate carbon-aware job scheduling policies", long_about = None)]
struct Args {
    /// JSON run configuration (overrides every other flag)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Regional carbon-intensity CSV
    #[arg(short, long)]
    region: Option<PathBuf>,

    /// Days of synthetic carbon data when no region CSV is given
    #[arg(long, default_value_t = 7)]
    synthetic_days: u32,

    /// Mean intensity of the synthetic trace (kgCO2/MWh)
    #[arg(long, default_value_t = 400.0)]
    mean_intensity: f64,

    /// Model catalog JSON (built-in catalog when omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Deadline after arrival (30min, 1hr, 6hr, 12hr, 24hr, <n>s/m/h);
    /// the model's SLO threshold when omitted
    #[arg(short, long)]
    due: Option<String>,

    /// Number of jobs to generate
    #[arg(short, long, default_value_t = 1000)]
    jobs: usize,

    /// Arrival pattern (uniform, random, morningSpike, ..., weekendSpike)
    #[arg(short, long, default_value = "uniform")]
    workload: String,

    /// Spike-window share of jobs for spike patterns
    #[arg(long)]
    spike_fraction: Option<f64>,

    /// Policy: fifo, temporal, model_selection, hybrid_selection
    #[arg(short, long, default_value = "fifo")]
    policy: String,

    /// Model for fifo / temporal
    #[arg(short, long, default_value = "bert-large")]
    model: String,

    /// Required average accuracy for the selection policies
    #[arg(short, long, default_value_t = 0.9)]
    accuracy: f64,

    /// Runtime safeguard in standard deviations
    #[arg(short, long, default_value_t = 1.0)]
    safeguard: f64,

    /// Random seed for job streams and runtime draws
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Args {
    fn into_run_config(self) -> anyhow::Result<RunConfig> {
        if let Some(path) = &self.config {
            return RunConfig::from_file(path).with_context(|| format!("loading config {}", path.display()));
        }

        let intensity = match self.region {
            Some(path) => IntensitySource::Csv { path },
            None => IntensitySource::synthetic(self.synthetic_days, self.mean_intensity, self.seed),
        };
        let policy = PolicyConfig::from_name(&self.policy, &self.model, self.accuracy, self.safeguard)?;

        Ok(RunConfig {
            intensity,
            catalog: self.catalog,
            due: self.due,
            job_count: self.jobs,
            workload: self.workload,
            spike_fraction: self.spike_fraction,
            policy,
            seed: self.seed,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carbonshift_simulation_engine=info,carbonshift_sim=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let output = args.output.clone();
    let config = args.into_run_config()?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Carbonshift Simulation Engine                           ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    match &config.intensity {
        IntensitySource::Csv { path } => println!("  Carbon data: {}", path.display()),
        IntensitySource::Synthetic {
            days, mean_intensity, ..
        } => println!("  Carbon data: synthetic, {days} days around {mean_intensity} kgCO2/MWh"),
    }
    println!(
        "  Jobs: {} ({}, due {})",
        config.job_count,
        config.workload,
        config.due.as_deref().unwrap_or("per SLO threshold")
    );
    println!("  Policy: {:?}", config.policy);
    println!("  Seed: {}\n", config.seed);

    let mut simulator = config.build_simulator().context("preparing simulation")?;
    print!("Running simulation with {} policy... ", simulator.policy_name());
    let result = simulator.run().context("simulation aborted")?;
    println!("Done");

    print_report(&result);

    if let Some(output_path) = output {
        println!("\nWriting results to {}...", output_path.display());
        let json = serde_json::to_string_pretty(&result)?;
        fs::write(&output_path, json).with_context(|| format!("writing {}", output_path.display()))?;
        println!("  Results saved");
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}

fn print_report(result: &SimulationResult) {
    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("{:<20} {:>16} {:>12} {:>12}", "Model", "Carbon (gCO2)", "Jobs", "Violations");
    println!("{}", "-".repeat(63));

    for (model, carbon) in &result.carbon_by_model {
        let jobs = result.completed.iter().filter(|job| &job.model == model).count();
        let violations = result.violations_by_model.get(model).copied().unwrap_or(0);
        println!("{:<20} {:>16.4} {:>12} {:>12}", model, carbon, jobs, violations);
    }

    println!("{}", "-".repeat(63));
    println!(
        "{:<20} {:>16.4} {:>8}/{:<3} {:>12}",
        "Total", result.total_carbon_grams, result.completed_jobs, result.total_jobs, result.total_violations
    );

    if result.completed_jobs > 0 {
        let violation_pct = result.total_violations as f64 / result.completed_jobs as f64 * 100.0;
        println!("\nPolicy: {}", result.policy_name);
        println!(
            "  Carbon per job: {:.4} gCO2",
            result.total_carbon_grams / result.completed_jobs as f64
        );
        println!("  SLO violations: {:.1}%", violation_pct);
    }
}
