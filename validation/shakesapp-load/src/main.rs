//! Load generator CLI for the shakesapp search service.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shakesapp_load::{LoadRunner, RequestGenerator, ResultsReport, TestConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "shakesapp-load")]
#[command(about = "Concurrent synthetic traffic for the shakesapp search service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test, from a scenario file or the built-in defaults
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override number of virtual users
        #[arg(short, long, env = "SHAKESAPP_LOAD_CONCURRENCY")]
        concurrency: Option<u32>,

        /// Override test duration in seconds
        #[arg(short, long, env = "SHAKESAPP_LOAD_DURATION")]
        duration: Option<u64>,

        /// Override pause between iterations, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Override target endpoint
        #[arg(short, long, env = "SHAKESAPP_LOAD_ENDPOINT")]
        endpoint: Option<String>,

        /// Open a fresh connection for every request
        #[arg(long)]
        no_reuse: bool,

        /// RNG seed for a reproducible term sequence
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Print generated request URLs without sending them
    Sample {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of URLs to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run {
            scenario,
            concurrency,
            duration,
            delay_ms,
            endpoint,
            no_reuse,
            seed,
            output,
            no_progress,
        } => {
            let mut config = load_config(scenario.as_ref())?;

            // Apply overrides
            if let Some(c) = concurrency {
                config.concurrency = c;
            }
            if let Some(d) = duration {
                config.duration_secs = d;
            }
            if let Some(d) = delay_ms {
                config.delay_ms = d;
            }
            if let Some(e) = endpoint {
                config.target_endpoint = e;
            }
            if no_reuse {
                config.reuse_connections = false;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            let runner = LoadRunner::new(config)?.with_progress(!no_progress);
            let results = runner.run().await?;

            match output {
                OutputFormat::Json => {
                    println!("{}", ResultsReport::format_json(&results)?);
                }
                OutputFormat::Csv => {
                    println!("{}", ResultsReport::csv_header());
                    println!("{}", ResultsReport::format_csv(&results));
                }
                OutputFormat::Table => {
                    println!("{}", ResultsReport::format_table(&results));
                }
            }

            Ok(())
        }
        Commands::Sample {
            scenario,
            count,
            seed,
        } => {
            let config = load_config(scenario.as_ref())?;
            let generator = RequestGenerator::new(&config.vocabulary, &config.target_endpoint)?;
            let mut rng = match seed.or(config.seed) {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            for _ in 0..count {
                let request = generator.generate(&mut rng);
                println!("{}\t{}", request.term, request.url);
            }

            Ok(())
        }
        Commands::List { dir } => {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("failed to read scenario directory {}", dir.display()))?;

            let mut scenarios = Vec::new();
            for path in entries.flatten().map(|entry| entry.path()) {
                if !matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yaml" | "yml")
                ) {
                    continue;
                }
                match TestConfig::from_file(&path) {
                    Ok(config) => scenarios.push((
                        path.file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        config,
                    )),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping scenario"),
                }
            }
            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            println!("Available scenarios in {}:", dir.display());
            println!();
            if scenarios.is_empty() {
                println!("No scenario files found");
            }
            for (filename, config) in scenarios {
                println!(
                    "  {} - {} ({} users, {}s)",
                    filename, config.name, config.concurrency, config.duration_secs
                );
                if !config.description.is_empty() {
                    println!("    {}", config.description);
                }
                println!();
            }

            Ok(())
        }
    }
}

fn load_config(scenario: Option<&PathBuf>) -> anyhow::Result<TestConfig> {
    match scenario {
        Some(path) => {
            info!(scenario = %path.display(), "Loading scenario");
            TestConfig::from_file(path)
                .with_context(|| format!("failed to load scenario {}", path.display()))
        }
        None => Ok(TestConfig::default()),
    }
}

/// Logs go to stderr; stdout carries only the report.
fn init_tracing(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
