//! coursecheck - run fixture-scoped scenarios and walkthroughs against the
//! course platform.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use coursecheck_common::HarnessConfig;
use coursecheck_e2e::playwright::PlaywrightDriver;
use coursecheck_e2e::{catalog, runner, ScenarioRunner, ScenarioSpec, WalkthroughSpec};

#[derive(Parser, Debug)]
#[command(name = "coursecheck")]
#[command(author, version, about = "End-to-end checks for the course platform", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the system under test (overrides config and environment)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    timeout_secs: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "COURSECHECK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run API scenarios
    Run {
        /// Directory of scenario YAML files
        #[arg(short, long)]
        specs: Option<PathBuf>,

        /// Include the built-in scenarios
        #[arg(long)]
        builtin: bool,

        /// Run only scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Run only the scenario with this name
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available scenarios
    List {
        #[arg(short, long)]
        specs: Option<PathBuf>,
    },

    /// Run browser walkthroughs
    Walk {
        /// Directory of walkthrough YAML files
        #[arg(short, long, default_value = "walkthroughs")]
        walkthroughs: PathBuf,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        tag: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(cli)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.set_timeout_secs(secs)?;
    }
    config.validate()?;
    Ok(config)
}

fn collect_specs(config: &HarnessConfig, dir: Option<PathBuf>, builtin: bool) -> Result<Vec<ScenarioSpec>> {
    let mut specs = Vec::new();
    if builtin {
        specs.extend(catalog::all());
    }
    if !builtin || dir.is_some() {
        let dir = dir.unwrap_or_else(|| config.specs_dir.clone());
        if !dir.is_dir() {
            bail!("scenario directory not found: {}", dir.display());
        }
        specs.extend(ScenarioSpec::load_all(&dir)?);
    }
    Ok(specs)
}

async fn async_main(cli: Cli) -> Result<bool> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run { specs, builtin, tag, name, output } => {
            if let Some(output) = output {
                config.output_dir = output;
            }
            let all = collect_specs(&config, specs, builtin)?;
            let selected = runner::select(all, name.as_deref(), tag.as_deref())?;
            if selected.is_empty() {
                bail!("no scenarios selected");
            }

            let runner = ScenarioRunner::new(&config)?;
            let results = runner.run_specs(&selected).await;
            runner.write_results(&results)?;
            Ok(results.success())
        }

        Commands::List { specs } => {
            let mut all = catalog::all();
            let dir = specs.unwrap_or_else(|| config.specs_dir.clone());
            if dir.is_dir() {
                all.extend(ScenarioSpec::load_all(&dir)?);
            }
            for spec in all {
                println!("{:<28} [{}] {}", spec.name, spec.tags.join(","), spec.description);
            }
            Ok(true)
        }

        Commands::Walk { walkthroughs, name, tag } => {
            let specs: Vec<WalkthroughSpec> = WalkthroughSpec::load_all(&walkthroughs)?
                .into_iter()
                .filter(|w| name.as_deref().map_or(true, |n| w.name == n))
                .filter(|w| tag.as_deref().map_or(true, |t| w.tags.iter().any(|x| x == t)))
                .collect();
            if specs.is_empty() {
                bail!("no walkthroughs selected in {}", walkthroughs.display());
            }
            PlaywrightDriver::ensure_available(&specs).await?;
            let driver = PlaywrightDriver::new(config.base_url(), &config.browser)?;

            let mut failed = 0;
            for spec in &specs {
                let result = driver.run(spec).await?;
                if !result.passed {
                    failed += 1;
                    error!(
                        "{} failed at {}: {}",
                        result.name,
                        result.failed_step.as_deref().unwrap_or("?"),
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            info!("Walkthroughs: {} passed, {} failed", specs.len() - failed, failed);
            Ok(failed == 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_flag_is_bounded() {
        let cli = Cli::try_parse_from(["coursecheck", "--timeout-secs", "45", "list"]).unwrap();
        assert_eq!(cli.timeout_secs, Some(45));

        for bad in ["0", "86401", "18446744073709552"] {
            assert!(
                Cli::try_parse_from(["coursecheck", "--timeout-secs", bad, "list"]).is_err(),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn cli_overrides_are_validated_after_layering() {
        let cli = Cli::try_parse_from([
            "coursecheck",
            "--base-url",
            "http://127.0.0.1:4000/",
            "--timeout-secs",
            "7",
            "list",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:4000");
        assert_eq!(config.timeout_ms, 7_000);

        let cli = Cli::try_parse_from(["coursecheck", "--base-url", "localhost", "list"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
