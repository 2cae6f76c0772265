//! Synheart ECG Agent CLI
//!
//! Streaming heartbeat classification and alerting.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synheart_ecg_agent::{
    alert::{AlertStateMachine, AlertTable},
    class_legend,
    config::{Config, InputMode},
    core::{argmax, heartbeat_score, BeatClass},
    sink::StatusFile,
    stats::create_shared_stats,
    Pipeline, ThreadSleeper, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-ecg")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Streaming heartbeat classification and alerting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the writer loop over the input source
    Run {
        /// Input CSV written by the capture process
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output prediction log
        #[arg(long)]
        output: Option<PathBuf>,

        /// Status file holding the latest class
        #[arg(long)]
        status: Option<PathBuf>,

        /// Classifier weights
        #[arg(long)]
        model: Option<PathBuf>,

        /// Fitted scaler parameters
        #[arg(long)]
        scaler: Option<PathBuf>,

        /// Input mode (beats or stream)
        #[arg(long)]
        mode: Option<String>,

        /// First input row to process
        #[arg(long)]
        start_row: Option<u64>,

        /// Also serve the status endpoints (requires server feature)
        #[arg(long)]
        serve: bool,
    },

    /// Serve the status endpoints
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Status file to poll
        #[arg(long)]
        status: Option<PathBuf>,
    },

    /// Read the current status once
    Status,

    /// Score a prediction
    Score {
        /// Predicted class id
        #[arg(long)]
        class: Option<i64>,

        /// Class probabilities, comma separated
        #[arg(long, value_delimiter = ',', num_args = 1.., allow_negative_numbers = true)]
        probs: Vec<f64>,

        /// Ground-truth class id
        #[arg(long)]
        truth: Option<i64>,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },

    /// Show beat classes and their alerts
    Classes,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            status,
            model,
            scaler,
            mode,
            start_row,
            serve,
        } => load_config().and_then(|mut config| {
            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(status) = status {
                config.status_path = status;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(scaler) = scaler {
                config.scaler_path = Some(scaler);
            }
            if let Some(mode) = mode {
                config.mode = parse_mode(&mode)?;
            }
            if let Some(start_row) = start_row {
                config.start_row = start_row;
            }
            cmd_run(config, serve)
        }),
        Commands::Serve { host, port, status } => load_config().and_then(|mut config| {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(status) = status {
                config.status_path = status;
            }
            cmd_serve(config)
        }),
        Commands::Status => load_config().and_then(cmd_status),
        Commands::Score {
            class,
            probs,
            truth,
        } => cmd_score(class, &probs, truth),
        Commands::Config { save } => load_config().and_then(|config| cmd_config(config, save)),
        Commands::Classes => {
            cmd_classes();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().context("failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

fn parse_mode(mode: &str) -> anyhow::Result<InputMode> {
    match mode {
        "beats" => Ok(InputMode::Beats),
        "stream" => Ok(InputMode::Stream),
        other => bail!("unknown input mode {other:?} (expected beats or stream)"),
    }
}

fn cmd_run(config: Config, serve: bool) -> anyhow::Result<()> {
    println!("Synheart ECG Agent v{VERSION}");
    println!();
    println!("{}", class_legend());
    println!();
    println!("  Input: {:?} ({:?} mode)", config.input_path, config.mode);
    println!("  Output: {:?}", config.output_path);
    println!("  Status: {:?}", config.status_path);
    println!("  Window length: {}", config.window_length);
    println!("  Poll interval: {}ms", config.poll_interval.as_millis());

    let stats = create_shared_stats(Some(config.stats_path.clone()));
    let mut pipeline = Pipeline::from_config(&config, stats.clone())
        .context("refusing to start the writer loop")?;
    println!("  Starting at row: {}", pipeline.offset());

    #[cfg(feature = "server")]
    let server = if serve {
        let runtime = tokio::runtime::Runtime::new()?;
        let machine = Arc::new(AlertStateMachine::new(
            StatusFile::new(&config.status_path),
            AlertTable::default(),
        ));
        let (addr, shutdown) = runtime.block_on(synheart_ecg_agent::server::run(
            (&config.server).into(),
            machine,
        ))?;
        println!("  Status server: http://{addr}");
        Some((runtime, shutdown))
    } else {
        None
    };

    #[cfg(not(feature = "server"))]
    if serve {
        eprintln!("Warning: --serve flag ignored (server feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    pipeline.run(&running, &ThreadSleeper);

    #[cfg(feature = "server")]
    if let Some((runtime, shutdown)) = server {
        let _ = shutdown.send(());
        runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save pipeline stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let machine = Arc::new(AlertStateMachine::new(
            StatusFile::new(&config.status_path),
            AlertTable::default(),
        ));
        let (addr, shutdown) =
            synheart_ecg_agent::server::run((&config.server).into(), machine).await?;

        println!("Serving status for {:?} on http://{addr}", config.status_path);
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown.send(());
        Ok(())
    })
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_config: Config) -> anyhow::Result<()> {
    bail!("the server feature is not enabled at compile time")
}

fn cmd_status(config: Config) -> anyhow::Result<()> {
    let machine = AlertStateMachine::new(StatusFile::new(&config.status_path), AlertTable::default());
    let report = machine.poll();
    let class = BeatClass::from_id(report.value);

    println!("Synheart ECG Agent Status");
    println!("=========================");
    println!();
    println!("Status file: {:?}", config.status_path);
    println!("Current class: {} - {}", class, class.description());
    match &report.new_alert {
        Some(alert) => {
            println!();
            println!("[{}] {}", alert.severity, alert.title);
            println!("{}", alert.message);
        }
        None => println!("No alert"),
    }
    println!();

    if config.stats_path.exists() {
        let content = std::fs::read_to_string(&config.stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for key in [
            "rows_read",
            "rows_skipped",
            "windows_classified",
            "windows_skipped",
            "iteration_errors",
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {key}: {value}");
            }
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_score(class: Option<i64>, probs: &[f64], truth: Option<i64>) -> anyhow::Result<()> {
    if probs.is_empty() {
        bail!("--probs needs at least one probability");
    }
    let predicted = match class {
        Some(id) => BeatClass::from_id(id),
        None => match argmax(probs) {
            Some(index) => BeatClass::from_id(index as i64),
            None => bail!("probabilities must be finite"),
        },
    };
    let truth = truth.map(BeatClass::from_id);
    let score = heartbeat_score(predicted, probs, truth);

    println!("Predicted: {predicted}");
    if let Some(truth) = truth {
        println!("Actual: {truth}");
    }
    println!("Score: {score:.2}");
    Ok(())
}

fn cmd_config(config: Config, save: bool) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save()?;
        println!();
        println!("Saved to {:?}", Config::config_path());
    }
    Ok(())
}

fn cmd_classes() {
    println!("{}", class_legend());
    println!();
    println!("Alerts:");
    let table = AlertTable::default();
    for (class, alert) in table.entries() {
        println!(
            "  {} [{}] {}: {}",
            class.label(),
            alert.severity,
            alert.title,
            alert.message
        );
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
