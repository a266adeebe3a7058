//! shardpack CLI
//!
//! Writes dataset directories into shards and recovers files from them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shardpack::adapter::ImageDirAdapter;
use shardpack::config::RunConfig;
use shardpack::pipeline::StopReason;
use shardpack::{recovery, DatasetReader, Result, ShardError, ShutdownHandle, WritePipeline};
use tracing_subscriber::{fmt, EnvFilter};

/// shardpack
#[derive(Parser, Debug)]
#[command(name = "shardpack")]
#[command(about = "Pack (image, label) datasets into randomly-readable shards")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write every configured dataset into its shard
    Write {
        /// Path to the YAML run configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Recover the original files of every configured dataset
    Recovery {
        /// Path to the YAML run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory (defaults to a `_recovered` sibling of each shard)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print one record of a dataset made of one or more shards
    Read {
        /// Shard directories, in dataset order
        #[arg(short, long, required = true, num_args = 1..)]
        shard: Vec<PathBuf>,

        /// Logical record index
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        index: i64,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardpack=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    // Set up Ctrl+C handler
    let shutdown = ShutdownHandle::new();
    let handler_shutdown = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, flushing staged records...");
        handler_shutdown.trigger();
    }) {
        tracing::warn!(error = %e, "Could not install Ctrl+C handler");
    }

    let outcome = match args.command {
        Commands::Write { config } => run_write(&config, &shutdown),
        Commands::Recovery { config, output } => run_recovery(&config, output.as_deref()),
        Commands::Read { shard, index } => run_read(&shard, index),
        Commands::Version => {
            println!("{}", welcome_banner(shardpack::VERSION));
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_write(config_path: &Path, shutdown: &ShutdownHandle) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let pipeline_config = config.pipeline_config();

    // Resolve and validate everything before writing anything
    let mut jobs = Vec::new();
    for (name, entry) in config.resolve_datasets()? {
        let (image_dir, json_dir, output_dir, schema) = entry.write_inputs()?;
        let adapter = ImageDirAdapter::open(image_dir, json_dir, schema)?;
        jobs.push((name, adapter, output_dir.to_path_buf()));
    }

    for (name, adapter, output_dir) in jobs {
        tracing::info!(dataset = %name, output = %output_dir.display(), "Writing dataset");
        let pipeline = WritePipeline::with_shutdown(pipeline_config.clone(), shutdown.clone());
        let report = pipeline.run(&adapter, &output_dir)?;
        tracing::info!(
            dataset = %name,
            written = report.written(),
            failed = report.failed,
            seconds = report.elapsed.as_secs_f64(),
            "Dataset writing completed"
        );

        if report.stop_reason == StopReason::Interrupted {
            return Err(ShardError::Interrupted(format!(
                "dataset {} stopped at counter {}; rerun with resume: true to continue",
                name, report.final_counter
            )));
        }
    }
    Ok(())
}

fn run_recovery(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = RunConfig::load(config_path)?;

    for (name, entry) in config.resolve_datasets()? {
        let shard_dir = entry.output_dir()?;
        let output_dir = match output {
            Some(dir) => dir.join(&name),
            None => recovery::default_output_dir(shard_dir),
        };

        tracing::info!(dataset = %name, shard = %shard_dir.display(), "Recovering dataset");
        let report = recovery::recover(shard_dir, &output_dir)?;
        tracing::info!(
            dataset = %name,
            recovered = report.recovered,
            attempted = report.attempted,
            output = %output_dir.display(),
            "Dataset recovery completed"
        );
    }
    Ok(())
}

fn run_read(shards: &[PathBuf], index: i64) -> Result<()> {
    let mut reader = DatasetReader::open(shards)?;
    let described = describe_record(&reader, index);
    reader.close()?;
    println!("{}", described?);
    Ok(())
}

/// Render one record, or fail without output when `index` is out of range
fn describe_record(reader: &DatasetReader, index: i64) -> Result<String> {
    let record = reader.get(index)?;
    let pixels = record.image.decode()?;
    Ok(format!(
        "length: {}\nindex:  {}\nimage:  {} {}x{} ({} bytes)\nlabel:  {}",
        reader.len(),
        index,
        record.image.format.extension(),
        pixels.width(),
        pixels.height(),
        record.image.len(),
        record.label
    ))
}

fn welcome_banner(version: &str) -> String {
    let width = 58;
    let message = format!("Welcome to SHARDPACK, version {}", version);
    let inner = width - 2;
    format!(
        "{rule}\n|{message:^inner$}|\n{rule}",
        rule = "-".repeat(width),
    )
}
