/// fosa command line: train the two text CNNs of a run, or evaluate a run
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use fosa::{pipeline, Focus, PipelineConfig};

#[derive(Parser)]
#[command(name = "fosa", version, about = "Feature and polarity classification of review sentences")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the feature and polarity models into a new run directory
    Train(TrainArgs),
    /// Evaluate the models of a run directory on the test corpus
    Predict(PredictArgs),
}

/// Overrides shared by both subcommands
#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// RESTAURANT or LAPTOP
    #[arg(long)]
    current_domain: Option<String>,

    /// Widen restaurant features to ENTITY#ATTRIBUTE aspects
    #[arg(long)]
    aspects: bool,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Only this focus: feature or polarity
    #[arg(long)]
    focus: Option<String>,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Runs are stored under <run_directory>/<directory_name>/<timestamp>
    #[arg(long)]
    directory_name: Option<String>,

    #[arg(long)]
    num_epochs: Option<usize>,

    #[arg(long)]
    evaluate_every: Option<usize>,

    #[arg(long)]
    checkpoint_every: Option<usize>,

    #[arg(long)]
    num_checkpoints: Option<usize>,

    #[arg(long)]
    dev_sample_percentage: Option<f64>,

    #[arg(long)]
    dropout_keep_prob: Option<f64>,

    #[arg(long)]
    decay_coefficient: Option<f64>,
}

#[derive(Args)]
struct PredictArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Run directory written by `fosa train`
    #[arg(long)]
    checkpoint_dir: PathBuf,
}

/// Copies log output to stderr and a run log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logger(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {:?}", log_file))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .write_style(env_logger::WriteStyle::Never)
        .init();
    Ok(())
}

/// Defaults, then the JSON file, then command line overrides
fn load_config(common: &CommonArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(domain) = &common.current_domain {
        config.data.current_domain = domain.clone();
    }
    if common.aspects {
        config.data.aspects = true;
    }
    if let Some(batch_size) = common.batch_size {
        config.training.batch_size = batch_size;
    }
    Ok(config)
}

fn parse_focus(focus: &Option<String>) -> anyhow::Result<Vec<Focus>> {
    Ok(match focus {
        Some(focus) => vec![focus.parse()?],
        None => Focus::ALL.to_vec(),
    })
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let foci = parse_focus(&args.common.focus)?;
    let mut config = load_config(&args.common)?;

    if let Some(name) = args.directory_name {
        config.run.directory_name = name;
    }
    if let Some(num_epochs) = args.num_epochs {
        config.training.num_epochs = num_epochs;
    }
    if let Some(every) = args.evaluate_every {
        config.training.evaluate_every = every;
    }
    if let Some(every) = args.checkpoint_every {
        config.training.checkpoint_every = every;
    }
    if let Some(count) = args.num_checkpoints {
        config.training.num_checkpoints = count;
    }
    if let Some(fraction) = args.dev_sample_percentage {
        config.data.dev_sample_percentage = fraction;
    }
    if let Some(keep) = args.dropout_keep_prob {
        config.model.dropout_keep_prob = keep;
    }
    if let Some(coefficient) = args.decay_coefficient {
        config.training.decay_coefficient = coefficient;
    }
    config.validate()?;

    let run_dir = pipeline::create_run_dir(&config, chrono::Utc::now().timestamp())?;
    init_logger(&run_dir.join("train.log"))?;

    log::info!("Writing to {:?}", run_dir);
    log::debug!("Parameters: {:#?}", config);

    for focus in foci {
        let report = pipeline::train_focus(&config, focus, &run_dir)?;
        log::info!(
            "CNN_{} finished after {} steps, last checkpoint {:?}",
            focus,
            report.total_steps,
            report.checkpoints.last().map(|c| &c.weights_path)
        );
    }

    Ok(())
}

fn predict(args: PredictArgs) -> anyhow::Result<()> {
    let foci = parse_focus(&args.common.focus)?;
    let config = load_config(&args.common)?;
    config.validate()?;

    if !args.checkpoint_dir.is_dir() {
        anyhow::bail!("Run directory {:?} does not exist", args.checkpoint_dir);
    }
    init_logger(&args.checkpoint_dir.join("eval.log"))?;
    log::debug!("Parameters: {:#?}", config);

    if foci.len() == Focus::ALL.len() {
        pipeline::predict_run(&config, &args.checkpoint_dir)?;
    } else {
        for focus in foci {
            pipeline::predict_focus(&config, focus, &args.checkpoint_dir)?;
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
    }
}
