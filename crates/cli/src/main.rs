use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Number;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use workflow::{
    convert_document, detect, read_document, translate, ComfyUiClient, Diagnostics,
    GenerationParams, Translation, TranslatorConfig,
};

#[derive(Parser)]
#[command(name = "workflow-cli")]
#[command(about = "Translate ComfyUI workflows and queue them for generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print whether a workflow file is in web or API format
    Detect {
        /// Workflow file path
        file: PathBuf,
    },

    /// Convert a workflow to API format without injecting parameters
    Convert {
        /// Workflow file path
        file: PathBuf,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a workflow and inject generation parameters
    Inject(InjectArgs),

    /// Inject parameters and queue the result on a ComfyUI server
    Submit {
        #[command(flatten)]
        args: InjectArgs,

        /// Server URL, overrides the config file
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Args)]
struct InjectArgs {
    /// Workflow file path
    file: PathBuf,

    /// JSON file with generation parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Checkpoint file name
    #[arg(short, long, default_value = "")]
    model: String,

    /// Positive prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Negative prompt
    #[arg(long)]
    negative: Option<String>,

    /// Seed (-1 for random)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_seed)]
    seed: Option<Number>,

    /// Sampling steps
    #[arg(long)]
    steps: Option<u32>,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Translator config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl InjectArgs {
    /// Parameters file first, then command-line flags on top.
    fn generation_params(&self) -> Result<GenerationParams> {
        let mut params = match &self.params {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read params file {:?}", path))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid params file {:?}", path))?
            }
            None => GenerationParams::default(),
        };

        if let Some(prompt) = &self.prompt {
            params.prompt = Some(prompt.clone());
        }
        if let Some(negative) = &self.negative {
            params.negative_prompt = Some(negative.clone());
        }
        if self.seed.is_some() {
            params.seed = self.seed.clone();
        }
        if self.steps.is_some() {
            params.steps = self.steps;
        }

        Ok(params)
    }

    fn translator_config(&self) -> Result<TranslatorConfig> {
        match &self.config {
            Some(path) => TranslatorConfig::load(path)
                .with_context(|| format!("Failed to load config {:?}", path)),
            None => Ok(TranslatorConfig::default()),
        }
    }
}

/// Signed or unsigned 64-bit seed.
fn parse_seed(s: &str) -> std::result::Result<Number, String> {
    s.parse::<i64>()
        .map(Number::from)
        .or_else(|_| s.parse::<u64>().map(Number::from))
        .map_err(|e| format!("invalid seed '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Detect { file } => detect_command(file),
        Commands::Convert { file, output } => convert_command(file, output),
        Commands::Inject(args) => inject_command(args),
        Commands::Submit { args, url } => submit_command(args, url).await,
    }
}

fn detect_command(file: PathBuf) -> Result<()> {
    let document = read_document(&file)?;
    println!("{}", detect(&document));
    Ok(())
}

fn convert_command(file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let document = read_document(&file)?;
    info!("Converting {:?} ({} format)", file, detect(&document));

    let conversion = convert_document(document);
    log_diagnostics(&conversion.diagnostics);

    write_output(&conversion.graph, output.as_deref())
}

fn inject_command(args: InjectArgs) -> Result<()> {
    let config = args.translator_config()?;
    let translation = run_pipeline(&args, &config)?;
    write_output(&translation.graph, args.output.as_deref())
}

async fn submit_command(args: InjectArgs, url: Option<String>) -> Result<()> {
    let mut config = args.translator_config()?;
    if let Some(url) = url {
        config = config.with_server_url(url);
    }

    let translation = run_pipeline(&args, &config)?;
    if args.output.is_some() {
        write_output(&translation.graph, args.output.as_deref())?;
    }

    let client = ComfyUiClient::new(&config)?;
    if !client.is_available().await {
        warn!("ComfyUI at {} did not answer /system_stats", client.api_url());
    }

    let queued = client
        .queue_prompt(&translation.graph)
        .await
        .with_context(|| format!("Failed to queue prompt on {}", client.api_url()))?;

    info!("Queued as #{}", queued.number);
    println!("{}", queued.prompt_id);
    Ok(())
}

fn run_pipeline(args: &InjectArgs, config: &TranslatorConfig) -> Result<Translation> {
    let params = args.generation_params()?;
    let document = read_document(&args.file)?;

    let translation = translate(document, &args.model, &params, config)?;
    log_diagnostics(&translation.diagnostics);

    let report = &translation.report;
    info!(
        "Sampler {} seeded with {} ({} nodes)",
        report.sampler,
        report.seed,
        translation.graph.node_count()
    );

    Ok(translation)
}

fn log_diagnostics(diagnostics: &Diagnostics) {
    for reason in diagnostics {
        warn!("Skipped: {}", reason);
    }
}

fn write_output<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
