use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use audio_dx_eval::config::Config;
use audio_dx_eval::dataset::Dataset;
use audio_dx_eval::eval::{Evaluator, RunRecord};
use audio_dx_eval::inference::ChatAudioClient;
use audio_dx_eval::output::{self, JsonlArtifactWriter, OutputLayout};
use audio_dx_eval::prompts::load_prompts;

/// Zero-shot diagnostic classification with an audio-language model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (JSON). Defaults to ~/.audio-dx-eval/config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset directory (with metadata.jsonl) or manifest file
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Newline-delimited prompt templates
    #[arg(short, long)]
    prompts: Option<PathBuf>,

    /// Directory for results.csv, run.json and per-prompt predictions
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible inference server
    #[arg(long)]
    server_url: Option<String>,

    /// Model id to request
    #[arg(short, long)]
    model: Option<String>,

    /// Request the quantized model variant
    #[arg(long)]
    quantize: bool,

    /// Maximum tokens to generate per response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Number of diagnostic classes (2, 3, anything else reports averages only)
    #[arg(long)]
    n_classes: Option<u32>,

    /// Two-class runs: score CI/NC instead of MCI/NC
    #[arg(long)]
    ci_nc: bool,

    /// Echo every raw model response
    #[arg(long)]
    debug: bool,

    /// Skip the model listing check against the server
    #[arg(long)]
    skip_preflight: bool,

    /// Write the effective config to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(ref dataset) = self.dataset {
            config.dataset_path = Some(dataset.clone());
        }
        if let Some(ref prompts) = self.prompts {
            config.prompts_path = Some(prompts.clone());
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ref url) = self.server_url {
            config.model.server_url = url.clone();
        }
        if let Some(ref model) = self.model {
            config.model.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.model.max_tokens = max_tokens;
        }
        if let Some(n_classes) = self.n_classes {
            config.n_classes = n_classes;
        }
        config.model.quantize |= self.quantize;
        config.ci_nc |= self.ci_nc;
        config.debug |= self.debug;
    }
}

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    args.apply(&mut config);

    if args.write_config {
        config.save(&config_path)?;
        println!("Config written to {:?}", config_path);
        return Ok(());
    }

    let mode = config.schema_mode();
    let dataset_path = config.dataset_path()?.to_path_buf();
    let prompts_path = config.prompts_path()?.to_path_buf();

    info!("Evaluation starting...");
    info!("Dataset: {:?}", dataset_path);
    info!("Prompts: {:?}", prompts_path);
    info!("Output: {:?}", config.output_dir);
    info!("Schema: {}", mode);

    // Everything that can fail on bad inputs happens before the first request
    let prompts = load_prompts(&prompts_path)?;
    let layout = OutputLayout::create(&config.output_dir)?;
    let dataset = Dataset::load(&dataset_path, config.model.sample_rate)?;

    if config.model.quantize && config.model.quantized_model.is_none() {
        warn!(
            "Quantization requested but no quantized_model configured; \
             requesting {} and leaving quantization to the server",
            config.model.model
        );
    }

    let client = ChatAudioClient::new(config.model.client_settings())
        .context("Failed to create inference client")?;
    info!("Model: {}", client.model());

    if !args.skip_preflight {
        let served = client
            .list_models()
            .context("Inference server preflight failed (use --skip-preflight to bypass)")?;
        if !served.iter().any(|m| m == client.model()) {
            warn!(
                "Model {} is not listed by the server (available: {})",
                client.model(),
                served.join(", ")
            );
        }
    }

    let mut run = RunRecord::new(
        client.model().to_string(),
        client.base_url().to_string(),
        mode,
        dataset_path,
        prompts_path,
    );
    run.set_inputs(prompts.len(), dataset.len());

    let evaluator = Evaluator::new(mode).with_echo_responses(config.debug);
    let mut sink = JsonlArtifactWriter::new(layout.clone());
    let rows = evaluator.evaluate(&dataset, &prompts, &client, &mut sink)?;

    let results_file = layout.results_file();
    output::write_results_csv(&results_file, mode, &rows)?;

    run.finalize(results_file.clone());
    output::write_run_record(&layout.run_file(), &run)?;

    // Print summary
    println!("\n--- Evaluation Summary ---");
    println!("Run: {}", run.run_id);
    println!("Prompts: {}", run.prompt_count);
    println!("Samples: {}", run.sample_count);
    if let Some(secs) = run.duration_secs() {
        println!("Duration: {:.1}s", secs);
    }
    for row in &rows {
        let averages = row.summary.averages();
        println!(
            "  [{}] UAR {:.3}  F1 macro {:.3}  F1 weighted {:.3}",
            row.prompt_index, averages.uar, averages.f1_macro, averages.f1_weighted
        );
    }
    println!("Results: {:?}", results_file);

    info!("Evaluation complete");
    Ok(())
}
