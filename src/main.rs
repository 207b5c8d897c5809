use anyhow::{Context, Result};
use clap::Parser;
use jetdiff::cli::{Cli, Command, CompareArgs, OutputArgs, OutputFormat, RocArgs};
use jetdiff::config::{CompareConfig, RocConfig};
use jetdiff::export;
use jetdiff::ingest::{load_chain, JsonlOptions};
use jetdiff::outlier::{StderrSink, StdoutSink};
use jetdiff::pipeline::{CompareInputs, Comparison};
use jetdiff::roc::RocAnalysis;
use std::fs;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Write the rendered report to the requested file, or stdout
fn emit(output: &OutputArgs, rendered: &str) -> Result<()> {
    match &output.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write report: {}", path.display())),
        None => {
            print!("{}", rendered);
            Ok(())
        }
    }
}

/// Apply command-line overrides on top of the file settings
fn apply_overrides(config: &mut CompareConfig, args: &CompareArgs) -> Result<()> {
    if let Some(n) = args.max_records {
        config.max_records = n;
    }
    if args.verbose > 0 {
        config.verbosity = args.verbose.min(3);
    }
    if let Some(h) = args.diff_h {
        config.thresholds.higgs = h;
    }
    if let Some(a) = args.diff_a {
        config.thresholds.pseudoscalar = a;
    }
    if let Some(t) = args.diff_t {
        config.thresholds.tagger = t;
    }
    if let Some(preset) = args.preset {
        config.preset = Some(preset);
        config.algorithms.clear();
    }
    if let Some(select) = &args.select {
        config.select = Some(select.clone());
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid settings: {}", e))
}

fn run_compare(args: &CompareArgs) -> Result<()> {
    let mut config = CompareConfig::from_toml(&args.config)?;
    apply_overrides(&mut config, args)?;

    let set = config.algorithm_set()?;
    tracing::info!(
        "Comparing {} algorithms: {}",
        set.len(),
        set.algorithms()
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let inputs = CompareInputs::load(&config, &set).context("Failed to load input streams")?;
    let comparison = Comparison::prepare(&config, &set, &inputs)?;
    let report = if args.output.output.is_none() && args.output.format != OutputFormat::Text {
        comparison.run(&mut StderrSink)?
    } else {
        comparison.run(&mut StdoutSink)?
    };

    let rendered = export::render_compare(&report, &config.thresholds, args.output.format)?;
    emit(&args.output, &rendered)
}

fn run_roc(args: &RocArgs) -> Result<()> {
    let config = RocConfig::from_toml(&args.config)?;
    let mut analysis = RocAnalysis::new(config.plan.clone()).with_progress(config.progress_every);

    // Load and check every input before filling anything
    let mut streams = Vec::with_capacity(config.inputs.len());
    for input in &config.inputs {
        let stream = load_chain(&input.name, &input.files, &JsonlOptions::default())
            .with_context(|| format!("Failed to load input '{}'", input.name))?;
        analysis.check_input(&input.name, &stream)?;
        streams.push(stream);
    }

    for (input, stream) in config.inputs.iter().zip(&streams) {
        let cap = args.max_records.or(input.max_records);
        let summary = analysis.fill(&input.name, stream, cap)?;
        tracing::info!(
            "{}: {} records, {} selected ({:.2} weighted)",
            input.name,
            summary.scanned,
            summary.selected,
            summary.weighted
        );
    }

    let report = analysis.finish()?;
    let rendered = export::render_roc(&report, args.output.format)?;
    emit(&args.output, &rendered)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(cli.debug);

    match &cli.command {
        Command::Compare(args) => run_compare(args),
        Command::Roc(args) => run_roc(args),
    }
}
