use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use codelore_extractor::{ExtractConfig, Pipeline, RunSummary};
use codelore_model::{business_rules_schema, parsed_code_schema};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "codelore")]
#[command(about = "Extract a structural model and evidence-backed business rules from a repository", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write parsed_code.json and business_rule.json
    Extract(ExtractArgs),

    /// Write parsed_code.json only
    Parse(ExtractArgs),

    /// Write business_rule.json from an existing parsed_code.json
    Rules(RulesArgs),

    /// Print the JSON Schema of an artifact
    Schema(SchemaArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Repository root
    #[arg(default_value = ".")]
    repo: PathBuf,

    /// Output directory (overrides config and CODELORE_OUTPUT_DIR)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Config file (default: <REPO>/codelore.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parse workers (overrides config and CODELORE_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Extra gitignore-style pattern to skip (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Abort before writing when the run exceeds this many milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,
}

impl ExtractArgs {
    fn resolve_config(&self) -> Result<ExtractConfig> {
        let mut config = ExtractConfig::load(&self.repo, self.config.as_deref())
            .with_context(|| format!("Failed to load configuration for {}", self.repo.display()))?;
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(ms) = self.time_budget_ms {
            config.time_budget_ms = Some(ms);
        }
        config.ignore.extend(self.ignore.iter().cloned());
        config.validate().context("Invalid command-line overrides")?;
        Ok(config)
    }
}

#[derive(Args)]
struct RulesArgs {
    /// Existing structural artifact
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for business_rule.json
    #[arg(short, long, default_value = "data")]
    out: PathBuf,
}

#[derive(Args)]
struct SchemaArgs {
    artifact: ArtifactKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum ArtifactKind {
    ParsedCode,
    BusinessRules,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Extract(args) => run_extract(args, false).await?,
        Commands::Parse(args) => run_extract(args, true).await?,
        Commands::Rules(args) => run_rules(args).await?,
        Commands::Schema(args) => run_schema(args)?,
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs, parse_only: bool) -> Result<()> {
    let config = args.resolve_config()?;
    log::debug!("Effective configuration: {config:?}");
    let pipeline = Pipeline::new();
    let outcome = if parse_only {
        pipeline.parse_only(&args.repo, &config).await
    } else {
        pipeline.run(&args.repo, &config).await
    }
    .with_context(|| format!("Extraction failed for {}", args.repo.display()))?;
    print_summary(&outcome.summary)
}

async fn run_rules(args: RulesArgs) -> Result<()> {
    let outcome = Pipeline::new()
        .synthesize_from_parsed(&args.input, &args.out)
        .await
        .with_context(|| format!("Rule synthesis failed for {}", args.input.display()))?;
    print_summary(&outcome.summary)
}

fn run_schema(args: SchemaArgs) -> Result<()> {
    let schema = match args.artifact {
        ArtifactKind::ParsedCode => parsed_code_schema(),
        ArtifactKind::BusinessRules => business_rules_schema(),
    };
    print_json(&schema)
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    print_json(summary)
}
