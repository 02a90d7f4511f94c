use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use estimator::prelude::*;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "estimator",
    version,
    about = "Monte Carlo risk analysis of construction cost estimates",
    after_help = r#"
EXAMPLES:
  estimator run --input data/sample_estimates.csv --output output
  estimator run --config config/default.toml --simulations 50000 --no-ai
  estimator explore --input data/sample_estimates.csv
  estimator fit --input data/sample_estimates.csv
"#
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit, simulate and write every report
    Run(RunArgs),
    /// Profile the cleaned dataset
    Explore(InputArgs),
    /// Show the distribution selected for each column
    Fit(InputArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Cost-estimate CSV
    #[arg(long, short)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output directory
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, short = 'n')]
    simulations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Total cost formula: markup or sum
    #[arg(long)]
    formula: Option<String>,

    /// Run scenarios one after another
    #[arg(long)]
    sequential: bool,

    #[arg(long)]
    no_charts: bool,

    #[arg(long)]
    no_dashboards: bool,

    /// Use the locally composed narrative only
    #[arg(long)]
    no_ai: bool,

    #[arg(long)]
    no_progress: bool,
}

fn configure(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    let overrides = match &cli.command {
        Command::Run(args) => CliOverrides {
            input: args.input.input.clone(),
            output_dir: args.output.clone(),
            n_simulations: args.simulations,
            seed: args.seed,
            total_formula: args.formula.as_deref().map(parse_formula).transpose()?,
            sequential: args.sequential,
            no_charts: args.no_charts,
            no_dashboards: args.no_dashboards,
            no_ai: args.no_ai,
            no_progress: args.no_progress,
        },
        Command::Explore(args) | Command::Fit(args) => CliOverrides {
            input: args.input.clone(),
            ..CliOverrides::default()
        },
    };
    config.apply_overrides(&overrides);
    Ok(config)
}

fn execute(cli: &Cli) -> Result<()> {
    let pipeline = Pipeline::new(configure(cli)?)?;
    match &cli.command {
        Command::Run(_) => {
            let outcome = pipeline.run()?;
            info!(
                rows = outcome.dataset_rows,
                charts = outcome.charts.len(),
                dashboards = outcome.dashboards.len(),
                "run complete"
            );
            println!("Results:    {}", outcome.results_path.display());
            if let Some(summary) = &outcome.summary_path {
                println!("Summary:    {}", summary.display());
            }
            for path in outcome.charts.iter().chain(outcome.dashboards.iter()) {
                println!("Artifact:   {}", path.display());
            }
            if let Some(ai) = &outcome.ai_report {
                println!("AI report:  {} ({})", ai.html_path.display(), ai.narrative.source.describe());
            }
        }
        Command::Explore(_) => {
            let (profile, cleaning) = pipeline.explore()?;
            print!("{}", format_profile(&profile, &cleaning));
        }
        Command::Fit(_) => {
            let (dataset, _) = pipeline.load()?;
            print!("{}", format_fits(&pipeline.fit(&dataset)?));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    estimator::logging::init(cli.log_json);
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "estimator failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
