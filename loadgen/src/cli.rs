//! Command line entry point.
//!
//! Besides `run`, the binary can print the sampled workload without sending requests and convert
//! an invocation trace into a popularity table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use loadgen_workload::{PopularityTable, WorkloadPlan};
use yansi::Paint;

use crate::config::Config;
use crate::http::SchedulerRemote;
use crate::{observability, runner, trace};

/// Load generator for function-invocation schedulers.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Plan(PlanCommand),
    Probabilities(ProbabilitiesCommand),
    Version(VersionCommand),
}

/// run all load phases against the scheduler
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// print the sampled functions and the benchmark instances they invoke
///
/// This sends no requests and can be used to inspect the workload for a seed.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanCommand {}

/// compute a popularity table from an Azure Functions invocation trace
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "probabilities")]
struct ProbabilitiesCommand {
    /// path to the trace CSV
    #[argh(option)]
    trace: PathBuf,

    /// path of the JSON file to write, defaults to stdout
    #[argh(option)]
    output: Option<PathBuf>,
}

/// print the load generator version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("loadgen {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Converting a trace does not talk to the scheduler and needs none of its settings.
    if let Command::Probabilities(command) = args.command {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        return runtime.block_on(probabilities(command));
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("loadgen-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand {}) => run(config).await,
            Command::Plan(PlanCommand {}) => plan(config),
            Command::Probabilities(_) | Command::Version(_) => unreachable!(),
        }
    })
}

fn load_plan(config: &Config) -> Result<WorkloadPlan> {
    let table = PopularityTable::load(&config.function_probabilities).with_context(|| {
        format!(
            "failed to load function probabilities from {}",
            config.function_probabilities.display()
        )
    })?;

    let plan = WorkloadPlan::new(&table, config.catalog()?, config.n_copies, config.seed)
        .context("failed to sample workload")?;
    Ok(plan)
}

async fn run(config: Config) -> Result<()> {
    let schedule = config.schedule()?;
    let plan = load_plan(&config)?;
    let remote = SchedulerRemote::new(&config.scheduler_url(), config.request_timeout)
        .context("failed to build HTTP client")?;

    runner::perform_loadtest(remote, plan, &schedule, config.seed).await?;
    Ok(())
}

fn plan(config: Config) -> Result<()> {
    let plan = load_plan(&config)?;

    println!(
        "{} (seed: {}, copies: {}, functions: {})",
        "## Plan".bold(),
        config.seed.bold(),
        plan.copies(),
        plan.mix().len().bold()
    );
    for assignment in plan.assignments() {
        println!(
            "  {:<24} {:>10.6}  {}",
            assignment.instance.to_string().blue(),
            assignment.probability,
            assignment.function
        );
    }

    Ok(())
}

async fn probabilities(command: ProbabilitiesCommand) -> Result<()> {
    let table = trace::probabilities_from_trace(&command.trace).await?;

    match command.output {
        Some(path) => write_table(&table, &path)?,
        None => {
            let stdout = io::stdout().lock();
            table.write_json(stdout)?;
            println!();
        }
    }

    Ok(())
}

fn write_table(table: &PopularityTable, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    table.write_json(&mut writer)?;
    writer.flush()?;
    Ok(())
}
