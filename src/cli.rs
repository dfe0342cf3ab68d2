use crate::config::settings::RunnerSettings;
use crate::core::supervisor::ProcessSupervisor;
use crate::driver::archive::{archive_output_path, ArchiveSink};
use crate::driver::console::ConsoleReporter;
use crate::driver::{Driver, DriverOptions, RunStats};
use crate::exec::runner::Runner;
use crate::provider::{GeneratorSpec, ProviderSpec};
use crate::utils::convert::{default_zip_path, tar_to_zip};
use crate::verdict::checker::CheckerProgram;
use crate::verdict::compare::{Comparator, TokenComparator};
use crate::verdict::verdict::VerdictPolicy;
use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which binary is running; each accepts a different command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliMode {
    /// `testbox <subcommand>`
    Compat,
    /// `testbox-check`, the checking session on its own
    Check,
    /// `testbox-pack`, the packaging session on its own
    Pack,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
#[command(name = "testbox-check", author, version, about = "Check a solution against test sources")]
struct CheckCli {
    #[command(flatten)]
    args: CheckArgs,
}

#[derive(Parser)]
#[command(name = "testbox-pack", author, version, about = "Build a test package from a model solution")]
struct PackCli {
    #[command(flatten)]
    args: PackArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a solution on tests and report a verdict per test
    Check(CheckArgs),
    /// Run a model solution on tests and pack inputs and outputs into a zip
    Pack(PackArgs),
    /// Convert a tar test package into a zip archive
    Convert {
        /// Source .tar archive
        tar: PathBuf,
        /// Output .zip (defaults to the tar path with a .zip extension)
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Program to be tested
    program: PathBuf,
    /// Zip archive(s) with tests
    #[arg(long, short = 'z', num_args = 1.., action = ArgAction::Append)]
    zip: Vec<PathBuf>,
    /// Folder with tests (searched recursively)
    #[arg(long, short = 'f', action = ArgAction::Append)]
    folder: Vec<PathBuf>,
    /// Generator and model solution; produces tests until stopped
    #[arg(long, short = 'g', num_args = 2, value_names = ["GEN", "MODEL"], action = ArgAction::Append)]
    generator: Vec<PathBuf>,
    /// Time limit in seconds (`inf` for none)
    #[arg(long, short = 't')]
    time_limit: Option<f64>,
    /// Do not check output, only time and exit code
    #[arg(long = "ignore-out", short = 'i')]
    ignore_output: bool,
    /// External checker program: `checker <input> <output> <model>`
    #[arg(long, short = 'c')]
    checker: Option<PathBuf>,
    /// Only run tests whose name contains this keyword
    #[arg(long, short = 'k')]
    keyword: Option<String>,
    /// Stop after this many failed tests
    #[arg(long, short = 'b')]
    break_after: Option<usize>,
    /// Run at most this many tests
    #[arg(long, short = 'n')]
    tests_limit: Option<usize>,
    /// Save failing tests into this folder
    #[arg(long, short = 's')]
    save_failed: Option<PathBuf>,
    /// Wait for Enter after every failed test
    #[arg(long, short = 'w')]
    wait_after_error: bool,
    /// Number of parallel workers
    #[arg(long, short = 'j')]
    threads: Option<usize>,
    /// Settings file (defaults to ./testbox.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Model solution
    program: PathBuf,
    /// Name prefix for generated tests (unused for zip and folder sources)
    testname: String,
    /// Output archive; `.zip` is appended when missing
    output: PathBuf,
    /// Zip archive(s) with tests
    #[arg(long, short = 'z', num_args = 1.., action = ArgAction::Append)]
    zip: Vec<PathBuf>,
    /// Folder with tests (searched recursively)
    #[arg(long, short = 'f', action = ArgAction::Append)]
    folder: Vec<PathBuf>,
    /// Generator and number of tests to create
    #[arg(long, short = 'g', num_args = 2, value_names = ["GEN", "NUM"], action = ArgAction::Append)]
    generator: Vec<String>,
    /// Generator, number of tests and name suffix (e.g. test123small.in)
    #[arg(long = "generator-suffix", num_args = 3, value_names = ["GEN", "NUM", "SUFFIX"], action = ArgAction::Append)]
    generator_suffix: Vec<String>,
    /// Number of parallel workers
    #[arg(long, short = 't')]
    threads: Option<usize>,
    /// Time limit in seconds (settings file limit by default, `inf` for none)
    #[arg(long)]
    time_limit: Option<f64>,
    /// Also pack tests the model solution failed
    #[arg(long)]
    keep_failed: bool,
    /// Stop after this many failed tests
    #[arg(long, short = 'b')]
    break_after: Option<usize>,
    /// Settings file (defaults to ./testbox.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

pub fn run(mode: CliMode) -> Result<()> {
    env_logger::init();

    if !cfg!(unix) {
        anyhow::bail!("testbox requires a Unix-like system (process groups, signals)");
    }

    let command = match mode {
        CliMode::Compat => Cli::parse().command,
        CliMode::Check => Commands::Check(CheckCli::parse().args),
        CliMode::Pack => Commands::Pack(PackCli::parse().args),
    };

    match command {
        Commands::Check(args) => run_check(args),
        Commands::Pack(args) => run_pack(args),
        Commands::Convert { tar, output } => {
            let output = output.unwrap_or_else(|| default_zip_path(&tar));
            let copied = tar_to_zip(&tar, &output, &mut std::io::stdout())?;
            println!("\nDone. {} files packed into {}.", copied, output.display());
            Ok(())
        }
    }
}

fn install_interrupt_handler(flag: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nKeyboardInterrupt - finishing tests in flight...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install interrupt handler")
}

/// Settings file plus command-line overrides, validated.
fn load_settings(
    config: Option<&Path>,
    threads: Option<usize>,
    time_limit: Option<f64>,
) -> Result<RunnerSettings> {
    let mut settings = RunnerSettings::load(config)?;
    if let Some(threads) = threads {
        settings.threads = threads;
    }
    if let Some(limit) = time_limit {
        settings.time_limit_secs = Some(limit);
    }
    settings.validate()?;
    Ok(settings)
}

/// Base name of `path` without its extension.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parse_count(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("invalid number of tests: {}", value))
}

fn check_sources(args: &CheckArgs) -> Vec<ProviderSpec> {
    let mut specs: Vec<ProviderSpec> = args.zip.iter().cloned().map(ProviderSpec::Archive).collect();
    specs.extend(args.folder.iter().cloned().map(ProviderSpec::Folder));
    for pair in args.generator.chunks(2) {
        if let [generator, model] = pair {
            specs.push(ProviderSpec::Generator(GeneratorSpec {
                generator: generator.clone(),
                model_solution: Some(model.clone()),
                name_prefix: file_stem(&args.program),
                name_suffix: String::new(),
                limit: None,
            }));
        }
    }
    specs
}

fn pack_sources(args: &PackArgs) -> Result<Vec<ProviderSpec>> {
    let mut specs: Vec<ProviderSpec> = args.zip.iter().cloned().map(ProviderSpec::Archive).collect();
    specs.extend(args.folder.iter().cloned().map(ProviderSpec::Folder));

    let plain = args.generator.chunks(2).map(|chunk| (chunk, ""));
    let suffixed = args
        .generator_suffix
        .chunks(3)
        .map(|chunk| {
            let suffix = chunk.get(2).map_or("", String::as_str);
            (chunk.get(..2).unwrap_or_default(), suffix)
        });
    for (chunk, suffix) in plain.chain(suffixed) {
        if let [generator, count] = chunk {
            specs.push(ProviderSpec::Generator(GeneratorSpec {
                generator: PathBuf::from(generator),
                model_solution: None,
                name_prefix: args.testname.clone(),
                name_suffix: suffix.to_string(),
                limit: Some(parse_count(count)?),
            }));
        }
    }
    Ok(specs)
}

fn run_check(args: CheckArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), args.threads, args.time_limit)?;

    let specs = check_sources(&args);
    if specs.is_empty() {
        anyhow::bail!("no test source given (use --zip, --folder or --generator)");
    }

    let supervisor = Arc::new(ProcessSupervisor::from_settings(&settings));
    let comparator: Arc<dyn Comparator> = match &args.checker {
        Some(path) => Arc::new(CheckerProgram::new(
            path,
            Arc::clone(&supervisor),
            settings.time_limit(),
        )?),
        None => Arc::new(TokenComparator),
    };
    let runner = Runner::new(
        &args.program,
        &settings.wrapper,
        Arc::clone(&supervisor),
        comparator,
        VerdictPolicy {
            time_limit: settings.time_limit(),
            ignore_output: args.ignore_output,
        },
    )?;

    let reporter = ConsoleReporter::stdout()
        .save_failed_to(args.save_failed)
        .wait_after_error(args.wait_after_error);
    let options = DriverOptions {
        threads: settings.threads,
        break_after: args.break_after,
        tests_limit: args.tests_limit,
        keyword: args.keyword,
    };
    let driver = Driver::new(runner, supervisor, reporter, options);
    install_interrupt_handler(driver.interrupt_flag())?;

    let outcome = driver.run(&specs);
    let stats = driver.stats()?;
    let mut reporter = driver.into_sink();
    reporter.summary(&stats)?;

    outcome.context("critical error, run aborted")?;
    Ok(())
}

fn run_pack(args: PackArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), args.threads, args.time_limit)?;

    let output = archive_output_path(&args.output);
    if output.exists() {
        anyhow::bail!("will not overwrite existing file {}", output.display());
    }

    let specs = pack_sources(&args)?;
    if specs.is_empty() {
        anyhow::bail!("no test source given (use --zip, --folder or --generator)");
    }
    for spec in &specs {
        spec.verify()?;
    }

    let supervisor = Arc::new(ProcessSupervisor::from_settings(&settings));
    let runner = Runner::new(
        &args.program,
        &settings.wrapper,
        Arc::clone(&supervisor),
        Arc::new(TokenComparator),
        VerdictPolicy {
            time_limit: settings.time_limit(),
            ignore_output: true,
        },
    )?;

    let sink = ArchiveSink::create(&output, args.keep_failed)?;
    let options = DriverOptions {
        threads: settings.threads,
        break_after: args.break_after,
        ..DriverOptions::default()
    };
    let driver = Driver::new(runner, supervisor, sink, options);
    install_interrupt_handler(driver.interrupt_flag())?;

    match driver.run(&specs) {
        Ok(stats) => {
            let path = driver.into_sink().finish()?;
            report_pack(&stats, &path);
            Ok(())
        }
        Err(err) => {
            // the half-written package cannot be trusted
            drop(driver.into_sink());
            if let Err(e) = std::fs::remove_file(&output) {
                log::warn!("could not remove {}: {}", output.display(), e);
            }
            Err(err).context("critical error, package removed")
        }
    }
}

fn report_pack(stats: &RunStats, path: &Path) {
    println!(
        "Done. {} tests, {} errors, package written to {}.",
        stats.done,
        stats.errors,
        path.display()
    );
}
