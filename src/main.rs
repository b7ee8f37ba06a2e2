use clap::Parser;

use modrun::driver::{self, PhaseSelection, RunOptions, RunReport, UsageError};
use modrun::exit_codes;
use modrun::io::interrupt::{self, InterruptFlag};
use modrun::io::process::ProcessGroups;
use modrun::logging;

/// Resumable orchestrator for per-module analysis, validation, and conversion.
#[derive(Debug, Parser)]
#[command(name = "modrun", version, about)]
struct Cli {
    /// Preview the run: items are classified and counted, but no worker is
    /// launched and no state is mutated.
    #[arg(long)]
    dry_run: bool,

    /// Clear every analyzed flag and empty the retry set, then exit.
    #[arg(long, conflicts_with_all = ["dry_run", "module", "retry_failed"])]
    reset: bool,

    /// Restrict analysis to a single item: a module name, or NAME/SUB for a
    /// sub-module. Other items count as skipped.
    #[arg(long, value_name = "NAME[/SUB]")]
    module: Option<String>,

    /// Analyze only the items recorded in the retry set.
    #[arg(long)]
    retry_failed: bool,

    /// Seconds to wait between consecutive worker launches.
    #[arg(long, value_name = "SECONDS")]
    delay: Option<u64>,

    /// Concurrency limit, capped at 8. Default is 1 (fully sequential).
    #[arg(long, value_name = "N")]
    parallel: Option<u32>,

    /// Replace the per-complexity worker timeouts with a single value.
    #[arg(long, value_name = "SECONDS", conflicts_with = "no_timeout")]
    timeout: Option<u64>,

    /// Let workers run unbounded.
    #[arg(long)]
    no_timeout: bool,

    /// Run only the validation phase.
    #[arg(long, conflicts_with_all = ["conversion_only", "skip_validation"])]
    validation_only: bool,

    /// Run only the conversion phase.
    #[arg(long, conflicts_with = "skip_conversion")]
    conversion_only: bool,

    /// Skip the validation phase.
    #[arg(long)]
    skip_validation: bool,

    /// Skip the conversion phase.
    #[arg(long)]
    skip_conversion: bool,

    /// Debug-level diagnostics on stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn selection(&self) -> PhaseSelection {
        if self.validation_only {
            return PhaseSelection {
                analysis: false,
                validation: true,
                conversion: false,
            };
        }
        if self.conversion_only {
            return PhaseSelection {
                analysis: false,
                validation: false,
                conversion: true,
            };
        }
        PhaseSelection {
            analysis: true,
            validation: !self.skip_validation,
            conversion: !self.skip_conversion,
        }
    }

    fn into_options(self, root: std::path::PathBuf) -> RunOptions {
        let selection = self.selection();
        RunOptions {
            root,
            dry_run: self.dry_run,
            reset: self.reset,
            module_filter: self.module,
            retry_failed: self.retry_failed,
            delay_secs: self.delay,
            parallel: self.parallel,
            timeout_override: if self.no_timeout { Some(0) } else { self.timeout },
            selection,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(cli) {
        Ok(report) => {
            print_summary(&report);
            let code = if report.interrupted {
                exit_codes::FATAL
            } else {
                exit_codes::OK
            };
            std::process::exit(code);
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = if err.downcast_ref::<UsageError>().is_some() {
                exit_codes::USAGE
            } else {
                exit_codes::FATAL
            };
            std::process::exit(code);
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<RunReport> {
    let root = std::env::current_dir()?;
    let opts = cli.into_options(root);

    let interrupt = InterruptFlag::new();
    let groups = ProcessGroups::new();
    interrupt::install_handler(interrupt.clone(), groups.clone())?;

    driver::run(&opts, &interrupt, &groups)
}

fn print_summary(report: &RunReport) {
    if report.reset_performed {
        println!("reset: analyzed flags cleared, retry set emptied");
        return;
    }
    for phase in &report.phases {
        println!("{}: {}", phase.name, phase.counters);
    }
    if report.interrupted {
        println!("interrupted: remaining items left for the next run");
    }
}
